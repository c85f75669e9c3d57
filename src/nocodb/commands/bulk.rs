//! Batched create, update and delete without matching.
//!
//! Update and delete address rows by identity, so each record must carry the
//! identity field; records without it are rejected before anything is sent.

use crate::commands::helpers::{finish, reject, write_batches, Abort, Staged};
use crate::commands::{CmdResult, OutcomeStatus, ReconcileOptions};
use crate::error::{RecordError, Result};
use crate::gateway::RecordGateway;
use crate::model::{FailurePolicy, Record, RowId};

pub fn create<G: RecordGateway>(
    gateway: &mut G,
    options: &ReconcileOptions,
    table: &str,
    records: Vec<Record>,
    policy: FailurePolicy,
) -> Result<CmdResult> {
    let mut staged = Staged::new();
    for (i, record) in records.into_iter().enumerate() {
        staged.push(i, record);
    }

    let id_field = options.id_field.as_str();
    let mut outcomes = Vec::with_capacity(staged.len());
    let abort = write_batches(
        staged,
        options.batch_size,
        policy,
        |batch| gateway.create_many(table, batch),
        |payload, row| OutcomeStatus::Created {
            id: row
                .and_then(|r| r.identity(id_field))
                .or_else(|| payload.identity(id_field)),
        },
        &mut outcomes,
    );
    finish("bulk-create", table, outcomes, abort)
}

pub fn update<G: RecordGateway>(
    gateway: &mut G,
    options: &ReconcileOptions,
    table: &str,
    records: Vec<Record>,
    policy: FailurePolicy,
) -> Result<CmdResult> {
    let id_field = options.id_field.as_str();
    let mut outcomes = Vec::new();
    let mut staged = Staged::new();
    let mut abort: Option<Abort> = None;

    for (i, record) in records.into_iter().enumerate() {
        match record.identity(id_field) {
            Some(_) => staged.push(i, record),
            None => {
                abort = reject(policy, i, missing_identity(id_field), &mut outcomes);
                if abort.is_some() {
                    break;
                }
            }
        }
    }

    let write_abort = write_batches(
        staged,
        options.batch_size,
        policy,
        |batch| gateway.update_many(table, batch),
        |payload, _| match payload.identity(id_field) {
            Some(id) => OutcomeStatus::Updated { id },
            None => OutcomeStatus::Rejected {
                reason: missing_identity(id_field),
            },
        },
        &mut outcomes,
    );
    finish("bulk-update", table, outcomes, write_abort.or(abort))
}

pub fn delete<G: RecordGateway>(
    gateway: &mut G,
    options: &ReconcileOptions,
    table: &str,
    records: Vec<Record>,
    policy: FailurePolicy,
) -> Result<CmdResult> {
    let id_field = options.id_field.as_str();
    let mut outcomes = Vec::new();
    let mut staged: Staged<RowId> = Staged::new();
    let mut abort: Option<Abort> = None;

    for (i, record) in records.iter().enumerate() {
        match record.identity(id_field) {
            Some(id) => staged.push(i, id),
            None => {
                abort = reject(policy, i, missing_identity(id_field), &mut outcomes);
                if abort.is_some() {
                    break;
                }
            }
        }
    }

    let write_abort = write_batches(
        staged,
        options.batch_size,
        policy,
        |batch| gateway.delete_many(table, batch),
        |id, _| OutcomeStatus::Deleted { id: id.clone() },
        &mut outcomes,
    );
    finish("bulk-delete", table, outcomes, write_abort.or(abort))
}

fn missing_identity(id_field: &str) -> RecordError {
    RecordError::MissingIdentity {
        field: id_field.to_string(),
    }
}
