use crate::commands::helpers::{finish, reject, write_batches, Abort, Staged};
use crate::commands::{CmdResult, OutcomeStatus, ReconcileOptions};
use crate::error::{AmbiguityOrigin, NocoError, RecordError, Result};
use crate::gateway::{ListQuery, RecordGateway, RowPages};
use crate::matcher::{ExistingRowIndex, Lookup, MatchKey};
use crate::model::{FailurePolicy, MatchSpec, Record, RowId};
use std::collections::HashMap;
use tracing::debug;

enum Plan {
    Create,
    Update(RowId),
}

/// Upsert many records against one snapshot of the whole table.
///
/// Every record's match key is validated before the first request. The table is
/// then read page by page into an [`ExistingRowIndex`], every record is classified
/// against it, and only then are creates and updates submitted in batches.
pub fn run<G: RecordGateway>(
    gateway: &mut G,
    options: &ReconcileOptions,
    table: &str,
    spec: &MatchSpec,
    records: Vec<Record>,
    policy: FailurePolicy,
) -> Result<CmdResult> {
    let keys = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            MatchKey::for_record(spec, record).map_err(|e| match e {
                NocoError::InvalidMatchSpec(msg) => {
                    NocoError::InvalidMatchSpec(format!("record {}: {}", i, msg))
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if records.is_empty() {
        return finish("bulk-upsert", table, Vec::new(), None);
    }

    let mut index = ExistingRowIndex::new(spec, &options.id_field);
    let query = ListQuery::new().with_limit(options.page_size);
    for page in RowPages::new(&*gateway, table, query) {
        index.add_page(&page?.rows);
    }
    debug!(
        table,
        rows = index.rows_seen(),
        skipped = index.rows_skipped(),
        "existing rows indexed"
    );

    let mut incoming: HashMap<&MatchKey, usize> = HashMap::new();
    for key in &keys {
        *incoming.entry(key).or_default() += 1;
    }

    let mut outcomes = Vec::with_capacity(records.len());
    let mut creates = Staged::new();
    let mut updates = Staged::new();
    let mut abort: Option<Abort> = None;

    for (i, (record, key)) in records.into_iter().zip(&keys).enumerate() {
        let shared = incoming.get(key).copied().unwrap_or(0);
        let plan = if shared > 1 {
            Err(RecordError::AmbiguousMatch {
                key: key.to_string(),
                count: shared,
                origin: AmbiguityOrigin::Incoming,
            })
        } else {
            match index.lookup(key) {
                Lookup::None => Ok(Plan::Create),
                Lookup::Unique(id) => Ok(Plan::Update(id.clone())),
                Lookup::Ambiguous(count) => Err(RecordError::AmbiguousMatch {
                    key: key.to_string(),
                    count,
                    origin: AmbiguityOrigin::Remote,
                }),
                Lookup::MissingIdentity => Err(RecordError::MissingIdentity {
                    field: options.id_field.clone(),
                }),
            }
        };

        match plan {
            Ok(Plan::Create) => creates.push(i, record),
            Ok(Plan::Update(id)) => updates.push(i, record.with_identity(&options.id_field, &id)),
            Err(reason) => {
                abort = reject(policy, i, reason, &mut outcomes);
                if abort.is_some() {
                    break;
                }
            }
        }
    }

    debug!(
        table,
        creates = creates.len(),
        updates = updates.len(),
        "records classified"
    );

    let id_field = options.id_field.as_str();
    let mut write_abort = write_batches(
        creates,
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
    if write_abort.is_none() {
        write_abort = write_batches(
            updates,
            options.batch_size,
            policy,
            |batch| gateway.update_many(table, batch),
            |payload, _| match payload.identity(id_field) {
                Some(id) => OutcomeStatus::Updated { id },
                None => OutcomeStatus::Rejected {
                    reason: RecordError::MissingIdentity {
                        field: id_field.to_string(),
                    },
                },
            },
            &mut outcomes,
        );
    }

    finish("bulk-upsert", table, outcomes, write_abort.or(abort))
}
