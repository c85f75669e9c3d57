//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer. It is the single entry
//! point for reconciliation, whatever drives it.
//!
//! ## Role and Responsibilities
//!
//! The API facade:
//! - **Owns** the gateway and the [`ReconcileOptions`] it was built with
//! - **Normalizes inputs** (e.g., parsing a comma-separated match spec)
//! - **Dispatches** to the appropriate command function
//! - **Returns structured types** (`Result<CmdResult>`)
//!
//! ## What the API Does NOT Do
//!
//! - **Business logic**: That belongs in `commands/*.rs`
//! - **I/O operations**: No stdout, stderr, or file formatting
//! - **Configuration lookup**: options arrive fully resolved
//!
//! ## Generic Over RecordGateway
//!
//! `NocoApi<G: RecordGateway>` is generic over the backend:
//! - Production: `NocoApi<HttpGateway>`
//! - Testing: `NocoApi<InMemoryGateway>`

use crate::commands::{self, CmdResult, ReconcileOptions};
use crate::error::{NocoError, Result};
use crate::gateway::{ListQuery, RecordGateway};
use crate::model::{canonical_value, FailurePolicy, MatchSpec, Record, UpsertMode};
use serde_json::Value;

/// The reconciler facade.
pub struct NocoApi<G: RecordGateway> {
    gateway: G,
    options: ReconcileOptions,
}

impl<G: RecordGateway> NocoApi<G> {
    pub fn new(gateway: G, options: ReconcileOptions) -> Self {
        Self { gateway, options }
    }

    pub fn upsert_one(
        &mut self,
        table: &str,
        spec: &MatchSpec,
        record: Record,
        mode: UpsertMode,
    ) -> Result<CmdResult> {
        commands::upsert::run(&mut self.gateway, &self.options, table, spec, record, mode)
    }

    pub fn bulk_upsert(
        &mut self,
        table: &str,
        spec: &MatchSpec,
        records: Vec<Record>,
        policy: FailurePolicy,
    ) -> Result<CmdResult> {
        commands::bulk_upsert::run(
            &mut self.gateway,
            &self.options,
            table,
            spec,
            records,
            policy,
        )
    }

    pub fn bulk_create(
        &mut self,
        table: &str,
        records: Vec<Record>,
        policy: FailurePolicy,
    ) -> Result<CmdResult> {
        commands::bulk::create(&mut self.gateway, &self.options, table, records, policy)
    }

    pub fn bulk_update(
        &mut self,
        table: &str,
        records: Vec<Record>,
        policy: FailurePolicy,
    ) -> Result<CmdResult> {
        commands::bulk::update(&mut self.gateway, &self.options, table, records, policy)
    }

    pub fn bulk_delete(
        &mut self,
        table: &str,
        records: Vec<Record>,
        policy: FailurePolicy,
    ) -> Result<CmdResult> {
        commands::bulk::delete(&mut self.gateway, &self.options, table, records, policy)
    }

    pub fn list_rows(&self, table: &str, query: ListQuery, all_pages: bool) -> Result<CmdResult> {
        commands::list::run(&self.gateway, &self.options, table, query, all_pages)
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn into_gateway(self) -> G {
        self.gateway
    }
}

/// Parse a match spec given as one or more comma-separated lists.
pub fn parse_match_spec<I: AsRef<str>>(inputs: &[I]) -> Result<MatchSpec> {
    MatchSpec::new(
        inputs
            .iter()
            .flat_map(|input| input.as_ref().split(','))
            .map(str::to_string),
    )
}

/// Build a single-upsert match spec from `--match` arguments.
///
/// `Field` and `A,B` name match fields. `Field=value` also names `Field` and fills
/// it into the record when absent; a record already holding a different value is
/// an input error.
pub fn apply_match_values<I: AsRef<str>>(record: &mut Record, inputs: &[I]) -> Result<MatchSpec> {
    let mut fields = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        let Some((field, value)) = input.split_once('=') else {
            fields.extend(input.split(',').map(str::to_string));
            continue;
        };

        let field = field.trim();
        let value = Value::String(value.to_string());
        match record.get(field).cloned() {
            None if !field.is_empty() => {
                record.insert(field, value);
            }
            Some(existing) if canonical_value(&existing) != canonical_value(&value) => {
                return Err(NocoError::InvalidMatchSpec(format!(
                    "--match {} conflicts with the record's {} value {}",
                    input, field, existing
                )));
            }
            _ => {}
        }
        fields.push(field.to_string());
    }
    MatchSpec::new(fields)
}
