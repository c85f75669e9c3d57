use crate::commands::{CmdMessage, CmdResult, OutcomeStatus, ReconcileOptions, RecordOutcome};
use crate::error::{RecordError, Result};
use crate::gateway::filter::match_filter;
use crate::gateway::{ListQuery, RecordGateway, RowPages};
use crate::matcher::{resolve, Match, MatchKey, Matcher};
use crate::model::{MatchSpec, Record, RowId, UpsertMode};
use tracing::{debug, info, warn};

/// Create or update one record, matched on `spec`.
///
/// Candidate rows are fetched with a `where` filter on the match fields when the
/// values allow it, and matched locally either way. Fetching stops at the second
/// distinct match. Exactly one write is issued on success and none on failure.
pub fn run<G: RecordGateway>(
    gateway: &mut G,
    options: &ReconcileOptions,
    table: &str,
    spec: &MatchSpec,
    record: Record,
    mode: UpsertMode,
) -> Result<CmdResult> {
    let key = MatchKey::for_record(spec, &record)?;
    let matcher = Matcher::new(spec, &options.id_field);

    let filter = match_filter(spec, &record);
    if filter.is_none() {
        debug!(%key, "match values cannot be filtered server-side, scanning table");
    }
    let query = ListQuery::new()
        .with_where(filter)
        .with_limit(options.page_size);

    let mut ids: Vec<RowId> = Vec::new();
    for page in RowPages::new(&*gateway, table, query) {
        let page = page?;
        for id in matcher.matching_ids(&record, &page.rows)? {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.len() > 1 {
            break;
        }
    }

    match (resolve(&key, ids)?, mode) {
        (Match::None, UpsertMode::UpdateOnly) => Err(RecordError::NoMatchForUpdate {
            key: key.to_string(),
        }
        .into()),
        (Match::Unique(id), UpsertMode::CreateOnly) => Err(RecordError::MatchExistsForCreate {
            key: key.to_string(),
            id,
        }
        .into()),
        (Match::None, _) => create(gateway, options, table, record),
        (Match::Unique(id), _) => update(gateway, options, table, record, id),
    }
}

fn create<G: RecordGateway>(
    gateway: &mut G,
    options: &ReconcileOptions,
    table: &str,
    record: Record,
) -> Result<CmdResult> {
    let written = gateway.create_many(table, std::slice::from_ref(&record))?;
    let id = written
        .rows
        .first()
        .and_then(|row| row.identity(&options.id_field));

    let row = match &id {
        Some(id) => record.with_identity(&options.id_field, id),
        None => record,
    };
    info!(table, id = ?id.as_ref().map(RowId::canonical), "row created");

    let mut result = CmdResult::default()
        .with_rows(vec![row])
        .with_outcomes(vec![RecordOutcome::new(0, OutcomeStatus::Created { id: id.clone() })]);
    result.add_message(CmdMessage::success(match id {
        Some(id) => format!("Created row {} in {}", id, table),
        None => format!("Created row in {}", table),
    }));
    Ok(result)
}

fn update<G: RecordGateway>(
    gateway: &mut G,
    options: &ReconcileOptions,
    table: &str,
    record: Record,
    id: RowId,
) -> Result<CmdResult> {
    if let Some(given) = record.identity(&options.id_field) {
        if given != id {
            warn!(
                table,
                given = %given,
                matched = %id,
                "record identity differs from the matched row, using the matched row"
            );
        }
    }

    let payload = record.with_identity(&options.id_field, &id);
    gateway.update_many(table, std::slice::from_ref(&payload))?;
    info!(table, id = %id, "row updated");

    let mut result = CmdResult::default()
        .with_rows(vec![payload])
        .with_outcomes(vec![RecordOutcome::new(0, OutcomeStatus::Updated { id: id.clone() })]);
    result.add_message(CmdMessage::success(format!("Updated row {} in {}", id, table)));
    Ok(result)
}
