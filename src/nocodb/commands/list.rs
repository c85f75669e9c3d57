use crate::commands::{CmdMessage, CmdResult, ReconcileOptions};
use crate::error::Result;
use crate::gateway::{ListQuery, RecordGateway, RowPages};

/// List rows of a table: one page, or every page from `query.offset` on.
pub fn run<G: RecordGateway>(
    gateway: &G,
    options: &ReconcileOptions,
    table: &str,
    mut query: ListQuery,
    all_pages: bool,
) -> Result<CmdResult> {
    if query.limit.is_none() {
        query.limit = options.page_size;
    }

    if !all_pages {
        let page = gateway.list_page(table, &query)?;
        let mut result = CmdResult::default().with_total_rows(page.total_rows);
        if page.rows.is_empty() {
            result.add_message(CmdMessage::info(format!("No rows found in {}", table)));
        }
        return Ok(result.with_rows(page.rows));
    }

    let mut rows = Vec::new();
    let mut pages = RowPages::new(gateway, table, query);
    for page in pages.by_ref() {
        rows.extend(page?.rows);
    }
    let total = pages.total_rows().unwrap_or(rows.len());

    let mut result = CmdResult::default().with_total_rows(total);
    if rows.is_empty() {
        result.add_message(CmdMessage::info(format!("No rows found in {}", table)));
    }
    Ok(result.with_rows(rows))
}
