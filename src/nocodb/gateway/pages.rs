use super::{GatewayResult, ListQuery, Page, RecordGateway};
use tracing::debug;

/// Lazy sequence of pages for one query.
///
/// Each `next()` issues one `list_page` call. The sequence ends after the page that
/// brings the running row count up to the server's reported total, after an empty
/// page, or after the first error. Dropping it early issues no further calls, and
/// [`RowPages::restart`] rewinds it to the first page.
pub struct RowPages<'g, G: RecordGateway> {
    gateway: &'g G,
    table: String,
    query: ListQuery,
    start: usize,
    rows_seen: usize,
    total_rows: Option<usize>,
    done: bool,
}

impl<'g, G: RecordGateway> RowPages<'g, G> {
    pub fn new(gateway: &'g G, table: impl Into<String>, query: ListQuery) -> Self {
        let start = query.offset;
        Self {
            gateway,
            table: table.into(),
            query,
            start,
            rows_seen: 0,
            total_rows: None,
            done: false,
        }
    }

    pub fn restart(&mut self) {
        self.query.offset = self.start;
        self.rows_seen = 0;
        self.total_rows = None;
        self.done = false;
    }

    /// Rows yielded so far.
    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    /// Total reported by the most recent page.
    pub fn total_rows(&self) -> Option<usize> {
        self.total_rows
    }

    /// Whether the sequence has covered every row the server reported.
    pub fn is_exhausted(&self) -> bool {
        self.done
    }
}

impl<G: RecordGateway> Iterator for RowPages<'_, G> {
    type Item = GatewayResult<Page>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let page = match self.gateway.list_page(&self.table, &self.query) {
            Ok(page) => page,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        let fetched = page.rows.len();
        self.rows_seen += fetched;
        self.query.offset += fetched;
        self.total_rows = Some(page.total_rows);

        let remaining = page.total_rows.saturating_sub(self.start);
        self.done = fetched == 0 || self.rows_seen >= remaining;

        debug!(
            table = %self.table,
            offset = self.query.offset - fetched,
            fetched,
            seen = self.rows_seen,
            total = page.total_rows,
            "fetched page"
        );
        Some(Ok(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::memory::fixtures::GatewayFixture;
    use crate::gateway::GatewayError;
    use serde_json::json;

    #[test]
    fn walks_all_pages_until_total() {
        let gateway = GatewayFixture::new()
            .with_numbered_rows("t", 5)
            .with_page_size(2)
            .gateway;

        let pages: Vec<Page> = RowPages::new(&gateway, "t", ListQuery::new())
            .collect::<GatewayResult<_>>()
            .unwrap();

        assert_eq!(pages.len(), 3);
        assert_eq!(
            pages.iter().map(|p| p.rows.len()).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert_eq!(gateway.list_calls().len(), 3);
    }

    #[test]
    fn exact_multiple_stops_without_extra_call() {
        let gateway = GatewayFixture::new()
            .with_numbered_rows("t", 4)
            .with_page_size(2)
            .gateway;

        let count = RowPages::new(&gateway, "t", ListQuery::new()).count();
        assert_eq!(count, 2);
        assert_eq!(gateway.list_calls().len(), 2);
    }

    #[test]
    fn empty_table_yields_one_empty_page() {
        let gateway = GatewayFixture::new().with_table("t").gateway;
        let pages: Vec<_> = RowPages::new(&gateway, "t", ListQuery::new()).collect();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].as_ref().unwrap().rows.is_empty());
    }

    #[test]
    fn is_lazy_and_restartable() {
        let gateway = GatewayFixture::new()
            .with_numbered_rows("t", 6)
            .with_page_size(2)
            .gateway;

        let mut pages = RowPages::new(&gateway, "t", ListQuery::new());
        let first = pages.next().unwrap().unwrap();
        assert_eq!(first.rows[0].get("Id"), Some(&json!(1)));
        assert_eq!(gateway.list_calls().len(), 1);
        assert!(!pages.is_exhausted());

        pages.restart();
        let again = pages.next().unwrap().unwrap();
        assert_eq!(again, first);
        assert_eq!(pages.rows_seen(), 2);
        assert_eq!(pages.total_rows(), Some(6));
    }

    #[test]
    fn stops_after_error() {
        let mut fixture = GatewayFixture::new().with_numbered_rows("t", 3);
        fixture
            .gateway
            .fail_list(GatewayError::Transport("connection reset".into()));

        let mut pages = RowPages::new(&fixture.gateway, "t", ListQuery::new());
        assert!(matches!(pages.next(), Some(Err(GatewayError::Transport(_)))));
        assert!(pages.next().is_none());
    }

    #[test]
    fn honours_starting_offset() {
        let gateway = GatewayFixture::new()
            .with_numbered_rows("t", 5)
            .with_page_size(2)
            .gateway;

        let rows: usize = RowPages::new(&gateway, "t", ListQuery::new().with_offset(3))
            .map(|p| p.unwrap().rows.len())
            .sum();
        assert_eq!(rows, 2);
    }
}
