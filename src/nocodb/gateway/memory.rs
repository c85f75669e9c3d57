use super::filter::parse_eq_clause;
use super::{
    BatchResult, GatewayError, GatewayResult, ListQuery, Page, RecordGateway, WriteKind,
};
use crate::model::{canonical_value, Record, RowId, DEFAULT_ID_FIELD};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

const DEFAULT_PAGE_SIZE: usize = 25;

/// A write the gateway received, kept for assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub kind: WriteKind,
    pub table: String,
    pub records: Vec<Record>,
}

/// In-memory tables for testing and development.
/// Does NOT persist data.
///
/// Rows are kept in insertion order; new rows get the next integer identity.
/// Every call is logged, and failures can be queued per operation.
pub struct InMemoryGateway {
    tables: HashMap<String, Vec<Record>>,
    id_field: String,
    page_size: usize,
    next_id: i64,
    list_log: RefCell<Vec<(String, ListQuery)>>,
    list_failures: RefCell<VecDeque<GatewayError>>,
    write_log: Vec<WriteCall>,
    write_failures: HashMap<WriteKind, VecDeque<(usize, GatewayError)>>,
    write_counts: HashMap<WriteKind, usize>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            id_field: DEFAULT_ID_FIELD.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            next_id: 1,
            list_log: RefCell::new(Vec::new()),
            list_failures: RefCell::new(VecDeque::new()),
            write_log: Vec::new(),
            write_failures: HashMap::new(),
            write_counts: HashMap::new(),
        }
    }

    pub fn with_id_field(mut self, id_field: &str) -> Self {
        self.id_field = id_field.to_string();
        self
    }

    /// Page size used when a query does not set `limit`.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
    }

    /// Seed rows directly, bypassing the write log.
    pub fn insert_rows(&mut self, table: &str, rows: impl IntoIterator<Item = Record>) {
        let stored = self.tables.entry(table.to_string()).or_default();
        for row in rows {
            if let Some(Value::Number(n)) = row.get(&self.id_field) {
                if let Some(id) = n.as_i64() {
                    self.next_id = self.next_id.max(id + 1);
                }
            }
            stored.push(row);
        }
    }

    pub fn rows(&self, table: &str) -> &[Record] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn list_calls(&self) -> Vec<(String, ListQuery)> {
        self.list_log.borrow().clone()
    }

    pub fn writes(&self) -> &[WriteCall] {
        &self.write_log
    }

    pub fn writes_of(&self, kind: WriteKind) -> Vec<&WriteCall> {
        self.write_log.iter().filter(|w| w.kind == kind).collect()
    }

    pub fn total_calls(&self) -> usize {
        self.list_log.borrow().len() + self.write_log.len()
    }

    /// Fail the next `list_page` call.
    pub fn fail_list(&mut self, error: GatewayError) {
        self.list_failures.get_mut().push_back(error);
    }

    /// Fail the `nth` (0-based) call of the given write kind.
    pub fn fail_write(&mut self, kind: WriteKind, nth: usize, error: GatewayError) {
        self.write_failures
            .entry(kind)
            .or_default()
            .push_back((nth, error));
    }

    fn take_write_failure(&mut self, kind: WriteKind) -> Option<GatewayError> {
        let call = *self.write_counts.get(&kind).unwrap_or(&0);
        self.write_counts.insert(kind, call + 1);
        let queue = self.write_failures.get_mut(&kind)?;
        let pos = queue.iter().position(|(nth, _)| *nth == call)?;
        queue.remove(pos).map(|(_, e)| e)
    }

    fn log_write(&mut self, kind: WriteKind, table: &str, records: Vec<Record>) {
        self.write_log.push(WriteCall {
            kind,
            table: table.to_string(),
            records,
        });
    }

    fn position_of(&self, table: &str, id: &RowId) -> Option<usize> {
        self.tables
            .get(table)?
            .iter()
            .position(|row| row.identity(&self.id_field).as_ref() == Some(id))
    }

    fn missing(id: &RowId) -> GatewayError {
        GatewayError::Status {
            status: 404,
            message: format!("Record '{}' not found", id),
        }
    }
}

impl RecordGateway for InMemoryGateway {
    fn list_page(&self, table: &str, query: &ListQuery) -> GatewayResult<Page> {
        self.list_log
            .borrow_mut()
            .push((table.to_string(), query.clone()));
        if let Some(error) = self.list_failures.borrow_mut().pop_front() {
            return Err(error);
        }

        let conditions = match &query.where_clause {
            None => Vec::new(),
            Some(clause) => parse_eq_clause(clause)
                .ok_or_else(|| GatewayError::Status {
                    status: 422,
                    message: format!("Unsupported where clause: {}", clause),
                })?,
        };

        let matching: Vec<&Record> = self
            .rows(table)
            .iter()
            .filter(|row| {
                conditions.iter().all(|c| {
                    row.get(&c.field)
                        .is_some_and(|v| canonical_value(v) == c.value)
                })
            })
            .collect();

        let limit = query.limit.unwrap_or(self.page_size).max(1);
        let rows = matching
            .iter()
            .skip(query.offset)
            .take(limit)
            .map(|r| (*r).clone())
            .collect();

        Ok(Page {
            rows,
            total_rows: matching.len(),
        })
    }

    fn create_many(&mut self, table: &str, records: &[Record]) -> GatewayResult<BatchResult> {
        self.log_write(WriteKind::Create, table, records.to_vec());
        if let Some(error) = self.take_write_failure(WriteKind::Create) {
            return Err(error);
        }

        let mut created = Vec::with_capacity(records.len());
        for record in records {
            let id = match record.identity(&self.id_field) {
                Some(id) => id,
                None => {
                    let id = RowId::from(self.next_id);
                    self.next_id += 1;
                    id
                }
            };
            let row = record.clone().with_identity(&self.id_field, &id);
            self.tables.entry(table.to_string()).or_default().push(row);
            created.push(Record::new().with_identity(&self.id_field, &id));
        }
        Ok(BatchResult { rows: created })
    }

    fn update_many(&mut self, table: &str, records: &[Record]) -> GatewayResult<BatchResult> {
        self.log_write(WriteKind::Update, table, records.to_vec());
        if let Some(error) = self.take_write_failure(WriteKind::Update) {
            return Err(error);
        }

        let mut targets = Vec::with_capacity(records.len());
        for record in records {
            let id = record
                .identity(&self.id_field)
                .ok_or_else(|| GatewayError::Status {
                    status: 400,
                    message: format!("Missing '{}' in update payload", self.id_field),
                })?;
            let pos = self.position_of(table, &id).ok_or_else(|| Self::missing(&id))?;
            targets.push((pos, id, record));
        }

        let mut updated = Vec::with_capacity(targets.len());
        let stored = self.tables.entry(table.to_string()).or_default();
        for (pos, id, record) in targets {
            for (field, value) in record.as_map() {
                stored[pos].insert(field.clone(), value.clone());
            }
            updated.push(Record::new().with_identity(&self.id_field, &id));
        }
        Ok(BatchResult { rows: updated })
    }

    fn delete_many(&mut self, table: &str, ids: &[RowId]) -> GatewayResult<BatchResult> {
        let payload = ids
            .iter()
            .map(|id| Record::new().with_identity(&self.id_field, id))
            .collect();
        self.log_write(WriteKind::Delete, table, payload);
        if let Some(error) = self.take_write_failure(WriteKind::Delete) {
            return Err(error);
        }

        if let Some(id) = ids.iter().find(|id| self.position_of(table, id).is_none()) {
            return Err(Self::missing(id));
        }
        let id_field = self.id_field.clone();
        let stored = self.tables.entry(table.to_string()).or_default();
        stored.retain(|row| {
            row.identity(&id_field)
                .map_or(true, |id| !ids.contains(&id))
        });

        Ok(BatchResult {
            rows: ids
                .iter()
                .map(|id| Record::new().with_identity(&id_field, id))
                .collect(),
        })
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use serde_json::json;

    pub struct GatewayFixture {
        pub gateway: InMemoryGateway,
    }

    impl Default for GatewayFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl GatewayFixture {
        pub fn new() -> Self {
            Self {
                gateway: InMemoryGateway::new(),
            }
        }

        pub fn with_table(mut self, table: &str) -> Self {
            self.gateway.insert_rows(table, Vec::new());
            self
        }

        /// Seed rows from JSON objects.
        pub fn with_rows(mut self, table: &str, rows: Value) -> Self {
            let rows = match rows {
                Value::Array(items) => items,
                other => vec![other],
            };
            let records = rows
                .into_iter()
                .map(|v| Record::try_from(v).expect("fixture rows must be objects"));
            self.gateway.insert_rows(table, records);
            self
        }

        /// Seed `count` rows `{Id: n, Email: "user{n}@x.com"}`.
        pub fn with_numbered_rows(mut self, table: &str, count: i64) -> Self {
            let records = (1..=count).map(|n| {
                Record::try_from(json!({"Id": n, "Email": format!("user{}@x.com", n)}))
                    .expect("object")
            });
            self.gateway.insert_rows(table, records);
            self
        }

        pub fn with_page_size(mut self, page_size: usize) -> Self {
            self.gateway.set_page_size(page_size);
            self
        }
    }
}
