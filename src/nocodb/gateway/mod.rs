//! # Record Gateway
//!
//! This module defines the boundary between the reconciler and the remote table
//! service. The [`RecordGateway`] trait is the only thing the command layer knows
//! about the network.
//!
//! ## Design Rationale
//!
//! The gateway is abstracted behind a trait to:
//! - Enable **testing** with `InMemoryGateway` (no HTTP server needed)
//! - Keep reconciliation logic **decoupled** from the wire format
//! - Keep retry/timeout policy in one place: the gateway retries, the reconciler never does
//!
//! ## Implementations
//!
//! - [`http::HttpGateway`]: Production client for the NocoDB v2 data API
//!   - `GET/POST/PATCH/DELETE /api/v2/tables/{table}/records`
//!   - Retries transport errors and configured status codes
//!
//! - [`memory::InMemoryGateway`]: In-memory tables for testing
//!   - Records every call so tests can assert on what was sent
//!   - Supports paging, `eq` filters and injected failures
//!
//! ## Paging
//!
//! [`pages::RowPages`] wraps `list_page` in a lazy, finite iterator that stops once
//! the reported total row count has been consumed.

use crate::model::{Record, RowId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub mod filter;
pub mod http;
pub mod memory;
pub mod pages;

pub use pages::RowPages;

/// Opaque failure of a gateway call. Carried inside per-record outcomes, hence `Clone`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("invalid client configuration: {0}")]
    Config(String),
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Query for one page of rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// NocoDB `where` expression, e.g. `(Email,eq,a@x.com)`.
    pub where_clause: Option<String>,
    /// Page size. `None` leaves it to the gateway's default.
    pub limit: Option<usize>,
    pub offset: usize,
    pub sort: Option<String>,
    pub fields: Option<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_where(mut self, where_clause: Option<String>) -> Self {
        self.where_clause = where_clause;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// One page of rows plus the total row count the server reports for the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub rows: Vec<Record>,
    pub total_rows: usize,
}

/// Rows returned by a batched write (typically `{"Id": n}` per record).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub rows: Vec<Record>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteKind::Create => write!(f, "create"),
            WriteKind::Update => write!(f, "update"),
            WriteKind::Delete => write!(f, "delete"),
        }
    }
}

/// Paged listing and batched writes against named tables.
pub trait RecordGateway {
    /// Fetch one page of rows.
    fn list_page(&self, table: &str, query: &ListQuery) -> GatewayResult<Page>;

    /// Create rows, preserving input order.
    fn create_many(&mut self, table: &str, records: &[Record]) -> GatewayResult<BatchResult>;

    /// Update rows. Every record must carry its identity field.
    fn update_many(&mut self, table: &str, records: &[Record]) -> GatewayResult<BatchResult>;

    /// Delete rows by identity.
    fn delete_many(&mut self, table: &str, ids: &[RowId]) -> GatewayResult<BatchResult>;
}
