use crate::config::NocoConfig;
use crate::error::RecordError;
use crate::model::{Record, RowId, DEFAULT_ID_FIELD};
use serde::Serialize;
use std::fmt;

pub mod bulk;
pub mod bulk_upsert;
pub mod config;
pub mod helpers;
pub mod list;
pub mod upsert;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Knobs the reconciler needs, resolved from configuration by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub id_field: String,
    /// Maximum records per create/update/delete call.
    pub batch_size: usize,
    /// Rows per page when fetching. `None` leaves it to the gateway.
    pub page_size: Option<usize>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            id_field: DEFAULT_ID_FIELD.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            page_size: None,
        }
    }
}

/// Per-record result of a write operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OutcomeStatus {
    Created {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<RowId>,
    },
    Updated {
        id: RowId,
    },
    Deleted {
        id: RowId,
    },
    Rejected {
        reason: RecordError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordOutcome {
    /// Position of the record in the caller's input.
    pub index: usize,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl RecordOutcome {
    pub fn new(index: usize, status: OutcomeStatus) -> Self {
        Self { index, status }
    }

    pub fn rejected(index: usize, reason: RecordError) -> Self {
        Self::new(index, OutcomeStatus::Rejected { reason })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.status, OutcomeStatus::Rejected { .. })
    }

    pub fn reason(&self) -> Option<&RecordError> {
        match &self.status {
            OutcomeStatus::Rejected { reason } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub rejected: usize,
}

impl OutcomeSummary {
    pub fn from_outcomes(outcomes: &[RecordOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome.status {
                OutcomeStatus::Created { .. } => summary.created += 1,
                OutcomeStatus::Updated { .. } => summary.updated += 1,
                OutcomeStatus::Deleted { .. } => summary.deleted += 1,
                OutcomeStatus::Rejected { .. } => summary.rejected += 1,
            }
        }
        summary
    }
}

impl fmt::Display for OutcomeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for (count, label) in [
            (self.created, "created"),
            (self.updated, "updated"),
            (self.deleted, "deleted"),
            (self.rejected, "rejected"),
        ] {
            if count > 0 {
                parts.push(format!("{} {}", count, label));
            }
        }
        if parts.is_empty() {
            parts.push("nothing to do".to_string());
        }
        write!(f, "{} ({} records)", parts.join(", "), self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub outcomes: Vec<RecordOutcome>,
    /// Written rows (upsert) or listed rows (list).
    pub rows: Vec<Record>,
    /// Total row count reported by the server, for listings.
    pub total_rows: Option<usize>,
    pub config: Option<NocoConfig>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_outcomes(mut self, outcomes: Vec<RecordOutcome>) -> Self {
        self.outcomes = outcomes;
        self
    }

    pub fn with_rows(mut self, rows: Vec<Record>) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_total_rows(mut self, total_rows: usize) -> Self {
        self.total_rows = Some(total_rows);
        self
    }

    pub fn with_config(mut self, config: NocoConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary::from_outcomes(&self.outcomes)
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(RecordOutcome::is_rejected)
    }
}
