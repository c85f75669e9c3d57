use crate::commands::{CmdMessage, CmdResult, OutcomeStatus, RecordOutcome};
use crate::error::{NocoError, RecordError, Result};
use crate::gateway::{BatchResult, GatewayResult};
use crate::model::{FailurePolicy, Record};
use tracing::{debug, info, warn};

/// Payloads queued for one kind of write, each tagged with its input position.
pub struct Staged<T> {
    indexes: Vec<usize>,
    payloads: Vec<T>,
}

impl<T> Default for Staged<T> {
    fn default() -> Self {
        Self {
            indexes: Vec::new(),
            payloads: Vec::new(),
        }
    }
}

impl<T> Staged<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, index: usize, payload: T) {
        self.indexes.push(index);
        self.payloads.push(payload);
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }
}

/// The record a fail-fast run stopped at, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abort {
    pub index: usize,
    pub cause: RecordError,
}

/// Record a record-level rejection. Returns the abort under fail-fast.
pub fn reject(
    policy: FailurePolicy,
    index: usize,
    reason: RecordError,
    outcomes: &mut Vec<RecordOutcome>,
) -> Option<Abort> {
    warn!(index, kind = reason.kind(), "record rejected: {}", reason);
    match policy {
        FailurePolicy::FailFast => Some(Abort {
            index,
            cause: reason,
        }),
        FailurePolicy::ContinueOnError => {
            outcomes.push(RecordOutcome::rejected(index, reason));
            None
        }
    }
}

/// Submit staged payloads in batches of `batch_size`.
///
/// `status` builds each record's outcome from its payload and, when the gateway
/// returned one row per payload, the matching returned row. A failed batch either
/// aborts (fail-fast) or rejects each of its records and moves on.
pub fn write_batches<T, W, S>(
    staged: Staged<T>,
    batch_size: usize,
    policy: FailurePolicy,
    mut write: W,
    mut status: S,
    outcomes: &mut Vec<RecordOutcome>,
) -> Option<Abort>
where
    W: FnMut(&[T]) -> GatewayResult<BatchResult>,
    S: FnMut(&T, Option<&Record>) -> OutcomeStatus,
{
    let size = batch_size.max(1);
    for (indexes, payloads) in staged
        .indexes
        .chunks(size)
        .zip(staged.payloads.chunks(size))
    {
        match write(payloads) {
            Ok(result) => {
                debug!(records = payloads.len(), returned = result.rows.len(), "batch written");
                let returned = (result.rows.len() == payloads.len()).then_some(&result.rows);
                for (pos, (index, payload)) in indexes.iter().zip(payloads).enumerate() {
                    let row = returned.and_then(|rows| rows.get(pos));
                    outcomes.push(RecordOutcome::new(*index, status(payload, row)));
                }
            }
            Err(error) => {
                warn!(records = payloads.len(), "batch failed: {}", error);
                let cause = RecordError::Gateway(error);
                match policy {
                    FailurePolicy::FailFast => {
                        return Some(Abort {
                            index: indexes[0],
                            cause,
                        })
                    }
                    FailurePolicy::ContinueOnError => {
                        outcomes.extend(
                            indexes
                                .iter()
                                .map(|index| RecordOutcome::rejected(*index, cause.clone())),
                        );
                    }
                }
            }
        }
    }
    None
}

/// Order outcomes by input position and turn them into the command result.
pub fn finish(
    operation: &str,
    table: &str,
    mut outcomes: Vec<RecordOutcome>,
    abort: Option<Abort>,
) -> Result<CmdResult> {
    outcomes.sort_by_key(|o| o.index);

    if let Some(Abort { index, cause }) = abort {
        info!(
            operation,
            table,
            index,
            completed = outcomes.len(),
            "aborted"
        );
        return Err(NocoError::Aborted {
            index,
            cause,
            completed: outcomes,
        });
    }

    let mut result = CmdResult::default().with_outcomes(outcomes);
    let summary = result.summary();
    info!(operation, table, %summary, "done");

    let rejections: Vec<CmdMessage> = result
        .outcomes
        .iter()
        .filter_map(|o| {
            o.reason()
                .map(|r| CmdMessage::warning(format!("Record {}: {}", o.index, r)))
        })
        .collect();
    result.messages.extend(rejections);

    if summary.rejected > 0 {
        result.add_message(CmdMessage::warning(format!(
            "{} on {}: {}",
            operation, table, summary
        )));
    } else {
        result.add_message(CmdMessage::success(format!(
            "{} on {}: {}",
            operation, table, summary
        )));
    }
    Ok(result)
}
