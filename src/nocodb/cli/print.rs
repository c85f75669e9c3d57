use colored::Colorize;
use nocodb::commands::{CmdMessage, MessageLevel, OutcomeSummary, RecordOutcome};
use nocodb::error::{NocoError, Result};
use nocodb::model::Record;
use serde::Serialize;
use serde_json::json;

const QUIET_ENV: &str = "NOCO_QUIET";

/// Writes command output (JSON) to stdout.
#[derive(Debug, Clone)]
pub(super) struct Output {
    pretty: bool,
    quiet: bool,
}

impl Output {
    pub(super) fn new(pretty: bool) -> Self {
        let quiet = std::env::var(QUIET_ENV).is_ok_and(|v| v == "1");
        Self { pretty, quiet }
    }

    pub(super) fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        if self.quiet {
            return Ok(());
        }
        println!("{}", render_json(value, self.pretty)?);
        Ok(())
    }

    pub(super) fn text(&self, text: &str) {
        if !self.quiet {
            println!("{}", text);
        }
    }

    pub(super) fn rows(&self, rows: &[Record], total_rows: Option<usize>) -> Result<()> {
        self.json(&json!({
            "list": rows,
            "pageInfo": { "totalRows": total_rows.unwrap_or(rows.len()) },
        }))
    }

    pub(super) fn outcomes(&self, outcomes: &[RecordOutcome]) -> Result<()> {
        self.json(&json!({
            "outcomes": outcomes,
            "summary": OutcomeSummary::from_outcomes(outcomes),
        }))
    }
}

pub(super) fn render_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

/// Messages go to stderr so stdout stays machine-readable.
pub(super) fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => eprintln!("{}", message.content.dimmed()),
            MessageLevel::Success => eprintln!("{}", message.content.green()),
            MessageLevel::Warning => eprintln!("{}", message.content.yellow()),
            MessageLevel::Error => eprintln!("{}", message.content.red()),
        }
    }
}

pub(super) fn print_error(err: &NocoError) {
    eprintln!("{} {}", "Error:".red().bold(), err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nocodb::commands::OutcomeStatus;

    #[test]
    fn compact_and_pretty_json() {
        let value = json!({"a": 1});
        assert_eq!(render_json(&value, false).unwrap(), r#"{"a":1}"#);
        assert_eq!(render_json(&value, true).unwrap(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn outcome_report_shape() {
        let outcomes = vec![RecordOutcome::new(0, OutcomeStatus::Created { id: None })];
        let value = json!({
            "outcomes": outcomes,
            "summary": OutcomeSummary::from_outcomes(&outcomes),
        });
        assert_eq!(value["summary"]["created"], 1);
        assert_eq!(value["outcomes"][0]["status"], "created");
    }
}
