//! # CLI Layer
//!
//! This module is **one possible UI client** for the reconciler, not the application
//! itself.
//!
//! The CLI layer is the **only** place in the codebase that:
//! - Knows about terminal I/O (stdout, stderr) and exit codes
//! - Reads the environment and the config file
//! - Handles argument parsing and input files
//!
//! ## Output Contract
//!
//! - stdout carries JSON only (suppressed with `NOCO_QUIET=1`)
//! - stderr carries messages, errors and logs
//! - exit code `0` on success, `1` when the operation failed (including a fail-fast
//!   abort, whose completed outcomes are still printed), `2` when a bulk operation
//!   completed with rejected records
//!
//! ## Structure
//!
//! - `run()`: Main dispatch logic (called by `main.rs`)
//! - `init_context()`: Builds `AppContext` with API and configuration
//! - `handle_*()`: Per-command handlers that call API and format output

use super::print::{print_error, print_messages, Output};
use super::setup::{Cli, Commands, ConfigCommands, DataInput, HeaderCommands, RowCommands};
use clap::Parser;
use nocodb::api::{apply_match_values, parse_match_spec, NocoApi};
use nocodb::commands::config::{self, ConfigAction, HeaderAction};
use nocodb::commands::{CmdResult, MessageLevel, OutcomeSummary};
use nocodb::config::{config_dir, NocoConfig};
use nocodb::error::{NocoError, Result};
use nocodb::gateway::http::HttpGateway;
use nocodb::gateway::ListQuery;
use nocodb::model::{FailurePolicy, Record, UpsertMode};
use serde_json::{json, Value};
use std::io::Read;
use std::path::Path;
use tracing_subscriber::EnvFilter;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_PARTIAL: i32 = 2;

struct AppContext {
    api: NocoApi<HttpGateway>,
    out: Output,
}

pub fn run() -> i32 {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let out = Output::new(cli.pretty);

    match dispatch(cli, &out) {
        Ok(code) => code,
        Err(NocoError::Aborted {
            index,
            cause,
            completed,
        }) => {
            let report = json!({
                "outcomes": completed,
                "summary": OutcomeSummary::from_outcomes(&completed),
                "abortedAt": index,
                "error": cause,
            });
            if let Err(e) = out.json(&report) {
                print_error(&e);
            }
            print_error(&NocoError::Aborted {
                index,
                cause,
                completed: Vec::new(),
            });
            EXIT_FAILED
        }
        Err(e) => {
            print_error(&e);
            EXIT_FAILED
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,nocodb={}", level)));
    // Fails only when a global subscriber is already installed; keep that one.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn dispatch(cli: Cli, out: &Output) -> Result<i32> {
    match cli.command {
        Commands::Config(cmd) => {
            let dir = config_dir()?;
            match cmd {
                ConfigCommands::Show => handle_config(&dir, ConfigAction::ShowAll, out),
                ConfigCommands::Get { key } => handle_config(&dir, ConfigAction::ShowKey(key), out),
                ConfigCommands::Set { key, value } => {
                    handle_config(&dir, ConfigAction::Set(key, value), out)
                }
            }
        }
        Commands::Header(cmd) => {
            let dir = config_dir()?;
            let action = match cmd {
                HeaderCommands::List => HeaderAction::List,
                HeaderCommands::Set { name, value } => HeaderAction::Set(name, value),
                HeaderCommands::Delete { name } => HeaderAction::Delete(name),
            };
            handle_headers(&dir, action, out)
        }
        Commands::Rows(cmd) => {
            let mut ctx = init_context(cli.timeout, cli.retries, out)?;
            match cmd {
                RowCommands::List {
                    table,
                    where_clause,
                    sort,
                    fields,
                    limit,
                    offset,
                    all,
                } => {
                    let query = ListQuery {
                        where_clause,
                        limit,
                        offset: offset.unwrap_or(0),
                        sort,
                        fields,
                    };
                    handle_list(&ctx, &table, query, all)
                }
                RowCommands::Upsert {
                    table,
                    matches,
                    input,
                    create_only,
                    update_only,
                } => {
                    let mode = if create_only {
                        UpsertMode::CreateOnly
                    } else if update_only {
                        UpsertMode::UpdateOnly
                    } else {
                        UpsertMode::Normal
                    };
                    handle_upsert(&mut ctx, &table, &matches, &input, mode)
                }
                RowCommands::BulkUpsert {
                    table,
                    matches,
                    input,
                    fail_fast,
                } => {
                    let spec = parse_match_spec(&matches)?;
                    let records = read_records(&input)?;
                    let result = ctx.api.bulk_upsert(
                        &table,
                        &spec,
                        records,
                        FailurePolicy::from_flag(fail_fast),
                    )?;
                    report_bulk(&ctx, result)
                }
                RowCommands::BulkCreate {
                    table,
                    input,
                    fail_fast,
                } => {
                    let records = read_records(&input)?;
                    let result =
                        ctx.api
                            .bulk_create(&table, records, FailurePolicy::from_flag(fail_fast))?;
                    report_bulk(&ctx, result)
                }
                RowCommands::BulkUpdate {
                    table,
                    input,
                    fail_fast,
                } => {
                    let records = read_records(&input)?;
                    let result =
                        ctx.api
                            .bulk_update(&table, records, FailurePolicy::from_flag(fail_fast))?;
                    report_bulk(&ctx, result)
                }
                RowCommands::BulkDelete {
                    table,
                    input,
                    fail_fast,
                } => {
                    let records = read_records(&input)?;
                    let result =
                        ctx.api
                            .bulk_delete(&table, records, FailurePolicy::from_flag(fail_fast))?;
                    report_bulk(&ctx, result)
                }
            }
        }
    }
}

fn init_context(timeout: Option<u64>, retries: Option<u32>, out: &Output) -> Result<AppContext> {
    let dir = config_dir()?;
    let mut config = NocoConfig::load(&dir)?;
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(ms) = timeout {
        config.settings.timeout_ms = ms;
    }
    if let Some(n) = retries {
        config.settings.retry_count = n;
    }

    let gateway = HttpGateway::new(&config.client_config()?)?;
    Ok(AppContext {
        api: NocoApi::new(gateway, config.reconcile_options()),
        out: out.clone(),
    })
}

fn handle_list(ctx: &AppContext, table: &str, query: ListQuery, all: bool) -> Result<i32> {
    let result = ctx.api.list_rows(table, query, all)?;
    ctx.out.rows(&result.rows, result.total_rows)?;
    print_messages(&result.messages);
    Ok(EXIT_OK)
}

fn handle_upsert(
    ctx: &mut AppContext,
    table: &str,
    matches: &[String],
    input: &DataInput,
    mode: UpsertMode,
) -> Result<i32> {
    let mut record = Record::try_from(read_input(input)?)?;
    let spec = apply_match_values(&mut record, matches)?;
    let result = ctx.api.upsert_one(table, &spec, record, mode)?;
    if let Some(row) = result.rows.first() {
        ctx.out.json(row)?;
    }
    print_messages(&result.messages);
    Ok(EXIT_OK)
}

fn report_bulk(ctx: &AppContext, result: CmdResult) -> Result<i32> {
    ctx.out.outcomes(&result.outcomes)?;
    print_messages(&result.messages);
    Ok(if result.has_failures() {
        EXIT_PARTIAL
    } else {
        EXIT_OK
    })
}

fn handle_config(dir: &Path, action: ConfigAction, out: &Output) -> Result<i32> {
    let show_key = matches!(action, ConfigAction::ShowKey(_));
    let result = config::run(dir, action)?;

    if show_key {
        for message in &result.messages {
            if message.level == MessageLevel::Info {
                out.text(&message.content);
            }
        }
        let errors: Vec<_> = result
            .messages
            .iter()
            .filter(|m| m.level == MessageLevel::Error)
            .cloned()
            .collect();
        print_messages(&errors);
    } else {
        if let Some(config) = &result.config {
            if result.messages.is_empty() {
                out.json(config)?;
            }
        }
        print_messages(&result.messages);
    }
    Ok(exit_for_messages(&result))
}

fn handle_headers(dir: &Path, action: HeaderAction, out: &Output) -> Result<i32> {
    let list = matches!(action, HeaderAction::List);
    let result = config::headers(dir, action)?;
    if list {
        if let Some(config) = &result.config {
            out.json(&config.headers)?;
        }
    }
    print_messages(&result.messages);
    Ok(exit_for_messages(&result))
}

fn exit_for_messages(result: &CmdResult) -> i32 {
    if result
        .messages
        .iter()
        .any(|m| m.level == MessageLevel::Error)
    {
        EXIT_FAILED
    } else {
        EXIT_OK
    }
}

fn read_input(input: &DataInput) -> Result<Value> {
    let text = match (&input.data, &input.data_file) {
        (Some(data), _) => data.clone(),
        (None, Some(path)) if path.as_os_str() == "-" => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            return Err(NocoError::Api(
                "Provide the records with --data or --data-file".to_string(),
            ))
        }
    };
    Ok(serde_json::from_str(&text)?)
}

fn read_records(input: &DataInput) -> Result<Vec<Record>> {
    records_from_value(read_input(input)?)
}

fn records_from_value(value: Value) -> Result<Vec<Record>> {
    match value {
        Value::Array(items) => items.into_iter().map(Record::try_from).collect(),
        _ => Err(NocoError::Api(
            "Bulk commands expect a JSON array of objects".to_string(),
        )),
    }
}
