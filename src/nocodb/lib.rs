//! # nocodb Architecture
//!
//! A command-line client for NocoDB built around a **row reconciliation engine**: given
//! a table, a set of match fields and some records, decide per record whether a
//! remote row already exists, then create, update or reject it.
//!
//! As with any UI-agnostic library, the CLI is one client of the core, not the core
//! itself.
//!
//! ## The Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (cli/, wired by main.rs)                         │
//! │  - Parses arguments, reads input, prints JSON and messages  │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - NocoApi<G>: thin facade over commands                    │
//! │  - Built from an explicit ReconcileOptions object           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs) + matcher.rs                 │
//! │  - Upsert, bulk upsert, bulk create/update/delete, list     │
//! │  - Pure logic over a RecordGateway, returns CmdResult       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Gateway Layer (gateway/)                                   │
//! │  - Abstract RecordGateway trait, lazy RowPages              │
//! │  - HttpGateway (production), InMemoryGateway (testing)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principle: No Ambient State
//!
//! The CLI loads [`config::NocoConfig`] once and turns it into a
//! [`gateway::http::ClientConfig`] and a [`commands::ReconcileOptions`]. Nothing below
//! the CLI reads the environment or the config file, and no state survives between
//! invocations: every operation fetches fresh rows.
//!
//! ## Failure Reporting
//!
//! Single-record operations surface their first error. Bulk operations either abort
//! (`--fail-fast`, [`error::NocoError::Aborted`] carrying the outcomes completed so
//! far) or return one [`commands::RecordOutcome`] per input record with typed
//! rejections. Nothing is retried above the gateway.
//!
//! ## Testing Strategy
//!
//! 1. **Commands** (`commands/*.rs`): the bulk of the tests, run against
//!    `InMemoryGateway`, asserting on the exact calls the gateway received.
//! 2. **API** (`api.rs`): dispatch only.
//! 3. **Gateway** (`tests/http_gateway.rs`): the HTTP client against a mock server.
//! 4. **CLI** (`tests/cli.rs`): the binary end to end.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade, entry point for all operations
//! - [`commands`]: Reconciliation and batch write logic
//! - [`matcher`]: Match keys, the per-record matcher and the existing-row index
//! - [`gateway`]: Record gateway abstraction and implementations
//! - [`model`]: Core data types (`Record`, `RowId`, `MatchSpec`)
//! - [`config`]: Configuration management
//! - [`error`]: Error types
//! - `cli`: Argument parsing and printing for the binary (not part of the lib API)

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod matcher;
pub mod model;
