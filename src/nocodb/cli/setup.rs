use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Returns the version string, including git hash and commit date for non-release builds.
/// Format: "0.3.0" for releases, "0.3.0@abc1234 2024-01-15 14:30" for dev builds
fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_COMMIT_DATE: &str = env!("GIT_COMMIT_DATE");
    const IS_RELEASE: &str = env!("IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" || GIT_HASH.is_empty() {
            VERSION.to_string()
        } else {
            format!("{}@{} {}", VERSION, GIT_HASH, GIT_COMMIT_DATE)
        }
    })
}

#[derive(Parser, Debug)]
#[command(name = "nocodb", bin_name = "nocodb", version = get_version())]
#[command(
    about = "Command-line client for NocoDB with match-based row reconciliation",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,

    /// Indent JSON output
    #[arg(long, global = true, help_heading = "Options")]
    pub pretty: bool,

    /// Request timeout in milliseconds
    #[arg(long, global = true, value_name = "MS", help_heading = "Options")]
    pub timeout: Option<u64>,

    /// Retries for failed requests
    #[arg(long, global = true, value_name = "N", help_heading = "Options")]
    pub retries: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List, upsert and batch-write table rows
    #[command(subcommand)]
    Rows(RowCommands),

    /// Show or change configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Manage headers sent with every request
    #[command(subcommand)]
    Header(HeaderCommands),
}

/// Where record JSON comes from.
#[derive(Args, Debug, Clone)]
pub struct DataInput {
    /// JSON object or array of objects
    #[arg(long, conflicts_with = "data_file")]
    pub data: Option<String>,

    /// File holding the JSON input (`-` reads stdin)
    #[arg(long, value_name = "PATH")]
    pub data_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum RowCommands {
    /// List rows of a table
    List {
        table: String,

        /// NocoDB where expression, e.g. (Email,eq,a@x.com)
        #[arg(long = "where", value_name = "EXPR")]
        where_clause: Option<String>,

        /// Sort expression, e.g. -CreatedAt
        #[arg(long)]
        sort: Option<String>,

        /// Comma-separated fields to return
        #[arg(long)]
        fields: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        offset: Option<usize>,

        /// Follow pagination and return every row
        #[arg(long)]
        all: bool,
    },

    /// Create or update one row matched on --match fields
    Upsert {
        table: String,

        /// Match field, a comma-separated list, or Field=value to fill the record
        #[arg(long = "match", required = true, value_name = "FIELD[=VALUE]")]
        matches: Vec<String>,

        #[command(flatten)]
        input: DataInput,

        /// Fail if a matching row already exists
        #[arg(long, conflicts_with = "update_only")]
        create_only: bool,

        /// Fail if no matching row exists
        #[arg(long)]
        update_only: bool,
    },

    /// Upsert many rows against one read of the table
    BulkUpsert {
        table: String,

        /// Match field(s), comma-separated or repeated
        #[arg(long = "match", required = true, value_name = "FIELDS")]
        matches: Vec<String>,

        #[command(flatten)]
        input: DataInput,

        /// Stop at the first failed record
        #[arg(long)]
        fail_fast: bool,
    },

    /// Create rows in batches
    BulkCreate {
        table: String,

        #[command(flatten)]
        input: DataInput,

        /// Stop at the first failed record
        #[arg(long)]
        fail_fast: bool,
    },

    /// Update rows by identity in batches
    BulkUpdate {
        table: String,

        #[command(flatten)]
        input: DataInput,

        /// Stop at the first failed record
        #[arg(long)]
        fail_fast: bool,
    },

    /// Delete rows by identity in batches
    BulkDelete {
        table: String,

        #[command(flatten)]
        input: DataInput,

        /// Stop at the first failed record
        #[arg(long)]
        fail_fast: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the whole configuration
    Show,
    /// Print one value
    Get { key: String },
    /// Set one value
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
pub enum HeaderCommands {
    /// Print configured headers
    List,
    /// Set a header
    Set { name: String, value: String },
    /// Remove a header
    Delete { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bulk_upsert() {
        let cli = Cli::try_parse_from([
            "nocodb",
            "rows",
            "bulk-upsert",
            "people",
            "--match",
            "Email",
            "--data",
            "[]",
            "--fail-fast",
        ])
        .unwrap();
        match cli.command {
            Commands::Rows(RowCommands::BulkUpsert {
                table,
                matches,
                fail_fast,
                ..
            }) => {
                assert_eq!(table, "people");
                assert_eq!(matches, vec!["Email"]);
                assert!(fail_fast);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn upsert_modes_conflict() {
        let parsed = Cli::try_parse_from([
            "nocodb",
            "rows",
            "upsert",
            "t",
            "--match",
            "Email",
            "--data",
            "{}",
            "--create-only",
            "--update-only",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn upsert_requires_match() {
        let parsed = Cli::try_parse_from(["nocodb", "rows", "upsert", "t", "--data", "{}"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nocodb", "rows", "list", "t", "--all", "--pretty", "--timeout", "500", "-v",
        ])
        .unwrap();
        assert!(cli.pretty);
        assert!(cli.verbose);
        assert_eq!(cli.timeout, Some(500));
    }
}
