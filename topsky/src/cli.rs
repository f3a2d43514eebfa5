// topsky/src/cli.rs
//! Command-line definition for the `topsky` binary.
//! License: MIT OR Apache-2.0

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "topsky",
    version = env!("CARGO_PKG_VERSION"),
    about = "Import Newsky flights into MongoDB and tag VATSIM traffic",
    long_about = "Topsky polls the Newsky airline API for recently completed flights, stores them \
    de-duplicated in MongoDB, and marks the ones flown on the VATSIM network. It can also backfill \
    historical date ranges and report on what has been stored.",
    arg_required_else_help = true,
)]
pub struct Cli {
    #[arg(long, short = 'c', global = true, value_name = "FILE", env = "TOPSKY_CONFIG", help = "Path to a YAML configuration file.")]
    pub config: Option<PathBuf>,

    #[arg(long = "api-key", global = true, value_name = "KEY", env = "NEWSKY_API_KEY", hide_env_values = true, help = "Newsky API key (bearer token).")]
    pub api_key: Option<String>,

    #[arg(long = "base-url", global = true, value_name = "URL", env = "NEWSKY_BASE_URL", help = "Base URL of the Newsky airline API.")]
    pub base_url: Option<String>,

    #[arg(long = "mongodb-uri", global = true, value_name = "URI", env = "MONGODB_URI", hide_env_values = true, help = "MongoDB connection string.")]
    pub mongodb_uri: Option<String>,

    /// Keeps flights in process memory instead of MongoDB. Nothing survives the process.
    #[arg(long = "memory-store", global = true, help = "Use a throwaway in-memory store instead of MongoDB.")]
    pub memory_store: bool,

    #[arg(long, short = 'd', global = true, conflicts_with = "quiet", help = "Enable debug logging.")]
    pub debug: bool,

    #[arg(long, short = 'q', global = true, help = "Suppress all informational and debug messages.")]
    pub quiet: bool,

    #[arg(long = "theme", global = true, value_name = "FILE", help = "Specify the path to a custom YAML theme file.")]
    pub theme: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// All available commands for the `topsky` CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Poll Newsky on the configured interval until interrupted.")]
    Poll {
        /// Stops after this many seconds instead of waiting for Ctrl-C.
        #[arg(long = "for-secs", value_name = "SECS", help = "Stop polling after this many seconds.")]
        for_secs: Option<u64>,
    },

    #[command(about = "Run a single import pass over recent flights and exit.")]
    SyncOnce,

    #[command(about = "Import every flight created in a date range, one window at a time.")]
    Backfill(DateRangeArgs),

    #[command(about = "Print the number of stored flights.")]
    Count,

    #[command(about = "List the most recently imported flights.")]
    Recent {
        #[arg(long, short = 'n', default_value_t = 5, help = "Number of flights to show.")]
        limit: usize,
    },

    #[command(about = "Show totals, the 30-day chart and the latest flights.")]
    Dashboard {
        #[arg(long, help = "Print the dashboard as JSON.")]
        json: bool,
    },

    #[command(about = "Re-run VATSIM detection over every stored flight.")]
    Retag,

    #[command(about = "Mark a single flight as flown on VATSIM.")]
    Tag {
        /// Document id, provider id, unique id or callsign.
        #[arg(value_name = "REF", help = "Flight reference: document id, provider id, unique id or callsign.")]
        reference: String,

        #[arg(long, help = "Remove the VATSIM mark instead of setting it.")]
        untag: bool,
    },

    #[command(about = "Delete a single stored flight.")]
    Delete {
        #[arg(value_name = "REF", help = "Flight reference: document id, provider id, unique id or callsign.")]
        reference: String,
    },

    #[command(about = "List confirmed VATSIM flights created in a date range.")]
    Audit {
        #[command(flatten)]
        range: DateRangeArgs,

        #[arg(long, help = "Print the audit rows as JSON.")]
        json: bool,
    },

    #[command(about = "Validate the configuration and print the effective settings.")]
    CheckConfig,
}

/// Inclusive calendar-day range, interpreted in UTC.
#[derive(Args, Debug, Clone)]
pub struct DateRangeArgs {
    #[arg(long, value_name = "YYYY-MM-DD", help = "First day of the range (UTC).")]
    pub start: NaiveDate,

    #[arg(long, value_name = "YYYY-MM-DD", help = "Last day of the range (UTC), inclusive.")]
    pub end: NaiveDate,
}
