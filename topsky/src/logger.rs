// topsky/src/logger.rs
//! Logging setup for the `topsky` binary.
//!
//! Log lines go to stderr so that tables and JSON on stdout stay machine readable.
//! `RUST_LOG` is honoured; `--debug` and `--quiet` replace its level.

use env_logger::{Builder, Env, Target};
use log::LevelFilter;
use std::io::Write;

const DEFAULT_FILTER: &str = "warn,topsky=info,topsky_core=info";

/// Initializes the global logger. Calling it twice is harmless.
pub fn init_logger(level_override: Option<LevelFilter>) {
    let mut builder = Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER));

    if let Some(level) = level_override {
        builder.filter_level(level);
    }

    builder
        .target(Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}: {}",
                buf.timestamp_millis(),
                record.level(),
                record.target(),
                record.args()
            )
        });

    let _ = builder.try_init();
}
