// topsky/src/main.rs
//! Topsky entry point.
//!
//! Resolves configuration (file, then environment, then command-line flags), sets up
//! logging and the colour theme, and hands off to the selected subcommand.

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, LevelFilter};

use topsky::cli::Cli;
use topsky::commands::{dispatch, error_msg, RunContext};
use topsky::logger;
use topsky::ui::theme::{build_theme_map, default_theme_map};
use topsky_core::config::{ENV_API_KEY, ENV_BASE_URL, ENV_MONGODB_URI};
use topsky_core::SyncConfig;

#[tokio::main]
async fn main() {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = if cli.debug {
        Some(LevelFilter::Debug)
    } else if cli.quiet {
        Some(LevelFilter::Off)
    } else {
        None
    };
    logger::init_logger(level);

    if let Err(e) = run(cli).await {
        error_msg(format!("{e:#}"), &default_theme_map());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let theme = build_theme_map(cli.theme.as_deref()).context("Theme error")?;

    let mut config = SyncConfig::resolve(cli.config.as_deref())?;
    config.apply_overrides(|key| match key {
        ENV_API_KEY => cli.api_key.clone(),
        ENV_BASE_URL => cli.base_url.clone(),
        ENV_MONGODB_URI => cli.mongodb_uri.clone(),
        _ => None,
    });
    config.validate()?;
    debug!("Effective configuration: {:?}", config);

    let ctx = RunContext {
        config,
        theme,
        memory_store: cli.memory_store,
    };
    dispatch(cli.command, &ctx).await
}
