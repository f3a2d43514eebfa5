// topsky/src/commands/mod.rs
//! Subcommand implementations and the shared plumbing they need.

pub mod check_config;
pub mod flights;
pub mod report;
pub mod sync;

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use log::debug;
use std::io;
use std::sync::Arc;

use topsky_core::{FlightOps, FlightStore, MemoryStore, MongoStore, NewskyClient, SyncConfig, SyncService, VatsimDetector};

use crate::cli::Commands;
use crate::ui::output_format;
use crate::ui::theme::ThemeMap;

/// Everything a subcommand needs once arguments and configuration are resolved.
pub struct RunContext {
    pub config: SyncConfig,
    pub theme: ThemeMap,
    pub memory_store: bool,
}

impl RunContext {
    /// Opens the configured flight store.
    pub async fn open_store(&self) -> Result<Arc<dyn FlightStore>> {
        if self.memory_store {
            debug!("Using in-memory flight store");
            return Ok(Arc::new(MemoryStore::new()));
        }
        let store = MongoStore::connect(&self.config.storage)
            .await
            .context("Failed to connect to MongoDB")?;
        Ok(Arc::new(store))
    }

    /// Store-only operations; no Newsky credentials required.
    pub async fn flight_ops(&self) -> Result<FlightOps> {
        let detector = VatsimDetector::from_config(&self.config.vatsim)?;
        Ok(FlightOps::new(self.open_store().await?, Arc::new(detector)))
    }

    /// Full sync service. The client is built first so a missing API key fails fast.
    pub async fn sync_service(&self) -> Result<SyncService> {
        let source = Arc::new(NewskyClient::new(&self.config.newsky)?);
        let store = self.open_store().await?;
        Ok(SyncService::new(source, store, &self.config)?)
    }
}

pub async fn dispatch(command: Commands, ctx: &RunContext) -> Result<()> {
    match command {
        Commands::Poll { for_secs } => sync::poll(ctx, for_secs).await,
        Commands::SyncOnce => sync::sync_once(ctx).await,
        Commands::Backfill(range) => sync::backfill(ctx, range.start, range.end).await,
        Commands::Count => flights::count(ctx).await,
        Commands::Recent { limit } => flights::recent(ctx, limit).await,
        Commands::Retag => flights::retag(ctx).await,
        Commands::Tag { reference, untag } => flights::tag(ctx, &reference, untag).await,
        Commands::Delete { reference } => flights::delete(ctx, &reference).await,
        Commands::Dashboard { json } => report::dashboard(ctx, json).await,
        Commands::Audit { range, json } => report::audit(ctx, range.start, range.end, json).await,
        Commands::CheckConfig => check_config::run(ctx),
    }
}

/// Helper for printing info messages to stderr.
pub fn info_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let stderr_supports_color = io::stderr().is_terminal();
    let _ = output_format::print_info_message(&mut io::stderr(), msg.as_ref(), theme, stderr_supports_color);
}

/// Helper for printing success messages to stderr.
pub fn success_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let stderr_supports_color = io::stderr().is_terminal();
    let _ = output_format::print_success_message(&mut io::stderr(), msg.as_ref(), theme, stderr_supports_color);
}

/// Helper for printing warning messages to stderr.
pub fn warn_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let stderr_supports_color = io::stderr().is_terminal();
    let _ = output_format::print_warn_message(&mut io::stderr(), msg.as_ref(), theme, stderr_supports_color);
}

/// Helper for printing error messages to stderr.
pub fn error_msg(msg: impl AsRef<str>, theme: &ThemeMap) {
    let stderr_supports_color = io::stderr().is_terminal();
    let _ = output_format::print_error_message(&mut io::stderr(), msg.as_ref(), theme, stderr_supports_color);
}

pub(crate) fn stdout_supports_color() -> bool {
    io::stdout().is_terminal()
}
