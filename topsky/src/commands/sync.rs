// topsky/src/commands/sync.rs
//! `poll`, `sync-once` and `backfill`.

use anyhow::Result;
use chrono::NaiveDate;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use topsky_core::plan_windows;

use super::{info_msg, stdout_supports_color, success_msg, warn_msg, RunContext};
use crate::ui::output_format;

/// Runs the background poller until Ctrl-C or until `for_secs` elapses.
pub async fn poll(ctx: &RunContext, for_secs: Option<u64>) -> Result<()> {
    let service = ctx.sync_service().await?;

    let outcome = service.start().await;
    if !outcome.started {
        warn_msg("Poller did not start.", &ctx.theme);
        return Ok(());
    }
    info_msg(
        format!(
            "Polling Newsky every {}s. Press Ctrl-C to stop.",
            ctx.config.sync.poll_interval_secs
        ),
        &ctx.theme,
    );

    match for_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Interrupt received, stopping poller");
        }
    }

    service.stop().await;
    let status = service.status().await;
    for line in status.recent_log_lines.iter().rev() {
        info_msg(line, &ctx.theme);
    }
    service.dispose().await;
    success_msg("Poller stopped.", &ctx.theme);
    Ok(())
}

pub async fn sync_once(ctx: &RunContext) -> Result<()> {
    let service = ctx.sync_service().await?;
    let result = service.run_once().await;
    service.dispose().await;

    let report = result?;
    println!(
        "{}",
        output_format::run_report_table(&report, &ctx.theme, stdout_supports_color())
    );
    success_msg(report.summary(), &ctx.theme);
    Ok(())
}

pub async fn backfill(ctx: &RunContext, start: NaiveDate, end: NaiveDate) -> Result<()> {
    let windows = plan_windows(start, end, ctx.config.sync.backfill_window_days)?;
    info_msg(
        format!(
            "Backfilling {} to {} in {} window(s), pausing {}s between requests.",
            start,
            end,
            windows.len(),
            ctx.config.sync.backfill_request_delay_secs
        ),
        &ctx.theme,
    );

    let service = Arc::new(ctx.sync_service().await?);
    let interrupt = {
        let service = Arc::clone(&service);
        let theme = ctx.theme.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn_msg("Interrupted; stopping after the current record.", &theme);
                service.dispose().await;
            }
        })
    };

    let result = service.run_backfill(start, end).await;
    interrupt.abort();
    service.dispose().await;

    let report = result?;
    println!(
        "{}",
        output_format::backfill_table(&report, &ctx.theme, stdout_supports_color())
    );
    success_msg("Backfill complete.", &ctx.theme);
    Ok(())
}
