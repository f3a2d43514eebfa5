// topsky/src/commands/report.rs
//! Read-only reports: `dashboard` and `audit`.

use anyhow::Result;
use chrono::{NaiveDate, Utc};

use super::{info_msg, stdout_supports_color, RunContext};
use crate::ui::output_format;
use crate::ui::theme::ThemeEntry;

pub async fn dashboard(ctx: &RunContext, json: bool) -> Result<()> {
    let flights = ctx.flight_ops().await?;
    let summary = flights.dashboard(Utc::now().date_naive()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let color = stdout_supports_color();
    let heading = |text: &str| output_format::styled(text, ThemeEntry::Header, &ctx.theme, color);

    println!("{}", heading("Totals"));
    println!("{}", output_format::dashboard_totals(&summary, &ctx.theme, color));
    println!();
    println!("{}", heading("Last 30 days"));
    println!("{}", output_format::chart_table(&summary.chart, &ctx.theme, color));
    println!();
    println!("{}", heading("Latest flights"));
    if summary.latest.is_empty() {
        info_msg("No flights stored yet.", &ctx.theme);
    } else {
        println!("{}", output_format::flights_table(&summary.latest, &ctx.theme, color));
    }
    Ok(())
}

pub async fn audit(ctx: &RunContext, start: NaiveDate, end: NaiveDate, json: bool) -> Result<()> {
    let flights = ctx.flight_ops().await?;
    let rows = flights.vatsim_audit(start, end).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        info_msg(format!("No confirmed VATSIM flights between {start} and {end}."), &ctx.theme);
        return Ok(());
    }
    println!(
        "{}",
        output_format::audit_table(&rows, &ctx.theme, stdout_supports_color())
    );
    info_msg(format!("{} confirmed VATSIM flight(s).", rows.len()), &ctx.theme);
    Ok(())
}
