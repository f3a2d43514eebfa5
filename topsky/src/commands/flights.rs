// topsky/src/commands/flights.rs
//! Store-only commands: `count`, `recent`, `retag`, `tag` and `delete`.

use anyhow::Result;

use topsky_core::FlightSummary;

use super::{info_msg, stdout_supports_color, success_msg, RunContext};
use crate::ui::output_format;

fn describe(flight: &FlightSummary) -> String {
    format!(
        "{} ({} -> {}, id {})",
        flight.callsign.as_deref().unwrap_or("N/A"),
        flight.departure.as_deref().unwrap_or("N/A"),
        flight.arrival.as_deref().unwrap_or("N/A"),
        flight.id
    )
}

pub async fn count(ctx: &RunContext) -> Result<()> {
    let flights = ctx.flight_ops().await?;
    println!("{}", flights.count().await?);
    Ok(())
}

pub async fn recent(ctx: &RunContext, limit: usize) -> Result<()> {
    let flights = ctx.flight_ops().await?;
    let rows = flights.recent(limit).await?;
    if rows.is_empty() {
        info_msg("No flights stored yet.", &ctx.theme);
        return Ok(());
    }
    println!(
        "{}",
        output_format::flights_table(&rows, &ctx.theme, stdout_supports_color())
    );
    Ok(())
}

pub async fn retag(ctx: &RunContext) -> Result<()> {
    let flights = ctx.flight_ops().await?;
    let report = flights.retag_vatsim().await?;

    if !report.updated_flights.is_empty() {
        println!(
            "{}",
            output_format::retag_table(&report, &ctx.theme, stdout_supports_color())
        );
    }
    success_msg(
        format!(
            "Checked {} flight(s): {} newly tagged, {} already tagged, {} not VATSIM.",
            report.total, report.updated, report.already_tagged, report.unchanged
        ),
        &ctx.theme,
    );
    Ok(())
}

pub async fn tag(ctx: &RunContext, reference: &str, untag: bool) -> Result<()> {
    let flights = ctx.flight_ops().await?;
    let flight = flights.tag_vatsim(reference, untag).await?;
    let verb = if untag { "Removed VATSIM tag from" } else { "Tagged as VATSIM:" };
    success_msg(format!("{} {}", verb, describe(&flight)), &ctx.theme);
    Ok(())
}

pub async fn delete(ctx: &RunContext, reference: &str) -> Result<()> {
    let flights = ctx.flight_ops().await?;
    let flight = flights.delete(reference).await?;
    success_msg(format!("Deleted {}", describe(&flight)), &ctx.theme);
    Ok(())
}
