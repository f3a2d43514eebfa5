// topsky/src/ui/output_format.rs
//! Styled messages and tables for terminal output.
//!
//! Status messages go to stderr; tables go to stdout. Colour is only emitted when the
//! caller says the target is a terminal.

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use owo_colors::{AnsiColors, OwoColorize};
use std::io::{self, Write};

use topsky_core::{AuditRow, BackfillReport, DashboardSummary, DayBucket, FlightRow, RetagReport, RunReport};

use super::theme::{ThemeEntry, ThemeMap};

const BAR_WIDTH: usize = 40;

fn ansi_for(entry: ThemeEntry, theme: &ThemeMap) -> Option<AnsiColors> {
    theme
        .get(&entry)
        .and_then(|style| style.fg.as_ref())
        .map(|color| color.to_ansi_color())
}

/// Applies the theme colour for `entry` when colour output is enabled.
pub fn styled(text: &str, entry: ThemeEntry, theme: &ThemeMap, supports_color: bool) -> String {
    match ansi_for(entry, theme) {
        Some(color) if supports_color => text.color(color).to_string(),
        _ => text.to_string(),
    }
}

fn print_message<W: Write>(
    writer: &mut W,
    prefix: &str,
    msg: &str,
    entry: ThemeEntry,
    theme: &ThemeMap,
    supports_color: bool,
) -> io::Result<()> {
    writeln!(writer, "{}", styled(&format!("{prefix}{msg}"), entry, theme, supports_color))
}

pub fn print_info_message<W: Write>(writer: &mut W, msg: &str, theme: &ThemeMap, supports_color: bool) -> io::Result<()> {
    print_message(writer, "", msg, ThemeEntry::Info, theme, supports_color)
}

pub fn print_success_message<W: Write>(writer: &mut W, msg: &str, theme: &ThemeMap, supports_color: bool) -> io::Result<()> {
    print_message(writer, "", msg, ThemeEntry::Success, theme, supports_color)
}

pub fn print_warn_message<W: Write>(writer: &mut W, msg: &str, theme: &ThemeMap, supports_color: bool) -> io::Result<()> {
    print_message(writer, "Warning: ", msg, ThemeEntry::Warn, theme, supports_color)
}

pub fn print_error_message<W: Write>(writer: &mut W, msg: &str, theme: &ThemeMap, supports_color: bool) -> io::Result<()> {
    print_message(writer, "Error: ", msg, ThemeEntry::Error, theme, supports_color)
}

/// Maps a 16-colour ANSI value onto the table crate's palette.
fn table_color(color: AnsiColors) -> Color {
    let index = match color {
        AnsiColors::Black => 0,
        AnsiColors::Red => 1,
        AnsiColors::Green => 2,
        AnsiColors::Yellow => 3,
        AnsiColors::Blue => 4,
        AnsiColors::Magenta => 5,
        AnsiColors::Cyan => 6,
        AnsiColors::White => 7,
        AnsiColors::BrightBlack => 8,
        AnsiColors::BrightRed => 9,
        AnsiColors::BrightGreen => 10,
        AnsiColors::BrightYellow => 11,
        AnsiColors::BrightBlue => 12,
        AnsiColors::BrightMagenta => 13,
        AnsiColors::BrightCyan => 14,
        _ => 15,
    };
    Color::AnsiValue(index)
}

fn cell(text: impl ToString, entry: Option<ThemeEntry>, theme: &ThemeMap) -> Cell {
    let cell = Cell::new(text);
    match entry.and_then(|e| ansi_for(e, theme)) {
        Some(color) => cell.fg(table_color(color)),
        None => cell,
    }
}

fn new_table(headers: &[&str], theme: &ThemeMap, supports_color: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| cell(h, Some(ThemeEntry::Header), theme))
                .collect::<Vec<_>>(),
        );
    if !supports_color {
        table.force_no_tty();
    }
    table
}

fn vatsim_cell(is_vatsim: bool, theme: &ThemeMap) -> Cell {
    if is_vatsim {
        cell("VATSIM", Some(ThemeEntry::Vatsim), theme)
    } else {
        cell("-", Some(ThemeEntry::Muted), theme)
    }
}

pub fn flights_table(rows: &[FlightRow], theme: &ThemeMap, supports_color: bool) -> Table {
    let mut table = new_table(
        &["Flight", "From", "To", "Pilot", "Airline", "Aircraft", "Date", "Network", "Id"],
        theme,
        supports_color,
    );
    for row in rows {
        table.add_row(vec![
            cell(&row.flight_number, None, theme),
            cell(&row.departure, None, theme),
            cell(&row.arrival, None, theme),
            cell(&row.pilot, None, theme),
            cell(&row.airline, None, theme),
            cell(&row.aircraft, None, theme),
            cell(row.date.as_deref().unwrap_or("N/A"), Some(ThemeEntry::Muted), theme),
            vatsim_cell(row.is_vatsim, theme),
            cell(&row.id, Some(ThemeEntry::Muted), theme),
        ]);
    }
    table
}

/// Horizontal bar proportional to `value / max`.
pub fn bar(value: usize, max: usize) -> String {
    if max == 0 || value == 0 {
        return String::new();
    }
    let len = (value * BAR_WIDTH).div_ceil(max);
    "#".repeat(len.min(BAR_WIDTH))
}

pub fn chart_table(chart: &[DayBucket], theme: &ThemeMap, supports_color: bool) -> Table {
    let mut table = new_table(&["Day", "Flights", "VATSIM", ""], theme, supports_color);
    let max = chart.iter().map(|b| b.total).max().unwrap_or(0);
    for bucket in chart {
        table.add_row(vec![
            cell(bucket.date.format("%Y-%m-%d"), Some(ThemeEntry::Muted), theme),
            cell(bucket.total, None, theme),
            cell(bucket.vatsim, Some(ThemeEntry::Vatsim), theme),
            cell(bar(bucket.total, max), Some(ThemeEntry::Info), theme),
        ]);
    }
    table
}

pub fn dashboard_totals(summary: &DashboardSummary, theme: &ThemeMap, supports_color: bool) -> Table {
    let mut table = new_table(&["", "All time", "Last 30 days"], theme, supports_color);
    table.add_row(vec![
        cell("Flights", Some(ThemeEntry::Header), theme),
        cell(summary.total_flights, None, theme),
        cell(summary.last_30_days_flights, None, theme),
    ]);
    table.add_row(vec![
        cell("VATSIM", Some(ThemeEntry::Vatsim), theme),
        cell(summary.total_vatsim_flights, None, theme),
        cell(summary.last_30_days_vatsim_flights, None, theme),
    ]);
    table
}

pub fn audit_table(rows: &[AuditRow], theme: &ThemeMap, supports_color: bool) -> Table {
    let mut table = new_table(&["Callsign", "Dep", "Arr", "Time", "Pilot"], theme, supports_color);
    for row in rows {
        table.add_row(vec![
            cell(&row.callsign, None, theme),
            cell(&row.dep, None, theme),
            cell(&row.arr, None, theme),
            cell(&row.time, Some(ThemeEntry::Muted), theme),
            cell(&row.pilot, None, theme),
        ]);
    }
    table
}

pub fn backfill_table(report: &BackfillReport, theme: &ThemeMap, supports_color: bool) -> Table {
    let mut table = new_table(&["Windows", "Requests", "Inserted", "Updated", "Unchanged", "Skipped"], theme, supports_color);
    table.add_row(vec![
        cell(report.windows, None, theme),
        cell(report.requests, None, theme),
        cell(report.inserted_count, Some(ThemeEntry::Success), theme),
        cell(report.updated_count, None, theme),
        cell(report.unchanged_count, Some(ThemeEntry::Muted), theme),
        cell(report.skipped_count, Some(ThemeEntry::Warn), theme),
    ]);
    table
}

pub fn run_report_table(report: &RunReport, theme: &ThemeMap, supports_color: bool) -> Table {
    let mut table = new_table(&["Run", "Fetched", "Inserted", "Updated", "Unchanged", "Skipped"], theme, supports_color);
    table.add_row(vec![
        cell(report.run_id, Some(ThemeEntry::Muted), theme),
        cell(report.fetched, None, theme),
        cell(report.inserted, Some(ThemeEntry::Success), theme),
        cell(report.updated, None, theme),
        cell(report.unchanged, Some(ThemeEntry::Muted), theme),
        cell(report.skipped, Some(ThemeEntry::Warn), theme),
    ]);
    table
}

pub fn retag_table(report: &RetagReport, theme: &ThemeMap, supports_color: bool) -> Table {
    let mut table = new_table(&["Id", "Callsign", "From", "To"], theme, supports_color);
    for flight in &report.updated_flights {
        table.add_row(vec![
            cell(&flight.id, Some(ThemeEntry::Muted), theme),
            cell(flight.callsign.as_deref().unwrap_or("N/A"), Some(ThemeEntry::Vatsim), theme),
            cell(flight.departure.as_deref().unwrap_or("N/A"), None, theme),
            cell(flight.arrival.as_deref().unwrap_or("N/A"), None, theme),
        ]);
    }
    table
}
