// topsky-core/src/dashboard.rs
//! Read-only views over stored flights: display rows, the 30-day dashboard and the
//! VATSIM audit table. Everything here is a pure function of the documents passed in.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::identity::date_portion;
use crate::record::{text_at, Fields};
use crate::store::StoredFlight;
use crate::vatsim::VatsimDetector;

/// Days covered by the dashboard chart, ending today.
pub const CHART_DAYS: i64 = 30;
/// Newest flights sampled for the chart.
pub const CHART_SAMPLE: usize = 1000;
/// Rows returned in the dashboard table.
pub const TABLE_ROWS: usize = 100;

fn first_text<'a>(fields: &'a Fields, paths: &[&str]) -> Option<&'a str> {
    paths.iter().find_map(|path| text_at(fields, path))
}

fn text_or(fields: &Fields, paths: &[&str], fallback: &str) -> String {
    first_text(fields, paths).unwrap_or(fallback).to_string()
}

/// Calendar day (UTC) of an RFC 3339 timestamp or a bare `YYYY-MM-DD` prefix.
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value.trim()) {
        return Some(at.with_timezone(&Utc).date_naive());
    }
    date_portion(value).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightRow {
    pub id: String,
    pub flight_number: String,
    pub departure: String,
    pub arrival: String,
    pub pilot: String,
    pub airline: String,
    pub aircraft: String,
    pub date: Option<String>,
    /// Provider-confirmed VATSIM flight.
    pub is_vatsim: bool,
    /// Tagged as VATSIM in storage (heuristic or manual).
    pub tagged: bool,
}

impl FlightRow {
    pub fn from_stored(flight: &StoredFlight, detector: &VatsimDetector) -> Self {
        let f = &flight.fields;
        Self {
            id: flight.id.clone(),
            flight_number: text_or(f, &["flightNumber", "callsign"], "N/A"),
            departure: text_or(f, &["dep.icao", "departure", "departureIcao"], "???"),
            arrival: text_or(f, &["arr.icao", "arrival", "arrivalIcao"], "???"),
            pilot: text_or(f, &["pilot.fullname", "pilotName", "pilot"], "Unknown"),
            airline: text_or(f, &["airline.shortname", "airline.icao"], "N/A"),
            aircraft: text_or(
                f,
                &["aircraft.airframe.name", "aircraft.name", "airframe.name", "airframe", "aircraft"],
                "N/A",
            ),
            date: first_text(f, &["ofp.close", "createdAt", "addedAt"]).map(str::to_string),
            is_vatsim: detector.is_confirmed(f),
            tagged: f.get("isVatsim").and_then(|v| v.as_bool()).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub total: usize,
    pub vatsim: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_flights: u64,
    pub total_vatsim_flights: u64,
    pub last_30_days_flights: usize,
    pub last_30_days_vatsim_flights: usize,
    /// Oldest day first.
    pub chart: Vec<DayBucket>,
    pub latest: Vec<FlightRow>,
}

/// Builds the dashboard from totals and the newest flights (newest first).
pub fn summarize(
    total_flights: u64,
    total_vatsim_flights: u64,
    newest: &[StoredFlight],
    detector: &VatsimDetector,
    today: NaiveDate,
) -> DashboardSummary {
    let first_day = today - ChronoDuration::days(CHART_DAYS - 1);
    let mut buckets: BTreeMap<NaiveDate, (usize, usize)> = first_day
        .iter_days()
        .take(CHART_DAYS as usize)
        .map(|day| (day, (0, 0)))
        .collect();

    let rows: Vec<FlightRow> = newest
        .iter()
        .map(|flight| FlightRow::from_stored(flight, detector))
        .collect();

    for row in &rows {
        let Some(day) = row.date.as_deref().and_then(parse_day) else {
            continue;
        };
        if let Some((total, vatsim)) = buckets.get_mut(&day) {
            *total += 1;
            if row.is_vatsim {
                *vatsim += 1;
            }
        }
    }

    let chart: Vec<DayBucket> = buckets
        .into_iter()
        .map(|(date, (total, vatsim))| DayBucket { date, total, vatsim })
        .collect();

    DashboardSummary {
        total_flights,
        total_vatsim_flights,
        last_30_days_flights: chart.iter().map(|b| b.total).sum(),
        last_30_days_vatsim_flights: chart.iter().map(|b| b.vatsim).sum(),
        chart,
        latest: rows.into_iter().take(TABLE_ROWS).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRow {
    pub callsign: String,
    pub dep: String,
    pub arr: String,
    /// `YYYY-MM-DD HH:MM UTC`, or `N/A`.
    pub time: String,
    pub pilot: String,
}

impl AuditRow {
    pub fn from_stored(flight: &StoredFlight) -> Self {
        let f = &flight.fields;
        let callsign = match text_at(f, "callsign") {
            Some(cs) => cs.to_string(),
            None => format!(
                "{}{}",
                text_at(f, "airline.icao").unwrap_or("???"),
                text_at(f, "flightNumber").unwrap_or("")
            ),
        };
        let time = first_text(f, &["ofp.depTimeAct", "createdAt"])
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|at| at.with_timezone(&Utc).format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "N/A".to_string());

        Self {
            callsign,
            dep: text_or(f, &["dep.icao"], "???"),
            arr: text_or(f, &["arr.icao"], "???"),
            time,
            pilot: text_or(f, &["pilot.fullname"], "Unknown"),
        }
    }
}
