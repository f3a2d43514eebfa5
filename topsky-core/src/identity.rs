//! Derived de-duplication keys for flight records.
//!
//! A record with a provider id is keyed `newsky:<id>`. Without one the key is the
//! composite `<callsign>-<departure>-<arrival>-<YYYY-MM-DD>`, missing parts left empty.
//! A record with none of the composite parts is `Degenerate` and must not be stored:
//! its key would be `---` and unrelated sparse records would collide on it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::record::FlightRecord;

/// Namespace prepended to provider-assigned identifiers.
pub const PROVIDER_NAMESPACE: &str = "newsky";
/// Separator between the composite key parts.
pub const KEY_SEPARATOR: char = '-';

static DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{4}-\d{2}-\d{2})").expect("date prefix pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Provider(String),
    Composite(String),
    Degenerate,
}

impl RecordKey {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RecordKey::Provider(k) | RecordKey::Composite(k) => Some(k),
            RecordKey::Degenerate => None,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        matches!(self, RecordKey::Degenerate)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Some(key) => f.write_str(key),
            None => f.write_str("<degenerate>"),
        }
    }
}

/// Computes the key for `record`. Pure: the same record always yields the same key.
pub fn resolve_key(record: &FlightRecord) -> RecordKey {
    if let Some(id) = record.provider_id() {
        return RecordKey::Provider(format!("{PROVIDER_NAMESPACE}:{id}"));
    }

    let callsign = record.callsign().unwrap_or("");
    let departure = record.departure().unwrap_or("");
    let arrival = record.arrival().unwrap_or("");
    let date = record.created_at().and_then(date_portion).unwrap_or("");

    if [callsign, departure, arrival, date].iter().all(|part| part.is_empty()) {
        return RecordKey::Degenerate;
    }

    let sep = KEY_SEPARATOR;
    RecordKey::Composite(format!("{callsign}{sep}{departure}{sep}{arrival}{sep}{date}"))
}

/// The `YYYY-MM-DD` part of a timestamp. Values that do not start with a calendar
/// date fall back to everything before the first `T`.
pub fn date_portion(timestamp: &str) -> Option<&str> {
    if let Some(caps) = DATE_PREFIX.captures(timestamp) {
        return caps.get(1).map(|m| m.as_str());
    }
    let head = timestamp.split('T').next().unwrap_or("").trim();
    (!head.is_empty()).then_some(head)
}
