//! The flight record as received from Newsky, plus the names of the fields this crate
//! writes on top of it.
//!
//! Provider payloads have no fixed schema, so a record is kept as a JSON object and
//! read through a handful of tolerant accessors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object of flight fields.
pub type Fields = Map<String, Value>;

/// Field names owned by this crate.
pub mod field {
    pub const DOC_ID: &str = "_id";
    pub const UNIQUE_ID: &str = "uniqueId";
    pub const PROVIDER_ID: &str = "providerId";
    pub const IS_VATSIM: &str = "isVatsim";
    pub const IMPORTED_AT: &str = "importedAt";
    pub const LAST_UPDATED_AT: &str = "lastUpdatedAt";
    pub const SOURCE: &str = "source";
    /// Where a provider-supplied `source` value is kept once `source` holds our tag.
    pub const PROVIDER_SOURCE: &str = "providerSource";

    /// Fields ignored when deciding whether a stored record changed.
    pub const HOUSEKEEPING: [&str; 7] = [
        DOC_ID,
        UNIQUE_ID,
        PROVIDER_ID,
        IS_VATSIM,
        IMPORTED_AT,
        LAST_UPDATED_AT,
        SOURCE,
    ];

    pub fn is_housekeeping(name: &str) -> bool {
        HOUSEKEEPING.contains(&name)
    }
}

const PROVIDER_ID_PATHS: [&str; 3] = ["_id", "flightId", "id"];
const CALLSIGN_PATHS: [&str; 2] = ["callsign", "flightNumber"];
const DEPARTURE_PATHS: [&str; 3] = ["departure", "departureIcao", "dep.icao"];
const ARRIVAL_PATHS: [&str; 3] = ["arrival", "arrivalIcao", "arr.icao"];
const CREATED_PATHS: [&str; 2] = ["createdAt", "addedAt"];

/// One flight as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlightRecord {
    fields: Fields,
}

impl From<Fields> for FlightRecord {
    fn from(fields: Fields) -> Self {
        Self { fields }
    }
}

impl FlightRecord {
    /// Wraps a JSON value. Anything but an object yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.fields, path)
    }

    /// Non-blank string at `path`.
    pub fn text(&self, path: &str) -> Option<&str> {
        text_at(&self.fields, path)
    }

    /// The provider-assigned identifier, normalised to a string.
    pub fn provider_id(&self) -> Option<String> {
        PROVIDER_ID_PATHS
            .iter()
            .find_map(|path| self.get(path).and_then(id_to_string))
    }

    pub fn callsign(&self) -> Option<&str> {
        self.first_text(&CALLSIGN_PATHS).map(|(_, v)| v)
    }

    pub fn departure(&self) -> Option<&str> {
        self.first_text(&DEPARTURE_PATHS).map(|(_, v)| v)
    }

    pub fn arrival(&self) -> Option<&str> {
        self.first_text(&ARRIVAL_PATHS).map(|(_, v)| v)
    }

    pub fn created_at(&self) -> Option<&str> {
        self.first_text(&CREATED_PATHS).map(|(_, v)| v)
    }

    /// Callsign, departure and arrival together with the field paths they were read
    /// from, so lookups can query the same fields the provider used.
    pub fn route(&self) -> Option<[(&'static str, &str); 3]> {
        Some([
            self.first_text(&CALLSIGN_PATHS)?,
            self.first_text(&DEPARTURE_PATHS)?,
            self.first_text(&ARRIVAL_PATHS)?,
        ])
    }

    fn first_text(&self, paths: &[&'static str]) -> Option<(&'static str, &str)> {
        paths
            .iter()
            .find_map(|path| self.text(path).map(|v| (*path, v)))
    }
}

/// Resolves a dotted path (`dep.icao`) inside a JSON object.
pub fn lookup_path<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

pub fn text_at<'a>(fields: &'a Fields, path: &str) -> Option<&'a str> {
    lookup_path(fields, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Accepts strings, integers and extended-JSON `{"$oid": ...}` identifiers.
fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> FlightRecord {
        FlightRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_provider_id_accepts_several_shapes() {
        assert_eq!(record(json!({"_id": "abc"})).provider_id().as_deref(), Some("abc"));
        assert_eq!(record(json!({"flightId": 42})).provider_id().as_deref(), Some("42"));
        assert_eq!(
            record(json!({"_id": {"$oid": "65f0c0ffee"}})).provider_id().as_deref(),
            Some("65f0c0ffee")
        );
        assert_eq!(record(json!({"id": "  "})).provider_id(), None);
    }

    #[test]
    fn test_nested_airport_codes() {
        let r = record(json!({"flightNumber": "TOP7", "dep": {"icao": "EPWA"}, "arr": {"icao": "EGLL"}}));
        assert_eq!(r.callsign(), Some("TOP7"));
        assert_eq!(r.departure(), Some("EPWA"));
        assert_eq!(r.arrival(), Some("EGLL"));

        let route = r.route().unwrap();
        assert_eq!(route[0], ("flightNumber", "TOP7"));
        assert_eq!(route[1], ("dep.icao", "EPWA"));
    }

    #[test]
    fn test_non_objects_are_rejected() {
        assert!(FlightRecord::from_value(json!([1, 2])).is_none());
        assert!(FlightRecord::from_value(json!("flight")).is_none());
    }

    #[test]
    fn test_blank_strings_count_as_missing() {
        let r = record(json!({"callsign": "", "flightNumber": "DLH400"}));
        assert_eq!(r.callsign(), Some("DLH400"));
    }
}
