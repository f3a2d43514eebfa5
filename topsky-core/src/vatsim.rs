//! VATSIM network detection for flight records.
//!
//! A record counts as flown on VATSIM when any one of these holds:
//! `network.name` equals a configured keyword, the `source` or provider source text
//! mentions one, the `network` object itself mentions one, the pilot or remark text
//! mentions one, the callsign starts with a configured airline prefix, or `platform`
//! mentions one. Keyword checks ignore ASCII case.

use serde_json::Value;
use std::fmt;

use topsky_signals::{KeywordScanner, PrefixSet};

use crate::config::VatsimConfig;
use crate::errors::{SyncError, SyncResult};
use crate::record::{field, lookup_path, text_at, Fields};

pub(crate) const RATIO_PATH: &str = "network.ratio";
const PILOT_TEXT_FIELDS: [&str; 4] = ["pilot", "pilotName", "remarks", "comments"];
const CALLSIGN_FIELDS: [&str; 2] = ["callsign", "flightNumber"];
/// Value of `network.name` on flights the provider attributes to VATSIM.
pub const NETWORK_NAME: &str = "vatsim";
pub(crate) const NETWORK_NAME_PATH: &str = "network.name";

/// The rule that classified a record as VATSIM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VatsimSignal {
    NetworkName,
    SourceText,
    NetworkText,
    PilotText,
    AirlinePrefix(String),
    Platform,
}

impl fmt::Display for VatsimSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VatsimSignal::NetworkName => write!(f, "network name"),
            VatsimSignal::SourceText => write!(f, "source"),
            VatsimSignal::NetworkText => write!(f, "network details"),
            VatsimSignal::PilotText => write!(f, "pilot or remarks"),
            VatsimSignal::AirlinePrefix(p) => write!(f, "airline prefix {p}"),
            VatsimSignal::Platform => write!(f, "platform"),
        }
    }
}

#[derive(Debug)]
pub struct VatsimDetector {
    keywords: KeywordScanner,
    prefixes: PrefixSet,
    confirmed_ratio: f64,
}

impl VatsimDetector {
    pub fn from_config(config: &VatsimConfig) -> SyncResult<Self> {
        let keywords = KeywordScanner::new(&config.keywords)
            .map_err(|e| SyncError::Config(format!("vatsim.keywords: {e}")))?;
        let prefixes = PrefixSet::new(&config.airline_prefixes)
            .map_err(|e| SyncError::Config(format!("vatsim.airline_prefixes: {e}")))?;
        Ok(Self {
            keywords,
            prefixes,
            confirmed_ratio: config.confirmed_ratio,
        })
    }

    /// First matching rule, or `None` when the record shows no VATSIM evidence.
    pub fn detect(&self, fields: &Fields) -> Option<VatsimSignal> {
        if let Some(name) = text_at(fields, NETWORK_NAME_PATH) {
            if self.is_keyword(name) {
                return Some(VatsimSignal::NetworkName);
            }
        }

        if [field::SOURCE, field::PROVIDER_SOURCE]
            .iter()
            .filter_map(|path| text_at(fields, path))
            .any(|text| self.keywords.contains_any(text))
        {
            return Some(VatsimSignal::SourceText);
        }

        if fields.get("network").is_some_and(|v| self.value_mentions(v)) {
            return Some(VatsimSignal::NetworkText);
        }

        if PILOT_TEXT_FIELDS
            .iter()
            .filter_map(|key| fields.get(*key))
            .any(|v| self.value_mentions(v))
        {
            return Some(VatsimSignal::PilotText);
        }

        if let Some(callsign) = CALLSIGN_FIELDS.iter().find_map(|path| text_at(fields, path)) {
            if let Some(prefix) = self.prefixes.matching_prefix(callsign) {
                return Some(VatsimSignal::AirlinePrefix(prefix.to_string()));
            }
        }

        if text_at(fields, "platform").is_some_and(|p| self.keywords.contains_any(p)) {
            return Some(VatsimSignal::Platform);
        }

        None
    }

    pub fn is_vatsim(&self, fields: &Fields) -> bool {
        self.detect(fields).is_some()
    }

    /// Strict rule used for auditing: the network is named explicitly and
    /// `network.ratio` meets the configured threshold.
    pub fn is_confirmed(&self, fields: &Fields) -> bool {
        let named = text_at(fields, NETWORK_NAME_PATH).is_some_and(|n| self.is_keyword(n));
        let ratio = lookup_path(fields, RATIO_PATH).and_then(Value::as_f64);
        named && ratio.is_some_and(|r| r >= self.confirmed_ratio)
    }

    pub fn confirmed_ratio(&self) -> f64 {
        self.confirmed_ratio
    }

    fn is_keyword(&self, text: &str) -> bool {
        self.keywords
            .patterns()
            .iter()
            .any(|k| k.eq_ignore_ascii_case(text))
    }

    /// Strings are scanned directly; objects and arrays through their JSON text.
    fn value_mentions(&self, value: &Value) -> bool {
        match value {
            Value::String(s) => self.keywords.contains_any(s),
            Value::Object(_) | Value::Array(_) => self.keywords.contains_any(&value.to_string()),
            _ => false,
        }
    }
}
