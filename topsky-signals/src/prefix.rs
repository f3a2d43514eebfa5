//! Prefix membership over a fixed allow-list, e.g. airline ICAO codes at the start of a
//! callsign.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use daachorse::DoubleArrayAhoCorasick;

use crate::error::SignalError;
use crate::keywords::normalize;
use crate::PatternId;

pub struct PrefixSet {
    automaton: DoubleArrayAhoCorasick<PatternId>,
    prefixes: Vec<String>,
}

impl fmt::Debug for PrefixSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixSet")
         .field("prefixes", &self.prefixes)
         .finish()
    }
}

impl PrefixSet {
    /// Builds the set. Prefixes are folded to ASCII uppercase.
    pub fn new<I, P>(prefixes: I) -> Result<Self, SignalError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let prefixes = normalize(prefixes, |s| s.to_ascii_uppercase());
        if prefixes.is_empty() {
            return Err(SignalError::NoPatterns);
        }

        let automaton = DoubleArrayAhoCorasick::new(&prefixes).map_err(|_| SignalError::Build)?;
        Ok(Self { automaton, prefixes })
    }

    /// Returns the allow-listed prefix that `value` starts with, if any.
    ///
    /// Overlapping search is required here: a shorter pattern ending earlier in the
    /// haystack must not hide a longer one anchored at position zero.
    pub fn matching_prefix(&self, value: &str) -> Option<&str> {
        let folded = value.trim_start().as_bytes().to_ascii_uppercase();
        self.automaton
            .find_overlapping_iter(&folded)
            .find(|m| m.start() == 0)
            .and_then(|m| self.prefixes.get(m.value() as usize))
            .map(String::as_str)
    }

    pub fn matches(&self, value: &str) -> bool {
        self.matching_prefix(value).is_some()
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AIRLINES: [&str; 7] = ["TOP", "DLH", "BAW", "RYR", "UAE", "AAL", "AFR"];

    #[test]
    fn test_callsign_prefix_membership() {
        let set = PrefixSet::new(AIRLINES).unwrap();
        assert_eq!(set.matching_prefix("DLH400"), Some("DLH"));
        assert!(set.matches("baw12"));
        assert!(!set.matches("LOT281"));
    }

    #[test]
    fn test_prefix_must_be_anchored() {
        let set = PrefixSet::new(AIRLINES).unwrap();
        assert!(!set.matches("XDLH400"));
        assert!(!set.matches(""));
    }

    #[test]
    fn test_longer_prefix_hidden_behind_shorter_match() {
        // "AB" matches at 1..3 in "XABC" while "XAB" anchors at 0; both must be seen.
        let set = PrefixSet::new(["AB", "XAB"]).unwrap();
        assert_eq!(set.matching_prefix("XABC"), Some("XAB"));
    }
}
