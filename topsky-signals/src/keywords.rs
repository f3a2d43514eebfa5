//! Case-insensitive keyword containment.
//!
//! Patterns are folded to ASCII lowercase once at build time; haystacks are folded on
//! every call. Non-ASCII bytes are compared verbatim.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use daachorse::DoubleArrayAhoCorasick;

use crate::error::SignalError;
use crate::PatternId;

/// Scans free text for any of a fixed set of keywords.
pub struct KeywordScanner {
    automaton: DoubleArrayAhoCorasick<PatternId>,
    patterns: Vec<String>,
}

impl fmt::Debug for KeywordScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeywordScanner")
         .field("automaton", &"<DoubleArrayAhoCorasick>")
         .field("patterns", &self.patterns)
         .finish()
    }
}

impl KeywordScanner {
    pub fn new<I, P>(keywords: I) -> Result<Self, SignalError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let patterns = normalize(keywords, |s| s.to_ascii_lowercase());
        if patterns.is_empty() {
            return Err(SignalError::NoPatterns);
        }

        let automaton = DoubleArrayAhoCorasick::new(&patterns).map_err(|_| SignalError::Build)?;
        Ok(Self { automaton, patterns })
    }

    /// Returns the first keyword found anywhere in `haystack`, ignoring ASCII case.
    pub fn find(&self, haystack: &str) -> Option<&str> {
        if haystack.is_empty() {
            return None;
        }
        let folded = haystack.as_bytes().to_ascii_lowercase();
        self.automaton
            .find_iter(&folded)
            .next()
            .and_then(|m| self.patterns.get(m.value() as usize))
            .map(String::as_str)
    }

    pub fn contains_any(&self, haystack: &str) -> bool {
        self.find(haystack).is_some()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Trims, folds, drops empties and de-duplicates while keeping first-seen order.
pub(crate) fn normalize<I, P, F>(raw: I, fold: F) -> Vec<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
    F: Fn(&str) -> String,
{
    let mut out: Vec<String> = Vec::new();
    for item in raw {
        let folded = fold(item.as_ref().trim());
        if !folded.is_empty() && !out.contains(&folded) {
            out.push(folded);
        }
    }
    out
}
