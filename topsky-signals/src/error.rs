use core::fmt;

/// Errors raised while building a scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalError {
    /// No non-empty pattern was supplied.
    NoPatterns,
    /// The automaton could not be built (too many or too long patterns).
    Build,
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalError::NoPatterns => write!(f, "at least one non-empty pattern is required"),
            SignalError::Build => write!(f, "failed to build Aho-Corasick automaton"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SignalError {}
