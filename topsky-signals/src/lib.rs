// topsky-signals/src/lib.rs
#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod keywords;
pub mod prefix;

pub use error::SignalError;
pub use keywords::KeywordScanner;
pub use prefix::PrefixSet;

/// Identifier of a pattern inside a scanner, in insertion order after de-duplication.
pub type PatternId = u32;
