// topsky/src/lib.rs
//! # Topsky CLI
//!
//! Terminal front end for `topsky-core`: polling, backfills, VATSIM tagging and
//! read-only reports over the stored flights.

pub mod cli;
pub mod commands;
pub mod logger;
pub mod ui;

pub use commands::{dispatch, RunContext};
