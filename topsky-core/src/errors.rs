//! errors.rs - Custom error types for the topsky-core library.
//!
//! This module defines a structured error enum for the sync pipeline, so the host can
//! tell a configuration problem from an upstream outage or a storage failure.
//!
//! License: MIT OR APACHE 2.0

use thiserror::Error;

/// This enum represents all possible error types in the `topsky-core` library.
///
/// Marked `#[non_exhaustive]` so new failure kinds can be added without breaking
/// downstream matches.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    #[error("Missing Newsky API key (set NEWSKY_API_KEY or `newsky.api_key`)")]
    MissingCredential,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Newsky API error: {status} {body}")]
    Upstream { status: u16, body: String },

    #[error("Newsky request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Newsky request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    MalformedResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: String, end: String },

    #[error("Flight not found: {0}")]
    NotFound(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("A critical system error occurred: {0}")]
    AnyhowWrapper(#[from] anyhow::Error),
}

impl SyncError {
    /// True for failures caused by the upstream API rather than local state.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            SyncError::Upstream { .. }
                | SyncError::Transport(_)
                | SyncError::Timeout
                | SyncError::MalformedResponse(_)
        )
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SyncError::Timeout
        } else {
            SyncError::Transport(e)
        }
    }
}

impl From<mongodb::error::Error> for SyncError {
    fn from(e: mongodb::error::Error) -> Self {
        SyncError::Storage(e.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
