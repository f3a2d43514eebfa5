// topsky-core/src/status.rs
//! Bounded, newest-first status log shown to operators.
//!
//! Each line looks like `✅ [2024-03-01T10:00:00.000Z] message` (or `❌` for errors).
//! Lines are mirrored to the `log` facade so they also reach the process logger.

use chrono::{SecondsFormat, Utc};
use log::{error, info};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_CAPACITY: usize = 100;

const OK_MARK: &str = "✅";
const ERR_MARK: &str = "❌";

/// Cheap to clone; clones share the same buffer.
#[derive(Debug, Clone)]
pub struct StatusLog {
    lines: Arc<RwLock<VecDeque<String>>>,
    capacity: usize,
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl StatusLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub async fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!("{}", message);
        self.push(OK_MARK, message).await;
    }

    pub async fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        error!("{}", message);
        self.push(ERR_MARK, message).await;
    }

    async fn push(&self, mark: &str, message: &str) {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = format!("{mark} [{stamp}] {message}");
        let mut lines = self.lines.write().await;
        lines.push_front(line);
        lines.truncate(self.capacity);
    }

    /// The whole buffer, newest first.
    pub async fn lines(&self) -> Vec<String> {
        self.lines.read().await.iter().cloned().collect()
    }

    /// The newest `k` lines.
    pub async fn tail(&self, k: usize) -> Vec<String> {
        self.lines.read().await.iter().take(k).cloned().collect()
    }

    pub async fn latest(&self) -> Option<String> {
        self.lines.read().await.front().cloned()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
