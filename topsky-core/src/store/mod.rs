// topsky-core/src/store/mod.rs
//! Persistence seam for flight documents.
//!
//! The sync pipeline and the flight operations only talk to [`FlightStore`]. MongoDB is
//! the production backend; [`memory::MemoryStore`] keeps everything in process.
//!
//! License: MIT OR Apache-2.0

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SyncResult;
use crate::record::{lookup_path, Fields};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// A stored flight: the store-assigned document id plus its fields (without `_id`).
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFlight {
    pub id: String,
    pub fields: Fields,
}

/// How a single field is matched.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    /// Numeric field greater than or equal to the bound.
    AtLeast(f64),
    /// String field within the inclusive bounds, compared lexicographically.
    Between(String, String),
    /// Field absent from the document.
    Missing,
}

impl Condition {
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Condition::Equals(expected), Some(actual)) => expected == actual,
            (Condition::AtLeast(bound), Some(actual)) => actual.as_f64().is_some_and(|v| v >= *bound),
            (Condition::Between(lo, hi), Some(Value::String(s))) => {
                s.as_str() >= lo.as_str() && s.as_str() <= hi.as_str()
            }
            (Condition::Missing, found) => found.is_none(),
            _ => false,
        }
    }
}

/// Conjunction of per-field conditions. The empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldFilter {
    clauses: Vec<(String, Condition)>,
}

impl FieldFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(path, value)
    }

    pub fn and_eq(self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(path, Condition::Equals(value.into()))
    }

    pub fn and(mut self, path: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push((path.into(), condition));
        self
    }

    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.clauses
            .iter()
            .all(|(path, cond)| cond.matches(lookup_path(fields, path)))
    }
}

/// Field-level modification of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    pub set: Fields,
    pub unset: Vec<String>,
}

impl FieldUpdate {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted { id: String },
    /// Another document already holds the same `uniqueId`.
    DuplicateKey,
}

#[async_trait]
pub trait FlightStore: Send + Sync {
    async fn find_one(&self, filter: &FieldFilter) -> SyncResult<Option<StoredFlight>>;

    /// Looks a document up by its store-assigned id. Ids the store could never have
    /// issued simply yield `None`.
    async fn find_by_id(&self, id: &str) -> SyncResult<Option<StoredFlight>>;

    /// Matching documents, newest first by `createdAt` then `importedAt`.
    async fn find(&self, filter: &FieldFilter, limit: Option<usize>) -> SyncResult<Vec<StoredFlight>>;

    async fn insert_one(&self, fields: Fields) -> SyncResult<InsertOutcome>;

    /// Returns `false` when no document has that id.
    async fn update_one(&self, id: &str, update: FieldUpdate) -> SyncResult<bool>;

    async fn delete_one(&self, id: &str) -> SyncResult<bool>;

    async fn count(&self, filter: &FieldFilter) -> SyncResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_conditions() {
        let fields = json!({
            "network": {"name": "vatsim", "ratio": 1.0},
            "createdAt": "2024-03-05T08:00:00Z"
        });
        let fields = fields.as_object().unwrap();

        let confirmed = FieldFilter::eq("network.name", "vatsim")
            .and("network.ratio", Condition::AtLeast(0.999));
        assert!(confirmed.matches(fields));

        let in_range = FieldFilter::all().and(
            "createdAt",
            Condition::Between("2024-03-05T00:00:00.000Z".into(), "2024-03-05T23:59:59.999Z".into()),
        );
        assert!(in_range.matches(fields));

        assert!(!FieldFilter::eq("callsign", "TOP1").matches(fields));
        assert!(FieldFilter::all().matches(fields));

        assert!(FieldFilter::all().and("providerId", Condition::Missing).matches(fields));
        assert!(!FieldFilter::all().and("network.name", Condition::Missing).matches(fields));
    }
}
