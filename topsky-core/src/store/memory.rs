// topsky-core/src/store/memory.rs
//! In-process [`FlightStore`] used by tests and `--memory-store` dry runs.
//!
//! Mirrors the MongoDB backend closely enough for the pipeline: ids are 24 hex digits,
//! and `uniqueId` is unique across documents.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{FieldFilter, FieldUpdate, FlightStore, InsertOutcome, StoredFlight};
use crate::errors::{SyncError, SyncResult};
use crate::record::{field, text_at, Fields};

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    docs: BTreeMap<String, Fields>,
}

impl Inner {
    fn unique_id_taken(&self, fields: &Fields, except: Option<&str>) -> bool {
        let Some(key) = fields.get(field::UNIQUE_ID) else {
            return false;
        };
        self.docs
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != except)
            .any(|(_, doc)| doc.get(field::UNIQUE_ID) == Some(key))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored document in insertion order.
    pub async fn snapshot(&self) -> Vec<StoredFlight> {
        let inner = self.inner.read().await;
        inner
            .docs
            .iter()
            .map(|(id, fields)| StoredFlight {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect()
    }
}

/// Newest first by `createdAt`, then `importedAt`, then most recently inserted.
fn newest_first(a: &StoredFlight, b: &StoredFlight) -> Ordering {
    let key = |f: &StoredFlight| {
        (
            text_at(&f.fields, "createdAt").unwrap_or("").to_string(),
            text_at(&f.fields, field::IMPORTED_AT).unwrap_or("").to_string(),
        )
    };
    key(b).cmp(&key(a)).then_with(|| b.id.cmp(&a.id))
}

#[async_trait]
impl FlightStore for MemoryStore {
    async fn find_one(&self, filter: &FieldFilter) -> SyncResult<Option<StoredFlight>> {
        let inner = self.inner.read().await;
        Ok(inner
            .docs
            .iter()
            .find(|(_, doc)| filter.matches(doc))
            .map(|(id, doc)| StoredFlight {
                id: id.clone(),
                fields: doc.clone(),
            }))
    }

    async fn find_by_id(&self, id: &str) -> SyncResult<Option<StoredFlight>> {
        let inner = self.inner.read().await;
        Ok(inner.docs.get(id).map(|doc| StoredFlight {
            id: id.to_string(),
            fields: doc.clone(),
        }))
    }

    async fn find(&self, filter: &FieldFilter, limit: Option<usize>) -> SyncResult<Vec<StoredFlight>> {
        let inner = self.inner.read().await;
        let mut found: Vec<StoredFlight> = inner
            .docs
            .iter()
            .filter(|(_, doc)| filter.matches(doc))
            .map(|(id, doc)| StoredFlight {
                id: id.clone(),
                fields: doc.clone(),
            })
            .collect();
        found.sort_by(newest_first);
        if let Some(limit) = limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn insert_one(&self, mut fields: Fields) -> SyncResult<InsertOutcome> {
        let mut inner = self.inner.write().await;
        if inner.unique_id_taken(&fields, None) {
            return Ok(InsertOutcome::DuplicateKey);
        }
        fields.remove(field::DOC_ID);
        inner.next_id += 1;
        let id = format!("{:024x}", inner.next_id);
        inner.docs.insert(id.clone(), fields);
        Ok(InsertOutcome::Inserted { id })
    }

    async fn update_one(&self, id: &str, update: FieldUpdate) -> SyncResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(existing) = inner.docs.get(id) else {
            return Ok(false);
        };

        let mut next = existing.clone();
        for (key, value) in update.set {
            next.insert(key, value);
        }
        for key in &update.unset {
            next.remove(key);
        }

        if inner.unique_id_taken(&next, Some(id)) {
            return Err(SyncError::Storage(format!(
                "duplicate uniqueId while updating document {id}"
            )));
        }
        inner.docs.insert(id.to_string(), next);
        Ok(true)
    }

    async fn delete_one(&self, id: &str) -> SyncResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.docs.remove(id).is_some())
    }

    async fn count(&self, filter: &FieldFilter) -> SyncResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.docs.values().filter(|doc| filter.matches(doc)).count() as u64)
    }
}
