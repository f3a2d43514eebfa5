// topsky-core/src/store/mongo.rs
//! MongoDB-backed implementation of the FlightStore.
//! One pooled client is created at startup and shared by every caller.

use async_trait::async_trait;
use futures::TryStreamExt;
use log::{debug, info};
use mongodb::bson::{doc, oid::ObjectId, to_bson, to_document, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use serde_json::Value;

use super::{Condition, FieldFilter, FieldUpdate, FlightStore, InsertOutcome, StoredFlight};
use crate::config::StorageConfig;
use crate::errors::{SyncError, SyncResult};
use crate::record::{field, Fields};

/// Database used when neither the URI nor the config names one.
pub const DEFAULT_DATABASE: &str = "topsky";
const DUPLICATE_KEY_CODE: i32 = 11000;
const UNIQUE_ID_INDEX: &str = "uniqueId_unique";

pub struct MongoStore {
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connects, selects the collection and makes sure the `uniqueId` index exists.
    pub async fn connect(config: &StorageConfig) -> SyncResult<Self> {
        let client = Client::with_uri_str(&config.mongodb_uri).await?;
        let database = match &config.database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(DEFAULT_DATABASE)),
        };
        info!(
            "Using MongoDB collection {}.{}",
            database.name(),
            config.collection
        );

        let store = Self {
            collection: database.collection::<Document>(&config.collection),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> SyncResult<()> {
        let options = IndexOptions::builder()
            .unique(true)
            .sparse(true)
            .name(UNIQUE_ID_INDEX.to_string())
            .build();
        let model = IndexModel::builder()
            .keys(doc! { "uniqueId": 1 })
            .options(options)
            .build();
        self.collection.create_index(model).await?;
        debug!("Ensured unique index on {}", field::UNIQUE_ID);
        Ok(())
    }
}

/// Hex ids address ObjectId documents; anything else is matched as a plain string id.
fn id_filter(id: &str) -> Document {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "_id": oid },
        Err(_) => doc! { "_id": id },
    }
}

fn filter_document(filter: &FieldFilter) -> SyncResult<Document> {
    let mut out = Document::new();
    for (path, condition) in filter.clauses() {
        let value = match condition {
            Condition::Equals(v) => json_to_bson(v)?,
            Condition::AtLeast(bound) => Bson::Document(doc! { "$gte": *bound }),
            Condition::Between(lo, hi) => {
                Bson::Document(doc! { "$gte": lo.as_str(), "$lte": hi.as_str() })
            }
            Condition::Missing => Bson::Document(doc! { "$exists": false }),
        };
        out.insert(path.clone(), value);
    }
    Ok(out)
}

fn json_to_bson(value: &Value) -> SyncResult<Bson> {
    to_bson(value).map_err(|e| SyncError::Storage(format!("cannot encode value: {e}")))
}

fn into_stored(mut document: Document) -> SyncResult<StoredFlight> {
    let id = match document.remove(field::DOC_ID) {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    match Bson::Document(document).into_relaxed_extjson() {
        Value::Object(fields) => Ok(StoredFlight { id, fields }),
        other => Err(SyncError::Storage(format!(
            "document {id} decoded to a non-object: {other}"
        ))),
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY_CODE
    )
}

#[async_trait]
impl FlightStore for MongoStore {
    async fn find_one(&self, filter: &FieldFilter) -> SyncResult<Option<StoredFlight>> {
        let query = filter_document(filter)?;
        self.collection
            .find_one(query)
            .await?
            .map(into_stored)
            .transpose()
    }

    async fn find_by_id(&self, id: &str) -> SyncResult<Option<StoredFlight>> {
        self.collection
            .find_one(id_filter(id))
            .await?
            .map(into_stored)
            .transpose()
    }

    async fn find(&self, filter: &FieldFilter, limit: Option<usize>) -> SyncResult<Vec<StoredFlight>> {
        let query = filter_document(filter)?;
        let mut action = self
            .collection
            .find(query)
            .sort(doc! { "createdAt": -1, "importedAt": -1 });
        if let Some(limit) = limit {
            action = action.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        let documents: Vec<Document> = action.await?.try_collect().await?;
        documents.into_iter().map(into_stored).collect()
    }

    async fn insert_one(&self, mut fields: Fields) -> SyncResult<InsertOutcome> {
        fields.remove(field::DOC_ID);
        let document = to_document(&fields)
            .map_err(|e| SyncError::Storage(format!("cannot encode flight: {e}")))?;

        match self.collection.insert_one(document).await {
            Ok(result) => {
                let id = match result.inserted_id {
                    Bson::ObjectId(oid) => oid.to_hex(),
                    other => other.to_string(),
                };
                Ok(InsertOutcome::Inserted { id })
            }
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::DuplicateKey),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_one(&self, id: &str, update: FieldUpdate) -> SyncResult<bool> {
        if update.is_empty() {
            return Ok(self.find_by_id(id).await?.is_some());
        }

        let mut modifications = Document::new();
        if !update.set.is_empty() {
            let set = to_document(&update.set)
                .map_err(|e| SyncError::Storage(format!("cannot encode update: {e}")))?;
            modifications.insert("$set", set);
        }
        if !update.unset.is_empty() {
            let unset: Document = update
                .unset
                .iter()
                .map(|name| (name.clone(), Bson::String(String::new())))
                .collect();
            modifications.insert("$unset", unset);
        }

        let result = self
            .collection
            .update_one(id_filter(id), modifications)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_one(&self, id: &str) -> SyncResult<bool> {
        let result = self.collection.delete_one(id_filter(id)).await?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self, filter: &FieldFilter) -> SyncResult<u64> {
        let query = filter_document(filter)?;
        Ok(self.collection.count_documents(query).await?)
    }
}
