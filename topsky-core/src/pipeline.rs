// topsky-core/src/pipeline.rs
//! One fetch-and-store pass, and the per-record write path shared with backfills.
//!
//! For every record the pipeline derives its key and VATSIM flag, then looks the record
//! up through [`LOOKUP_ORDER`]. The first strategy that finds a document wins. Unknown
//! records are inserted. Known ones are diffed field by field, ignoring the fields this
//! crate maintains itself, and only the differences are written back.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::{iso, FlightSource};
use crate::config::SchedulerConfig;
use crate::errors::{SyncError, SyncResult};
use crate::identity::{date_portion, resolve_key, RecordKey};
use crate::record::{field, FlightRecord, Fields};
use crate::status::StatusLog;
use crate::store::{Condition, FieldFilter, FieldUpdate, FlightStore, InsertOutcome, StoredFlight};
use crate::vatsim::VatsimDetector;

/// Which driver produced a write. Stored in the `source` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    Poll,
    Backfill,
}

impl SyncMode {
    pub fn source_tag(self) -> &'static str {
        match self {
            SyncMode::Poll => "newsky-poll",
            SyncMode::Backfill => "newsky-backfill",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Poll => f.write_str("poll"),
            SyncMode::Backfill => f.write_str("backfill"),
        }
    }
}

/// A lookup tier. `filter` returns `None` when the record lacks the fields it needs.
#[derive(Clone, Copy)]
pub struct LookupStrategy {
    pub name: &'static str,
    pub filter: fn(&FlightRecord, &RecordKey) -> Option<FieldFilter>,
}

impl fmt::Debug for LookupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupStrategy").field("name", &self.name).finish()
    }
}

pub static LOOKUP_ORDER: [LookupStrategy; 3] = [
    LookupStrategy {
        name: "uniqueId",
        filter: by_unique_id,
    },
    LookupStrategy {
        name: "providerId",
        filter: by_provider_id,
    },
    LookupStrategy {
        name: "route",
        filter: by_route,
    },
];

fn by_unique_id(_: &FlightRecord, key: &RecordKey) -> Option<FieldFilter> {
    key.as_str().map(|k| FieldFilter::eq(field::UNIQUE_ID, k))
}

fn by_provider_id(record: &FlightRecord, _: &RecordKey) -> Option<FieldFilter> {
    record
        .provider_id()
        .map(|id| FieldFilter::eq(field::PROVIDER_ID, id))
}

/// Callsign plus both airports, on the same calendar day when the record is dated.
/// A record with a provider id only claims documents that have none yet.
fn by_route(record: &FlightRecord, _: &RecordKey) -> Option<FieldFilter> {
    let mut filter = record
        .route()?
        .iter()
        .fold(FieldFilter::all(), |f, (path, value)| f.and_eq(*path, *value));
    if record.provider_id().is_some() {
        filter = filter.and(field::PROVIDER_ID, Condition::Missing);
    }

    let dated = ["createdAt", "addedAt"]
        .iter()
        .find_map(|path| record.text(path).map(|ts| (*path, ts)))
        .and_then(|(path, ts)| date_portion(ts).map(|day| (path, day)));

    Some(match dated {
        Some((path, day)) => filter.and(
            path,
            Condition::Between(day.to_string(), format!("{day}T23:59:59.999Z")),
        ),
        None => filter,
    })
}

/// One changed field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub old: Option<Value>,
    pub new: Value,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old {
            Some(old) => write!(f, "{}: {} -> {}", self.field, old, self.new),
            None => write!(f, "{}: <missing> -> {}", self.field, self.new),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Inserted { id: String },
    Updated { id: String, changes: Vec<FieldChange> },
    Unchanged { id: String },
    SkippedDuplicate,
    SkippedDegenerate,
}

/// Counters for one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: SyncMode,
    pub started_at: DateTime<Utc>,
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            started_at: Utc::now(),
            fetched: 0,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            skipped: 0,
            cancelled: false,
        }
    }

    pub fn tally(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Inserted { .. } => self.inserted += 1,
            RecordOutcome::Updated { .. } => self.updated += 1,
            RecordOutcome::Unchanged { .. } => self.unchanged += 1,
            RecordOutcome::SkippedDuplicate | RecordOutcome::SkippedDegenerate => self.skipped += 1,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Sync {} finished: fetched {}, new {}, updated {}, unchanged {}, skipped {}{}",
            self.mode,
            self.fetched,
            self.inserted,
            self.updated,
            self.unchanged,
            self.skipped,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}

/// Builds the document written for `record`.
///
/// The provider `_id` is dropped (the store owns `_id`) and a provider `source` field is
/// kept as `providerSource`, since `source` holds the ingestion tag.
pub fn prepare_document(
    record: FlightRecord,
    key: &str,
    is_vatsim: bool,
    mode: SyncMode,
    now: &str,
) -> Fields {
    let provider_id = record.provider_id();
    let mut fields = record.into_fields();
    fields.remove(field::DOC_ID);
    if let Some(original) = fields.remove(field::SOURCE) {
        fields.insert(field::PROVIDER_SOURCE.to_string(), original);
    }

    fields.insert(field::UNIQUE_ID.to_string(), Value::from(key));
    if let Some(id) = provider_id {
        fields.insert(field::PROVIDER_ID.to_string(), Value::from(id));
    }
    fields.insert(field::IS_VATSIM.to_string(), Value::Bool(is_vatsim));
    fields.insert(field::IMPORTED_AT.to_string(), Value::from(now));
    fields.insert(field::LAST_UPDATED_AT.to_string(), Value::from(now));
    fields.insert(field::SOURCE.to_string(), Value::from(mode.source_tag()));
    fields
}

/// Comparable fields of `incoming` whose value differs from `stored`.
pub fn diff_fields(stored: &Fields, incoming: &Fields) -> Vec<FieldChange> {
    incoming
        .iter()
        .filter(|(name, _)| !field::is_housekeeping(name))
        .filter(|(name, value)| stored.get(name.as_str()) != Some(value))
        .map(|(name, value)| FieldChange {
            field: name.clone(),
            old: stored.get(name.as_str()).cloned(),
            new: value.clone(),
        })
        .collect()
}

pub struct Pipeline {
    pub(crate) source: Arc<dyn FlightSource>,
    pub(crate) store: Arc<dyn FlightStore>,
    pub(crate) detector: Arc<VatsimDetector>,
    pub(crate) log: StatusLog,
    pub(crate) settings: SchedulerConfig,
    lookups: &'static [LookupStrategy],
    pass_lock: Mutex<()>,
    last_run: RwLock<Option<DateTime<Utc>>>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn FlightSource>,
        store: Arc<dyn FlightStore>,
        detector: Arc<VatsimDetector>,
        log: StatusLog,
        settings: SchedulerConfig,
    ) -> Self {
        Self {
            source,
            store,
            detector,
            log,
            settings,
            lookups: &LOOKUP_ORDER,
            pass_lock: Mutex::new(()),
            last_run: RwLock::new(None),
        }
    }

    pub fn log(&self) -> &StatusLog {
        &self.log
    }

    pub async fn last_run_at(&self) -> Option<DateTime<Utc>> {
        *self.last_run.read().await
    }

    /// Fetches the trailing window of recent flights and stores them.
    ///
    /// Passes are serialised, so a manual pass never interleaves with a poll tick.
    pub async fn run_recent_pass(
        &self,
        mode: SyncMode,
        cancel: &CancellationToken,
    ) -> SyncResult<RunReport> {
        let _guard = self.pass_lock.lock().await;
        let mut report = RunReport::new(mode);
        if cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }

        let since = Utc::now() - ChronoDuration::hours(i64::from(self.settings.recent_window_hours));
        self.log
            .info(format!(
                "Fetching up to {} flights created since {}",
                self.settings.poll_count,
                iso(since)
            ))
            .await;

        let page = match self
            .source
            .fetch_recent_flights(self.settings.poll_count, 0, since)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.log.error(format!("Fetch failed: {e}")).await;
                return Err(e);
            }
        };
        self.log
            .info(format!("Fetched {} flights via {}", page.len(), page.via))
            .await;
        report.fetched = page.len();

        if let Err(e) = self.store_records(page.records, mode, cancel, &mut report).await {
            self.log.error(format!("Sync {mode} aborted: {e}")).await;
            return Err(e);
        }

        *self.last_run.write().await = Some(Utc::now());
        self.log.info(report.summary()).await;
        Ok(report)
    }

    /// Writes records one at a time, checking `cancel` before each.
    pub(crate) async fn store_records(
        &self,
        records: Vec<FlightRecord>,
        mode: SyncMode,
        cancel: &CancellationToken,
        report: &mut RunReport,
    ) -> SyncResult<()> {
        let total = records.len();
        for (done, record) in records.into_iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                self.log
                    .info(format!("Cancelled with {} record(s) not processed", total - done))
                    .await;
                break;
            }
            let outcome = self.write_record(record, mode).await?;
            report.tally(&outcome);
        }
        Ok(())
    }

    /// Inserts, updates or skips a single record.
    pub async fn write_record(&self, record: FlightRecord, mode: SyncMode) -> SyncResult<RecordOutcome> {
        let key = resolve_key(&record);
        let Some(key_str) = key.as_str().map(str::to_string) else {
            self.log
                .info("Skipped flight with no callsign, airports or date (skipped-degenerate)")
                .await;
            return Ok(RecordOutcome::SkippedDegenerate);
        };

        let is_vatsim = self.detector.is_vatsim(record.fields());
        let existing = self.lookup(&record, &key).await?;
        let now = iso(Utc::now());
        let document = prepare_document(record, &key_str, is_vatsim, mode, &now);

        let Some((stored, via_fallback)) = existing else {
            return match self.store.insert_one(document).await? {
                InsertOutcome::Inserted { id } => {
                    let tag = if is_vatsim { " [VATSIM]" } else { "" };
                    self.log.info(format!("New flight {key_str}{tag}")).await;
                    Ok(RecordOutcome::Inserted { id })
                }
                InsertOutcome::DuplicateKey => {
                    self.log
                        .info(format!("Skipped {key_str}: already stored (skipped-duplicate)"))
                        .await;
                    Ok(RecordOutcome::SkippedDuplicate)
                }
            };
        };

        self.apply_changes(stored, document, &key_str, via_fallback, now).await
    }

    async fn apply_changes(
        &self,
        stored: StoredFlight,
        document: Fields,
        key: &str,
        via_fallback: bool,
        now: String,
    ) -> SyncResult<RecordOutcome> {
        let mut changes = diff_fields(&stored.fields, &document);
        let key_value = Value::from(key);
        if via_fallback && stored.fields.get(field::UNIQUE_ID) != Some(&key_value) {
            changes.push(FieldChange {
                field: field::UNIQUE_ID.to_string(),
                old: stored.fields.get(field::UNIQUE_ID).cloned(),
                new: key_value,
            });
        }

        if changes.is_empty() {
            self.log.info(format!("Unchanged {key}")).await;
            return Ok(RecordOutcome::Unchanged { id: stored.id });
        }

        let mut update = FieldUpdate::default();
        for change in &changes {
            update.set.insert(change.field.clone(), change.new.clone());
        }
        if let Some(provider_id) = document.get(field::PROVIDER_ID) {
            if !stored.fields.contains_key(field::PROVIDER_ID) {
                update.set.insert(field::PROVIDER_ID.to_string(), provider_id.clone());
            }
        }
        update.set.insert(field::LAST_UPDATED_AT.to_string(), Value::from(now));

        if !self.store.update_one(&stored.id, update).await? {
            return Err(SyncError::Storage(format!(
                "flight {} disappeared before it could be updated",
                stored.id
            )));
        }

        let described: Vec<String> = changes.iter().map(ToString::to_string).collect();
        self.log
            .info(format!("Updated {key}: {}", described.join(", ")))
            .await;
        Ok(RecordOutcome::Updated {
            id: stored.id,
            changes,
        })
    }

    /// Tries each lookup tier in order. The flag is true when a fallback tier matched.
    async fn lookup(
        &self,
        record: &FlightRecord,
        key: &RecordKey,
    ) -> SyncResult<Option<(StoredFlight, bool)>> {
        for (rank, strategy) in self.lookups.iter().enumerate() {
            let Some(filter) = (strategy.filter)(record, key) else {
                continue;
            };
            if let Some(found) = self.store.find_one(&filter).await? {
                if rank > 0 {
                    debug!("Matched {} through the {} lookup", key, strategy.name);
                }
                return Ok(Some((found, rank > 0)));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> FlightRecord {
        FlightRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_prepare_document_moves_provider_fields() {
        let doc = prepare_document(
            record(json!({"_id": "abc", "source": "vatsim-tracker", "callsign": "TOP1"})),
            "newsky:abc",
            true,
            SyncMode::Backfill,
            "2024-03-01T00:00:00.000Z",
        );
        assert!(doc.get("_id").is_none());
        assert_eq!(doc["providerSource"], json!("vatsim-tracker"));
        assert_eq!(doc["source"], json!("newsky-backfill"));
        assert_eq!(doc["providerId"], json!("abc"));
        assert_eq!(doc["uniqueId"], json!("newsky:abc"));
        assert_eq!(doc["isVatsim"], json!(true));
    }

    #[test]
    fn test_diff_ignores_housekeeping_fields() {
        let stored = json!({"callsign": "TOP1", "arrival": "EGLL", "importedAt": "a", "isVatsim": true});
        let incoming = json!({"callsign": "TOP1", "arrival": "EDDF", "importedAt": "b", "isVatsim": false});
        let changes = diff_fields(stored.as_object().unwrap(), incoming.as_object().unwrap());

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].to_string(), r#"arrival: "EGLL" -> "EDDF""#);
    }

    #[test]
    fn test_route_lookup_is_limited_to_the_same_day() {
        let r = record(json!({
            "flightNumber": "TOP1",
            "dep": {"icao": "EPWA"},
            "arrival": "EGLL",
            "createdAt": "2024-03-01T10:00:00Z"
        }));
        let filter = by_route(&r, &resolve_key(&r)).unwrap();
        let clauses = filter.clauses();
        assert_eq!(clauses.len(), 4);
        assert_eq!(clauses[0].0, "flightNumber");
        assert_eq!(clauses[1].0, "dep.icao");
        assert_eq!(
            clauses[3],
            (
                "createdAt".to_string(),
                Condition::Between("2024-03-01".into(), "2024-03-01T23:59:59.999Z".into())
            )
        );

        assert!(by_route(&record(json!({"callsign": "TOP1"})), &RecordKey::Degenerate).is_none());

        let with_id = record(json!({
            "_id": "a1",
            "callsign": "LOT1",
            "departure": "EPWA",
            "arrival": "EGLL"
        }));
        let filter = by_route(&with_id, &resolve_key(&with_id)).unwrap();
        assert!(filter
            .clauses()
            .contains(&("providerId".to_string(), Condition::Missing)));
    }

    #[test]
    fn test_report_summary() {
        let mut report = RunReport::new(SyncMode::Poll);
        report.fetched = 2;
        report.tally(&RecordOutcome::Inserted { id: "1".into() });
        report.tally(&RecordOutcome::SkippedDegenerate);
        assert_eq!(
            report.summary(),
            "Sync poll finished: fetched 2, new 1, updated 0, unchanged 0, skipped 1"
        );
    }
}
