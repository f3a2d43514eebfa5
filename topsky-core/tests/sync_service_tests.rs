// topsky-core/tests/sync_service_tests.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use topsky_core::store::{FieldUpdate, InsertOutcome};
use topsky_core::{
    FetchPath, FetchedPage, FieldFilter, Fields, FlightRecord, FlightSource, FlightStore,
    MemoryStore, StoredFlight, SyncConfig, SyncError, SyncResult, SyncService,
};

/// Serves a fixed, editable list of recent flights.
#[derive(Default)]
struct RecentSource {
    records: Mutex<Vec<Value>>,
    fail_with: Mutex<Option<u16>>,
    fetches: Mutex<usize>,
}

impl RecentSource {
    fn with(records: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
            fail_with: Mutex::new(None),
            fetches: Mutex::new(0),
        })
    }
}

#[async_trait]
impl FlightSource for RecentSource {
    async fn fetch_recent_flights(&self, _: u32, _: u32, _: DateTime<Utc>) -> SyncResult<FetchedPage> {
        *self.fetches.lock().unwrap() += 1;
        if let Some(status) = *self.fail_with.lock().unwrap() {
            return Err(SyncError::Upstream {
                status,
                body: "unavailable".to_string(),
            });
        }
        let records = self
            .records
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .filter_map(FlightRecord::from_value)
            .collect();
        Ok(FetchedPage {
            records,
            via: FetchPath::Post,
        })
    }

    async fn fetch_flights_by_date(
        &self,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
        _: u32,
        _: u32,
    ) -> SyncResult<FetchedPage> {
        Ok(FetchedPage {
            records: Vec::new(),
            via: FetchPath::Post,
        })
    }
}

/// Every window holds `per_window` flights; requests are recorded.
struct WindowedSource {
    per_window: u32,
    fail_on_call: Option<usize>,
    calls: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>, u32)>>,
}

impl WindowedSource {
    fn new(per_window: u32, fail_on_call: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            per_window,
            fail_on_call,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl FlightSource for WindowedSource {
    async fn fetch_recent_flights(&self, _: u32, _: u32, _: DateTime<Utc>) -> SyncResult<FetchedPage> {
        Ok(FetchedPage {
            records: Vec::new(),
            via: FetchPath::Post,
        })
    }

    async fn fetch_flights_by_date(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        skip: u32,
        count: u32,
    ) -> SyncResult<FetchedPage> {
        let call_no = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((start, end, skip));
            calls.len()
        };
        if self.fail_on_call == Some(call_no) {
            return Err(SyncError::Upstream {
                status: 503,
                body: "rate limited".to_string(),
            });
        }

        let available = self.per_window.saturating_sub(skip).min(count);
        let records = (0..available)
            .map(|i| {
                let id = format!("{}-{}", start.timestamp(), skip + i);
                FlightRecord::from_value(json!({"_id": id, "callsign": "LOT1", "createdAt": start.to_rfc3339()}))
                    .unwrap()
            })
            .collect();
        Ok(FetchedPage {
            records,
            via: FetchPath::Post,
        })
    }
}

/// Delegates to a MemoryStore but takes 100 ms per insert.
struct SlowStore {
    inner: MemoryStore,
}

#[async_trait]
impl FlightStore for SlowStore {
    async fn find_one(&self, filter: &FieldFilter) -> SyncResult<Option<StoredFlight>> {
        self.inner.find_one(filter).await
    }
    async fn find_by_id(&self, id: &str) -> SyncResult<Option<StoredFlight>> {
        self.inner.find_by_id(id).await
    }
    async fn find(&self, filter: &FieldFilter, limit: Option<usize>) -> SyncResult<Vec<StoredFlight>> {
        self.inner.find(filter, limit).await
    }
    async fn insert_one(&self, fields: Fields) -> SyncResult<InsertOutcome> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.inner.insert_one(fields).await
    }
    async fn update_one(&self, id: &str, update: FieldUpdate) -> SyncResult<bool> {
        self.inner.update_one(id, update).await
    }
    async fn delete_one(&self, id: &str) -> SyncResult<bool> {
        self.inner.delete_one(id).await
    }
    async fn count(&self, filter: &FieldFilter) -> SyncResult<u64> {
        self.inner.count(filter).await
    }
}

/// MemoryStore with injected faults: a failing Nth insert, or lookups that never hit.
struct FaultyStore {
    inner: MemoryStore,
    fail_insert_at: Option<usize>,
    blind_lookups: bool,
    inserts: Mutex<usize>,
}

impl FaultyStore {
    fn failing_insert(n: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            fail_insert_at: Some(n),
            blind_lookups: false,
            inserts: Mutex::new(0),
        })
    }

    fn blind() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            fail_insert_at: None,
            blind_lookups: true,
            inserts: Mutex::new(0),
        })
    }
}

#[async_trait]
impl FlightStore for FaultyStore {
    async fn find_one(&self, filter: &FieldFilter) -> SyncResult<Option<StoredFlight>> {
        if self.blind_lookups {
            return Ok(None);
        }
        self.inner.find_one(filter).await
    }
    async fn find_by_id(&self, id: &str) -> SyncResult<Option<StoredFlight>> {
        self.inner.find_by_id(id).await
    }
    async fn find(&self, filter: &FieldFilter, limit: Option<usize>) -> SyncResult<Vec<StoredFlight>> {
        self.inner.find(filter, limit).await
    }
    async fn insert_one(&self, fields: Fields) -> SyncResult<InsertOutcome> {
        let attempt = {
            let mut inserts = self.inserts.lock().unwrap();
            *inserts += 1;
            *inserts
        };
        if self.fail_insert_at == Some(attempt) {
            return Err(SyncError::Storage("disk full".to_string()));
        }
        self.inner.insert_one(fields).await
    }
    async fn update_one(&self, id: &str, update: FieldUpdate) -> SyncResult<bool> {
        self.inner.update_one(id, update).await
    }
    async fn delete_one(&self, id: &str) -> SyncResult<bool> {
        self.inner.delete_one(id).await
    }
    async fn count(&self, filter: &FieldFilter) -> SyncResult<u64> {
        self.inner.count(filter).await
    }
}

fn flight(id: &str, callsign: &str, arrival: &str) -> Value {
    json!({
        "_id": id,
        "callsign": callsign,
        "departure": "EPWA",
        "arrival": arrival,
        "createdAt": "2024-03-01T10:00:00Z"
    })
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test_log::test(tokio::test)]
async fn test_second_identical_pass_changes_nothing() {
    let source = RecentSource::with(vec![
        flight("f1", "LOT1", "EGLL"),
        flight("f2", "LOT2", "EDDF"),
        flight("f3", "LOT3", "LFPG"),
    ]);
    let store = Arc::new(MemoryStore::new());
    let service = SyncService::new(source, store.clone(), &SyncConfig::default()).unwrap();

    let first = service.run_once().await.unwrap();
    assert_eq!((first.inserted, first.updated, first.unchanged), (3, 0, 0));

    let second = service.run_once().await.unwrap();
    assert_eq!((second.inserted, second.updated, second.unchanged), (0, 0, 3));
    assert_eq!(store.snapshot().await.len(), 3);
}

#[test_log::test(tokio::test)]
async fn test_changed_field_is_updated_and_logged() {
    let source = RecentSource::with(vec![flight("f1", "LOT1", "EGLL")]);
    let store = Arc::new(MemoryStore::new());
    let service = SyncService::new(source.clone(), store.clone(), &SyncConfig::default()).unwrap();
    service.run_once().await.unwrap();

    *source.records.lock().unwrap() = vec![flight("f1", "LOT1", "EDDF")];
    let report = service.run_once().await.unwrap();
    assert_eq!(report.updated, 1);

    let lines = service.log().lines().await;
    let update_line = lines
        .iter()
        .find(|l| l.contains("Updated newsky:f1"))
        .expect("update line");
    assert!(update_line.contains(r#"arrival: "EGLL" -> "EDDF""#));

    let stored = store.snapshot().await;
    assert_eq!(stored[0].fields["arrival"], json!("EDDF"));
    assert_eq!(stored[0].fields["uniqueId"], json!("newsky:f1"));
}

#[test_log::test(tokio::test)]
async fn test_manual_vatsim_tag_survives_a_pass() {
    let source = RecentSource::with(vec![flight("f1", "LOT1", "EGLL")]);
    let store = Arc::new(MemoryStore::new());
    let service = SyncService::new(source, store.clone(), &SyncConfig::default()).unwrap();
    service.run_once().await.unwrap();

    service.flights().tag_vatsim("newsky:f1", false).await.unwrap();
    let report = service.run_once().await.unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(store.snapshot().await[0].fields["isVatsim"], json!(true));
}

#[test_log::test(tokio::test)]
async fn test_fallback_match_backfills_unique_id() {
    let store = Arc::new(MemoryStore::new());
    let legacy = json!({"providerId": "f1", "uniqueId": "LOT1-EPWA-EGLL-2024-03-01", "callsign": "LOT1"});
    store.insert_one(legacy.as_object().cloned().unwrap()).await.unwrap();

    let source = RecentSource::with(vec![flight("f1", "LOT1", "EGLL")]);
    let service = SyncService::new(source, store.clone(), &SyncConfig::default()).unwrap();
    let report = service.run_once().await.unwrap();

    assert_eq!((report.inserted, report.updated), (0, 1));
    let stored = store.snapshot().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].fields["uniqueId"], json!("newsky:f1"));
}

#[test_log::test(tokio::test)]
async fn test_degenerate_records_are_skipped() {
    let source = RecentSource::with(vec![json!({"pilot": "nobody"}), flight("f1", "LOT1", "EGLL")]);
    let store = Arc::new(MemoryStore::new());
    let service = SyncService::new(source, store.clone(), &SyncConfig::default()).unwrap();

    let report = service.run_once().await.unwrap();
    assert_eq!((report.inserted, report.skipped), (1, 1));
    assert!(service
        .log()
        .lines()
        .await
        .iter()
        .any(|l| l.contains("skipped-degenerate")));
}

#[test_log::test(tokio::test)]
async fn test_fetch_failure_is_logged_and_returned() {
    let source = RecentSource::with(vec![]);
    *source.fail_with.lock().unwrap() = Some(502);
    let service = SyncService::new(source, Arc::new(MemoryStore::new()), &SyncConfig::default()).unwrap();

    let err = service.run_once().await.unwrap_err();
    assert!(matches!(err, SyncError::Upstream { status: 502, .. }));
    let latest = service.log().latest().await.unwrap();
    assert!(latest.starts_with("❌"));
    assert!(latest.contains("502"));
}

#[test_log::test(tokio::test)]
async fn test_start_and_stop_are_idempotent() {
    let source = RecentSource::with(vec![flight("f1", "LOT1", "EGLL")]);
    let service = SyncService::new(source, Arc::new(MemoryStore::new()), &SyncConfig::default()).unwrap();

    let first = service.start().await;
    assert!(first.started && !first.already_running);
    let second = service.start().await;
    assert!(!second.started && second.already_running);
    assert!(service.status().await.is_running);

    let stopped = service.stop().await;
    assert!(stopped.stopped && !stopped.already_stopped);
    let again = service.stop().await;
    assert!(!again.stopped && again.already_stopped);
    assert!(!service.status().await.is_running);

    service.dispose().await;
    assert!(!service.start().await.started);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_stop_finishes_in_flight_record_only() {
    let source = RecentSource::with(
        (1..=5)
            .map(|i| flight(&format!("f{i}"), &format!("LOT{i}"), "EGLL"))
            .collect(),
    );
    let store = Arc::new(SlowStore {
        inner: MemoryStore::new(),
    });
    let service = SyncService::new(source, store.clone(), &SyncConfig::default()).unwrap();

    assert!(service.start().await.started);
    tokio::time::sleep(Duration::from_millis(150)).await;
    service.stop().await;

    let written = store.inner.snapshot().await;
    let ids: Vec<_> = written.iter().map(|f| f.fields["providerId"].clone()).collect();
    assert_eq!(ids, vec![json!("f1"), json!("f2")]);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(store.inner.snapshot().await.len(), 2);
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_backfill_walks_contiguous_windows() {
    let source = WindowedSource::new(150, None);
    let store = Arc::new(MemoryStore::new());
    let service = SyncService::new(source.clone(), store.clone(), &SyncConfig::default()).unwrap();

    let started = tokio::time::Instant::now();
    let report = service
        .run_backfill(day("2024-03-01"), day("2024-03-04"))
        .await
        .unwrap();

    assert_eq!(report.windows, 4);
    assert_eq!(report.requests, 8);
    assert_eq!(report.inserted_count, 600);
    assert!(started.elapsed() >= Duration::from_secs(70));

    let calls = source.calls.lock().unwrap().clone();
    let mut windows: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for (start, end, _) in &calls {
        if windows.last() != Some(&(*start, *end)) {
            windows.push((*start, *end));
        }
    }
    assert_eq!(windows.len(), 4);
    for pair in windows.windows(2) {
        assert!(pair[0].0 < pair[1].0);
        assert_eq!(pair[0].1 + ChronoDuration::milliseconds(1), pair[1].0);
    }
    let skips: Vec<u32> = calls.iter().take(2).map(|c| c.2).collect();
    assert_eq!(skips, vec![0, 100]);

    let again = service
        .run_backfill(day("2024-03-01"), day("2024-03-04"))
        .await
        .unwrap();
    assert_eq!((again.inserted_count, again.unchanged_count), (0, 600));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_backfill_aborts_on_upstream_error() {
    let source = WindowedSource::new(150, Some(3));
    let store = Arc::new(MemoryStore::new());
    let service = SyncService::new(source.clone(), store.clone(), &SyncConfig::default()).unwrap();

    let err = service
        .run_backfill(day("2024-03-01"), day("2024-03-03"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Upstream { status: 503, .. }));
    assert_eq!(source.calls.lock().unwrap().len(), 3);
    assert_eq!(store.snapshot().await.len(), 150);
    assert!(service.log().latest().await.unwrap().contains("Backfill aborted"));
}

#[test_log::test(tokio::test)]
async fn test_backfill_rejects_reversed_range() {
    let service = SyncService::new(
        WindowedSource::new(0, None),
        Arc::new(MemoryStore::new()),
        &SyncConfig::default(),
    )
    .unwrap();
    let err = service
        .run_backfill(day("2024-03-05"), day("2024-03-01"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidRange { .. }));
}

#[test_log::test(tokio::test)]
async fn test_same_route_same_day_flights_stay_separate() {
    let morning = json!({
        "_id": "a1", "callsign": "LOT1", "departure": "EPWA", "arrival": "EGLL",
        "createdAt": "2024-03-01T08:00:00Z", "pilot": "Anna"
    });
    let evening = json!({
        "_id": "b2", "callsign": "LOT1", "departure": "EPWA", "arrival": "EGLL",
        "createdAt": "2024-03-01T18:00:00Z", "pilot": "Bart"
    });
    let source = RecentSource::with(vec![morning, evening]);
    let store = Arc::new(MemoryStore::new());
    let service = SyncService::new(source, store.clone(), &SyncConfig::default()).unwrap();

    let first = service.run_once().await.unwrap();
    assert_eq!((first.inserted, first.updated), (2, 0));

    for _ in 0..2 {
        let again = service.run_once().await.unwrap();
        assert_eq!((again.inserted, again.updated, again.unchanged), (0, 0, 2));
    }

    let stored = store.snapshot().await;
    assert_eq!(stored.len(), 2);
    for (doc, (id, pilot)) in stored.iter().zip([("a1", "Anna"), ("b2", "Bart")]) {
        assert_eq!(doc.fields["providerId"], json!(id));
        assert_eq!(doc.fields["uniqueId"], json!(format!("newsky:{id}")));
        assert_eq!(doc.fields["pilot"], json!(pilot));
    }
}

#[test_log::test(tokio::test)]
async fn test_route_fallback_still_claims_unkeyed_documents() {
    let store = Arc::new(MemoryStore::new());
    let legacy = json!({
        "uniqueId": "LOT1-EPWA-EGLL-2024-03-01", "callsign": "LOT1", "departure": "EPWA",
        "arrival": "EGLL", "createdAt": "2024-03-01T10:00:00Z"
    });
    store.insert_one(legacy.as_object().cloned().unwrap()).await.unwrap();

    let source = RecentSource::with(vec![flight("f1", "LOT1", "EGLL")]);
    let service = SyncService::new(source, store.clone(), &SyncConfig::default()).unwrap();
    let report = service.run_once().await.unwrap();

    assert_eq!((report.inserted, report.updated), (0, 1));
    let stored = store.snapshot().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].fields["providerId"], json!("f1"));
    assert_eq!(stored[0].fields["uniqueId"], json!("newsky:f1"));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_poller_keeps_running_after_failed_ticks() {
    let source = RecentSource::with(vec![]);
    *source.fail_with.lock().unwrap() = Some(503);
    let service = SyncService::new(source.clone(), Arc::new(MemoryStore::new()), &SyncConfig::default()).unwrap();

    assert!(service.start().await.started);
    tokio::time::sleep(Duration::from_secs(15)).await;

    assert_eq!(*source.fetches.lock().unwrap(), 2);
    assert!(service.is_running().await);
    let failures = service
        .log()
        .lines()
        .await
        .into_iter()
        .filter(|l| l.starts_with("❌") && l.contains("Fetch failed"))
        .count();
    assert_eq!(failures, 2);

    service.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_storage_error_aborts_the_rest_of_the_pass() {
    let source = RecentSource::with(
        (1..=5)
            .map(|i| flight(&format!("f{i}"), &format!("LOT{i}"), "EGLL"))
            .collect(),
    );
    let store = FaultyStore::failing_insert(3);
    let service = SyncService::new(source, store.clone(), &SyncConfig::default()).unwrap();

    let err = service.run_once().await.unwrap_err();
    assert!(matches!(err, SyncError::Storage(_)));

    let kept: Vec<_> = store
        .inner
        .snapshot()
        .await
        .iter()
        .map(|f| f.fields["providerId"].clone())
        .collect();
    assert_eq!(kept, vec![json!("f1"), json!("f2")]);
    assert_eq!(*store.inserts.lock().unwrap(), 3);

    let latest = service.log().latest().await.unwrap();
    assert!(latest.starts_with("❌"));
    assert!(latest.contains("aborted"));
    assert!(service.status().await.last_run_at.is_none());
}

#[test_log::test(tokio::test)]
async fn test_duplicate_key_on_insert_is_skipped() {
    let store = FaultyStore::blind();
    let existing = json!({"uniqueId": "newsky:f1", "callsign": "LOT1"});
    store.inner.insert_one(existing.as_object().cloned().unwrap()).await.unwrap();

    let source = RecentSource::with(vec![flight("f1", "LOT1", "EGLL")]);
    let service = SyncService::new(source, store.clone(), &SyncConfig::default()).unwrap();
    let report = service.run_once().await.unwrap();

    assert_eq!((report.inserted, report.updated, report.skipped), (0, 0, 1));
    assert_eq!(store.inner.snapshot().await.len(), 1);
    assert!(service
        .log()
        .lines()
        .await
        .iter()
        .any(|l| l.contains("skipped-duplicate")));
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_start_during_stop_waits_for_the_old_loop() {
    let source = RecentSource::with(
        (1..=3)
            .map(|i| flight(&format!("f{i}"), &format!("LOT{i}"), "EGLL"))
            .collect(),
    );
    let store = Arc::new(SlowStore {
        inner: MemoryStore::new(),
    });
    let service = SyncService::new(source, store.clone(), &SyncConfig::default()).unwrap();

    assert!(service.start().await.started);
    tokio::time::sleep(Duration::from_millis(150)).await;

    let (stopped, restarted) = tokio::join!(service.stop(), service.start());
    assert!(stopped.stopped);
    assert!(restarted.started);

    // Newest first: the restart must be logged after the old loop reported stopping.
    let lines = service.log().lines().await;
    let stopped_at = lines
        .iter()
        .position(|l| l.contains("Background fetcher stopped"))
        .unwrap();
    let restarted_at = lines
        .iter()
        .position(|l| l.contains("Background fetcher started"))
        .unwrap();
    assert!(restarted_at < stopped_at);

    service.dispose().await;
}
