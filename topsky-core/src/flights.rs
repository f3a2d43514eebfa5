// topsky-core/src/flights.rs
//! Operator actions on stored flights: counting, listing, VATSIM tagging, deletion and
//! the dashboard/audit views.

use chrono::{NaiveDate, Utc};
use log::info;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::client::iso;
use crate::dashboard::{summarize, AuditRow, DashboardSummary, FlightRow, CHART_SAMPLE};
use crate::errors::{SyncError, SyncResult};
use crate::record::{field, text_at};
use crate::store::{Condition, FieldFilter, FieldUpdate, FlightStore, StoredFlight};
use crate::vatsim::{VatsimDetector, NETWORK_NAME, NETWORK_NAME_PATH, RATIO_PATH};

/// Default number of rows for [`FlightOps::recent`].
pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// Fields tried, in order, when a reference is not a document id.
const REFERENCE_FIELDS: [&str; 4] = [field::PROVIDER_ID, "id", field::UNIQUE_ID, "callsign"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetagReport {
    pub total: usize,
    pub updated: usize,
    pub already_tagged: usize,
    pub unchanged: usize,
    pub updated_flights: Vec<FlightSummary>,
}

/// Short description of a flight returned by mutating operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSummary {
    pub id: String,
    pub callsign: Option<String>,
    pub departure: Option<String>,
    pub arrival: Option<String>,
    pub is_vatsim: bool,
}

impl FlightSummary {
    fn from_stored(flight: &StoredFlight, is_vatsim: bool) -> Self {
        let f = &flight.fields;
        let pick = |paths: &[&str]| paths.iter().find_map(|p| text_at(f, p)).map(str::to_string);
        Self {
            id: flight.id.clone(),
            callsign: pick(&["callsign", "flightNumber"]),
            departure: pick(&["departure", "dep.icao"]),
            arrival: pick(&["arrival", "arr.icao"]),
            is_vatsim,
        }
    }
}

#[derive(Clone)]
pub struct FlightOps {
    store: Arc<dyn FlightStore>,
    detector: Arc<VatsimDetector>,
}

impl FlightOps {
    pub fn new(store: Arc<dyn FlightStore>, detector: Arc<VatsimDetector>) -> Self {
        Self { store, detector }
    }

    pub async fn count(&self) -> SyncResult<u64> {
        self.store.count(&FieldFilter::all()).await
    }

    pub async fn recent(&self, limit: usize) -> SyncResult<Vec<FlightRow>> {
        let flights = self.store.find(&FieldFilter::all(), Some(limit)).await?;
        Ok(flights
            .iter()
            .map(|f| FlightRow::from_stored(f, &self.detector))
            .collect())
    }

    /// Applies the VATSIM heuristic to every flight not tagged yet.
    pub async fn retag_vatsim(&self) -> SyncResult<RetagReport> {
        let flights = self.store.find(&FieldFilter::all(), None).await?;
        let mut report = RetagReport {
            total: flights.len(),
            ..RetagReport::default()
        };

        for flight in &flights {
            if flight.fields.get(field::IS_VATSIM) == Some(&Value::Bool(true)) {
                report.already_tagged += 1;
                continue;
            }
            if !self.detector.is_vatsim(&flight.fields) {
                report.unchanged += 1;
                continue;
            }
            let mut update = FieldUpdate::default();
            update.set.insert(field::IS_VATSIM.to_string(), Value::Bool(true));
            update
                .set
                .insert(field::LAST_UPDATED_AT.to_string(), Value::from(iso(Utc::now())));
            if self.store.update_one(&flight.id, update).await? {
                report.updated += 1;
                report.updated_flights.push(FlightSummary::from_stored(flight, true));
            }
        }

        info!(
            "Updated {} flights, {} already tagged, {} unchanged.",
            report.updated, report.already_tagged, report.unchanged
        );
        Ok(report)
    }

    /// Sets `isVatsim` on the referenced flight, or removes it when `untag` is set.
    pub async fn tag_vatsim(&self, reference: &str, untag: bool) -> SyncResult<FlightSummary> {
        let flight = self.resolve_reference(reference).await?;

        let mut update = FieldUpdate::default();
        update
            .set
            .insert(field::LAST_UPDATED_AT.to_string(), Value::from(iso(Utc::now())));
        if untag {
            update.unset.push(field::IS_VATSIM.to_string());
        } else {
            update.set.insert(field::IS_VATSIM.to_string(), Value::Bool(true));
        }

        if !self.store.update_one(&flight.id, update).await? {
            return Err(SyncError::NotFound(reference.to_string()));
        }
        info!(
            "{} flight {}",
            if untag { "Untagged" } else { "Tagged" },
            flight.id
        );
        Ok(FlightSummary::from_stored(&flight, !untag))
    }

    pub async fn delete(&self, reference: &str) -> SyncResult<FlightSummary> {
        let flight = self.resolve_reference(reference).await?;
        if !self.store.delete_one(&flight.id).await? {
            return Err(SyncError::NotFound(reference.to_string()));
        }
        info!("Deleted flight {}", flight.id);
        let tagged = flight.fields.get(field::IS_VATSIM) == Some(&Value::Bool(true));
        Ok(FlightSummary::from_stored(&flight, tagged))
    }

    pub async fn dashboard(&self, today: NaiveDate) -> SyncResult<DashboardSummary> {
        let total = self.count().await?;
        let total_vatsim = self.store.count(&self.confirmed_filter()).await?;
        let newest = self.store.find(&FieldFilter::all(), Some(CHART_SAMPLE)).await?;
        Ok(summarize(total, total_vatsim, &newest, &self.detector, today))
    }

    /// Confirmed VATSIM flights created within the inclusive day range, newest first.
    pub async fn vatsim_audit(&self, start: NaiveDate, end: NaiveDate) -> SyncResult<Vec<AuditRow>> {
        if start > end {
            return Err(SyncError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        let filter = self.confirmed_filter().and(
            "createdAt",
            Condition::Between(
                format!("{start}T00:00:00.000Z"),
                format!("{end}T23:59:59.999Z"),
            ),
        );
        let flights = self.store.find(&filter, None).await?;
        Ok(flights.iter().map(AuditRow::from_stored).collect())
    }

    fn confirmed_filter(&self) -> FieldFilter {
        FieldFilter::eq(NETWORK_NAME_PATH, NETWORK_NAME)
            .and(RATIO_PATH, Condition::AtLeast(self.detector.confirmed_ratio()))
    }

    /// A document id first, then the provider id, the raw `id`, `uniqueId` and callsign.
    async fn resolve_reference(&self, reference: &str) -> SyncResult<StoredFlight> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(SyncError::NotFound("<empty reference>".to_string()));
        }
        if let Some(found) = self.store.find_by_id(reference).await? {
            return Ok(found);
        }
        for path in REFERENCE_FIELDS {
            if let Some(found) = self.store.find_one(&FieldFilter::eq(path, reference)).await? {
                return Ok(found);
            }
        }
        Err(SyncError::NotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VatsimConfig;
    use crate::store::{InsertOutcome, MemoryStore};
    use serde_json::json;

    async fn ops_with(docs: Vec<Value>) -> (FlightOps, Arc<MemoryStore>, Vec<String>) {
        let store = Arc::new(MemoryStore::new());
        let mut ids = Vec::new();
        for doc in docs {
            match store.insert_one(doc.as_object().cloned().unwrap()).await.unwrap() {
                InsertOutcome::Inserted { id } => ids.push(id),
                InsertOutcome::DuplicateKey => panic!("unexpected duplicate"),
            }
        }
        let detector = Arc::new(VatsimDetector::from_config(&VatsimConfig::default()).unwrap());
        (FlightOps::new(store.clone(), detector), store, ids)
    }

    #[tokio::test]
    async fn test_retag_counts() {
        let (ops, _, _) = ops_with(vec![
            json!({"callsign": "DLH400"}),
            json!({"callsign": "LOT1", "isVatsim": true}),
            json!({"callsign": "LOT2"}),
        ])
        .await;

        let report = ops.retag_vatsim().await.unwrap();
        assert_eq!((report.total, report.updated, report.already_tagged, report.unchanged), (3, 1, 1, 1));
        assert_eq!(report.updated_flights[0].callsign.as_deref(), Some("DLH400"));

        let again = ops.retag_vatsim().await.unwrap();
        assert_eq!((again.updated, again.already_tagged), (0, 2));
    }

    #[tokio::test]
    async fn test_tag_and_untag_by_reference() {
        let (ops, store, ids) = ops_with(vec![json!({"callsign": "LOT1", "uniqueId": "LOT1-EPWA-EGLL-2024-03-01"})]).await;

        let tagged = ops.tag_vatsim("LOT1-EPWA-EGLL-2024-03-01", false).await.unwrap();
        assert!(tagged.is_vatsim);
        let doc = store.find_by_id(&ids[0]).await.unwrap().unwrap();
        assert_eq!(doc.fields.get("isVatsim"), Some(&json!(true)));

        ops.tag_vatsim(&ids[0], true).await.unwrap();
        let doc = store.find_by_id(&ids[0]).await.unwrap().unwrap();
        assert!(doc.fields.get("isVatsim").is_none());
        assert!(doc.fields.contains_key("lastUpdatedAt"));
    }

    #[tokio::test]
    async fn test_unknown_reference_is_not_found() {
        let (ops, _, _) = ops_with(vec![json!({"callsign": "LOT1"})]).await;
        assert!(matches!(ops.delete("nope").await, Err(SyncError::NotFound(_))));
        assert!(matches!(ops.tag_vatsim("  ", false).await, Err(SyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_by_callsign() {
        let (ops, _, _) = ops_with(vec![json!({"callsign": "LOT1", "departure": "EPWA"})]).await;
        let deleted = ops.delete("LOT1").await.unwrap();
        assert_eq!(deleted.departure.as_deref(), Some("EPWA"));
        assert_eq!(ops.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_audit_filters_confirmed_flights_in_range() {
        let (ops, _, _) = ops_with(vec![
            json!({"callsign": "TOP1", "createdAt": "2024-03-01T10:00:00Z", "network": {"name": "vatsim", "ratio": 1.0}}),
            json!({"callsign": "TOP2", "createdAt": "2024-03-02T10:00:00Z", "network": {"name": "vatsim", "ratio": 0.5}}),
            json!({"callsign": "TOP3", "createdAt": "2024-03-05T10:00:00Z", "network": {"name": "vatsim", "ratio": 1.0}}),
            json!({"callsign": "TOP4", "createdAt": "2024-03-02T23:00:00Z", "network": {"name": "vatsim", "ratio": 0.9995}}),
        ])
        .await;

        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let rows = ops.vatsim_audit(start, end).await.unwrap();
        let callsigns: Vec<_> = rows.iter().map(|r| r.callsign.as_str()).collect();
        assert_eq!(callsigns, ["TOP4", "TOP1"]);

        assert!(matches!(ops.vatsim_audit(end, start).await, Err(SyncError::InvalidRange { .. })));
    }

    #[tokio::test]
    async fn test_dashboard_totals() {
        let (ops, _, _) = ops_with(vec![
            json!({"createdAt": "2024-03-01T10:00:00Z", "network": {"name": "vatsim", "ratio": 1.0}}),
            json!({"createdAt": "2024-03-01T11:00:00Z"}),
        ])
        .await;
        let summary = ops.dashboard(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()).await.unwrap();
        assert_eq!(summary.total_flights, 2);
        assert_eq!(summary.total_vatsim_flights, 1);
        assert_eq!(summary.last_30_days_flights, 2);
        assert_eq!(summary.last_30_days_vatsim_flights, 1);
    }
}
