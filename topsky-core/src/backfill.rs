// topsky-core/src/backfill.rs
//! Historical import over a date range.
//!
//! The inclusive day range is cut into contiguous windows (one day each by default).
//! Each window is paged through sequentially with a fixed pause between requests, since
//! the provider rate-limits bulk reads. The first error aborts the whole run.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::client::iso;
use crate::errors::{SyncError, SyncResult};
use crate::pipeline::{Pipeline, RunReport, SyncMode};

/// One `/flights/bydate` range. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub inserted_count: usize,
    pub updated_count: usize,
    pub unchanged_count: usize,
    pub skipped_count: usize,
    pub windows: usize,
    pub requests: usize,
}

impl BackfillReport {
    fn absorb(&mut self, run: &RunReport) {
        self.inserted_count += run.inserted;
        self.updated_count += run.updated;
        self.unchanged_count += run.unchanged;
        self.skipped_count += run.skipped;
    }
}

/// Splits `[start 00:00, end 23:59:59.999]` into windows of `window_days` days.
///
/// A window ends one millisecond before the next one starts; the last window is cut
/// short at the end of the range.
pub fn plan_windows(start: NaiveDate, end: NaiveDate, window_days: u32) -> SyncResult<Vec<SyncWindow>> {
    if start > end {
        return Err(SyncError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
        });
    }
    if window_days == 0 {
        return Err(SyncError::Config(
            "backfill window must be at least one day".to_string(),
        ));
    }

    let range_end = midnight(end + ChronoDuration::days(1));
    let step = ChronoDuration::days(i64::from(window_days));
    let one_ms = ChronoDuration::milliseconds(1);

    let mut windows = Vec::new();
    let mut cursor = midnight(start);
    while cursor < range_end {
        let next = (cursor + step).min(range_end);
        windows.push(SyncWindow {
            start: cursor,
            end: next - one_ms,
        });
        cursor = next;
    }
    Ok(windows)
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

impl Pipeline {
    /// Imports every flight created between `start` and `end` (inclusive days).
    pub async fn run_backfill(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        cancel: &CancellationToken,
    ) -> SyncResult<BackfillReport> {
        let windows = match plan_windows(start, end, self.settings.backfill_window_days) {
            Ok(windows) => windows,
            Err(e) => {
                self.log.error(format!("Backfill rejected: {e}")).await;
                return Err(e);
            }
        };

        self.log
            .info(format!(
                "Starting backfill {start} -> {end} ({} window(s))",
                windows.len()
            ))
            .await;

        let result = self.backfill_windows(&windows, cancel).await;
        match &result {
            Ok(report) => {
                self.log
                    .info(format!(
                        "Backfill completed: new {}, updated {}, unchanged {}, skipped {}",
                        report.inserted_count,
                        report.updated_count,
                        report.unchanged_count,
                        report.skipped_count
                    ))
                    .await
            }
            Err(e) => self.log.error(format!("Backfill aborted: {e}")).await,
        }
        result
    }

    async fn backfill_windows(
        &self,
        windows: &[SyncWindow],
        cancel: &CancellationToken,
    ) -> SyncResult<BackfillReport> {
        let page_size = self.settings.backfill_page_size;
        let delay = self.settings.backfill_request_delay();
        let mut report = BackfillReport {
            windows: windows.len(),
            ..BackfillReport::default()
        };

        for window in windows {
            self.log
                .info(format!("Syncing window {} -> {}", iso(window.start), iso(window.end)))
                .await;
            let mut skip: u32 = 0;

            loop {
                if report.requests > 0 {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }

                let page = self
                    .source
                    .fetch_flights_by_date(window.start, window.end, skip, page_size)
                    .await?;
                report.requests += 1;

                let fetched = page.len();
                let mut run = RunReport::new(SyncMode::Backfill);
                run.fetched = fetched;
                self.store_records(page.records, SyncMode::Backfill, cancel, &mut run)
                    .await?;
                report.absorb(&run);
                if run.cancelled {
                    return Err(SyncError::Cancelled);
                }

                skip = skip.saturating_add(u32::try_from(fetched).unwrap_or(u32::MAX));
                self.log
                    .info(format!(
                        "Fetched {fetched} via {} (offset {skip}), new so far {}",
                        page.via, report.inserted_count
                    ))
                    .await;

                if fetched < page_size as usize {
                    break;
                }
            }
        }
        Ok(report)
    }
}
