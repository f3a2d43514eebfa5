// topsky-core/src/service.rs
//! The long-lived sync service: a background poller plus on-demand passes and backfills.
//!
//! Lifecycle is construct, `start`, `stop` (any number of times), then `dispose`. All
//! background work hangs off one root [`CancellationToken`]: each poller run gets a
//! child token, so `stop` ends one run and `dispose` ends everything.

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, error};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backfill::BackfillReport;
use crate::client::{FlightSource, NewskyClient};
use crate::config::SyncConfig;
use crate::errors::SyncResult;
use crate::flights::FlightOps;
use crate::pipeline::{Pipeline, RunReport, SyncMode};
use crate::status::StatusLog;
use crate::store::{FlightStore, MongoStore};
use crate::vatsim::VatsimDetector;

/// Number of log lines included in [`SyncStatus`].
pub const STATUS_LOG_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    pub started: bool,
    pub already_running: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOutcome {
    pub stopped: bool,
    pub already_stopped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub recent_log_lines: Vec<String>,
}

struct Poller {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SyncService {
    pipeline: Arc<Pipeline>,
    flights: FlightOps,
    poller: Mutex<Option<Poller>>,
    shutdown: CancellationToken,
}

impl SyncService {
    /// Assembles a service from explicit collaborators.
    pub fn new(
        source: Arc<dyn FlightSource>,
        store: Arc<dyn FlightStore>,
        config: &SyncConfig,
    ) -> SyncResult<Self> {
        let detector = Arc::new(VatsimDetector::from_config(&config.vatsim)?);
        let log = StatusLog::with_capacity(config.sync.log_capacity);
        let flights = FlightOps::new(Arc::clone(&store), Arc::clone(&detector));
        let pipeline = Pipeline::new(source, store, detector, log, config.sync.clone());

        Ok(Self {
            pipeline: Arc::new(pipeline),
            flights,
            poller: Mutex::new(None),
            shutdown: CancellationToken::new(),
        })
    }

    /// Builds the production service: a Newsky client and a MongoDB store.
    pub async fn connect(config: &SyncConfig) -> SyncResult<Self> {
        let source = Arc::new(NewskyClient::new(&config.newsky)?);
        let store = Arc::new(MongoStore::connect(&config.storage).await?);
        Self::new(source, store, config)
    }

    pub fn log(&self) -> &StatusLog {
        self.pipeline.log()
    }

    /// Read-side operations over the same store.
    pub fn flights(&self) -> &FlightOps {
        &self.flights
    }

    pub async fn start(&self) -> StartOutcome {
        let mut poller = self.poller.lock().await;
        if poller.as_ref().is_some_and(|p| !p.handle.is_finished()) {
            self.log().info("Background fetcher is already running").await;
            return StartOutcome {
                started: false,
                already_running: true,
            };
        }
        if self.shutdown.is_cancelled() {
            self.log()
                .error("Background fetcher cannot start: service has been disposed")
                .await;
            return StartOutcome {
                started: false,
                already_running: false,
            };
        }

        let token = self.shutdown.child_token();
        let handle = tokio::spawn(poll_loop(Arc::clone(&self.pipeline), token.clone()));
        *poller = Some(Poller { token, handle });

        self.log()
            .info(format!(
                "Background fetcher started (every {}s)",
                self.pipeline.settings.poll_interval_secs
            ))
            .await;
        StartOutcome {
            started: true,
            already_running: false,
        }
    }

    /// Cancels the poller and waits for the record it is writing, if any.
    ///
    /// The poller slot stays locked until the task has exited; a concurrent `start`
    /// waits behind it.
    pub async fn stop(&self) -> StopOutcome {
        let mut slot = self.poller.lock().await;
        let Some(poller) = slot.take().filter(|p| !p.handle.is_finished()) else {
            self.log().info("Background fetcher is already stopped").await;
            return StopOutcome {
                stopped: false,
                already_stopped: true,
            };
        };

        self.log().info("Stopping background fetcher").await;
        poller.token.cancel();
        if let Err(e) = poller.handle.await {
            error!("Poll task ended abnormally: {}", e);
        }
        self.log().info("Background fetcher stopped").await;
        drop(slot);
        StopOutcome {
            stopped: true,
            already_stopped: false,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| !p.handle.is_finished())
    }

    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            is_running: self.is_running().await,
            last_run_at: self.pipeline.last_run_at().await,
            recent_log_lines: self.log().tail(STATUS_LOG_LINES).await,
        }
    }

    /// Runs one pass now, independent of the poller.
    pub async fn run_once(&self) -> SyncResult<RunReport> {
        self.pipeline
            .run_recent_pass(SyncMode::Poll, &self.shutdown)
            .await
    }

    pub async fn run_backfill(&self, start: NaiveDate, end: NaiveDate) -> SyncResult<BackfillReport> {
        self.pipeline.run_backfill(start, end, &self.shutdown).await
    }

    /// Cancels all work and waits for the poller to finish.
    pub async fn dispose(&self) {
        self.shutdown.cancel();
        let taken = self.poller.lock().await.take();
        if let Some(poller) = taken {
            if let Err(e) = poller.handle.await {
                error!("Poll task ended abnormally: {}", e);
            }
        }
        debug!("Sync service disposed");
    }
}

/// One pass right away, then one per interval. A slow pass delays the next tick
/// instead of stacking ticks up.
async fn poll_loop(pipeline: Arc<Pipeline>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(pipeline.settings.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        // Failures are already on the status log; the next tick tries again.
        let _ = pipeline.run_recent_pass(SyncMode::Poll, &token).await;
    }
    debug!("Poll loop exited");
}
