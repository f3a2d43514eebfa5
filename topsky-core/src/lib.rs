// topsky-core/src/lib.rs
//! # Topsky Core Library
//!
//! `topsky-core` imports flight records from the Newsky airline API into a document
//! store, keeps them de-duplicated, and tags flights flown on the VATSIM network.
//!
//! ## Modules
//!
//! * `config`: YAML configuration with environment overrides.
//! * `errors`: The [`SyncError`] enum shared by every fallible operation.
//! * `record`: The schemaless [`FlightRecord`] and the field names this crate writes.
//! * `identity`: Derived de-duplication keys ([`resolve_key`]).
//! * `vatsim`: The [`VatsimDetector`] heuristic and the stricter "confirmed" rule.
//! * `client`: The [`FlightSource`] trait and its HTTP implementation [`NewskyClient`].
//! * `store`: The [`FlightStore`] trait with MongoDB and in-memory backends.
//! * `status`: The bounded, newest-first [`StatusLog`].
//! * `pipeline`: One fetch-and-store pass and the per-record write path.
//! * `backfill`: Windowed, paced import of a historical date range.
//! * `service`: [`SyncService`], the background poller and its control surface.
//! * `flights` and `dashboard`: Operator actions and read-only views over stored flights.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use topsky_core::{SyncConfig, SyncService};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = SyncConfig::resolve(None)?;
//! let service = SyncService::connect(&config).await?;
//!
//! service.start().await;
//! // ... later
//! service.stop().await;
//! println!("{:#?}", service.status().await);
//! service.dispose().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`SyncResult`]. Configuration helpers return
//! `anyhow::Result` so the binary can attach context while loading files.
//!
//! ---
//! License: MIT OR Apache-2.0

pub mod backfill;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod flights;
pub mod identity;
pub mod pipeline;
pub mod record;
pub mod service;
pub mod status;
pub mod store;
pub mod vatsim;

/// Re-exports the configuration types.
pub use config::{NewskyConfig, SchedulerConfig, StorageConfig, SyncConfig, VatsimConfig};

/// Re-exports the custom error type for clear error reporting.
pub use errors::{SyncError, SyncResult};

pub use record::{FlightRecord, Fields};
pub use identity::{resolve_key, RecordKey};
pub use vatsim::{VatsimDetector, VatsimSignal};

/// Re-exports the upstream client seam.
pub use client::{FetchPath, FetchedPage, FlightSource, NewskyClient};

/// Re-exports the persistence seam and its backends.
pub use store::{FieldFilter, FlightStore, MemoryStore, MongoStore, StoredFlight};

pub use status::StatusLog;
pub use pipeline::{RecordOutcome, RunReport, SyncMode};
pub use backfill::{plan_windows, BackfillReport, SyncWindow};
pub use service::{StartOutcome, StopOutcome, SyncService, SyncStatus};
pub use flights::{FlightOps, FlightSummary, RetagReport};
pub use dashboard::{AuditRow, DashboardSummary, DayBucket, FlightRow};
