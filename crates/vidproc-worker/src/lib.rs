//! Trigger-driven video transcoding worker.
//!
//! This crate provides:
//! - Local staging store with scoped cleanup of per-job files
//! - The job pipeline: validate, download, transcode, upload, clean up
//! - Per-key in-flight tracking
//! - Axum trigger endpoint, health/readiness probes and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod in_flight;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod routes;
pub mod staging;
pub mod state;

pub use config::WorkerConfig;
pub use error::{StagingError, WorkerError, WorkerResult};
pub use in_flight::{InFlightGuard, InFlightKeys};
pub use logging::JobLogger;
pub use pipeline::{JobPipeline, TriggerOutcome};
pub use routes::create_router;
pub use staging::{delete_if_present, CleanupReport, StagedFiles, StagingStore};
pub use state::AppState;
