//! Prometheus metrics for the worker.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "vidproc_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "vidproc_job_duration_seconds";
    pub const JOBS_IN_FLIGHT: &str = "vidproc_jobs_in_flight";
    pub const CLEANUP_FAILURES_TOTAL: &str = "vidproc_cleanup_failures_total";
}

/// Record a finished trigger, labelled `done` or by failure kind.
pub fn record_job(outcome: &'static str, duration_secs: f64) {
    let labels = [("outcome", outcome)];
    counter!(names::JOBS_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Update the in-flight jobs gauge.
pub fn set_jobs_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}

/// Record a staged file that could not be deleted.
pub fn record_cleanup_failure() {
    counter!(names::CLEANUP_FAILURES_TOTAL).increment(1);
}
