//! Structured job logging utilities.
//!
//! Every line carries the job ID and the raw object key so one job can be
//! followed through interleaved output from concurrent jobs.

use tracing::{error, info, warn, Span};
use vidproc_models::TranscodeJob;

/// Job logger with consistent contextual fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    input_key: String,
}

impl JobLogger {
    /// Create a logger for a job.
    pub fn new(job: &TranscodeJob) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            input_key: job.input_key.clone(),
        }
    }

    /// Log the start of a job.
    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, input_key = %self.input_key, "Job started: {}", message);
    }

    /// Log a step transition.
    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, input_key = %self.input_key, "Job progress: {}", message);
    }

    /// Log a non-fatal problem.
    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, input_key = %self.input_key, "Job warning: {}", message);
    }

    /// Log the failure of a job.
    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, input_key = %self.input_key, "Job error: {}", message);
    }

    /// Log the completion of a job.
    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, input_key = %self.input_key, "Job completed: {}", message);
    }

    /// Get the job ID.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, input_key = %self.input_key)
    }
}
