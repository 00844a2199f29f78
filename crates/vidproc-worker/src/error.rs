//! Worker error types.

use std::path::PathBuf;

use axum::http::StatusCode;
use thiserror::Error;
use vidproc_media::MediaError;
use vidproc_models::TriggerError;
use vidproc_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Response text for a rejected trigger.
pub const BAD_REQUEST_MESSAGE: &str = "Bad Request: missing filename.";
/// Response text for a key that is already being processed.
pub const BUSY_MESSAGE: &str = "Processing already in progress";
/// Response text for a failed job.
pub const FAILED_MESSAGE: &str = "Processing Failed";
/// Response text for a completed job.
pub const DONE_MESSAGE: &str = "Processing Done";

/// Reasons a job does not complete.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid trigger: {0}")]
    Validation(#[from] TriggerError),

    #[error("Key is already being processed: {0}")]
    Busy(String),

    #[error("Download failed: {0}")]
    Download(#[source] StorageError),

    #[error("Transcode failed: {0}")]
    Transcode(#[from] MediaError),

    #[error("Upload failed: {0}")]
    Upload(#[source] StorageError),
}

impl WorkerError {
    /// HTTP status reported to the trigger transport.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WorkerError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkerError::Busy(_) => StatusCode::CONFLICT,
            WorkerError::Download(_) | WorkerError::Transcode(_) | WorkerError::Upload(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Fixed response text; details stay in the logs.
    pub fn response_message(&self) -> &'static str {
        match self {
            WorkerError::Validation(_) => BAD_REQUEST_MESSAGE,
            WorkerError::Busy(_) => BUSY_MESSAGE,
            _ => FAILED_MESSAGE,
        }
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Validation(_) => "validation",
            WorkerError::Busy(_) => "busy",
            WorkerError::Download(_) => "download",
            WorkerError::Transcode(_) => "transcode",
            WorkerError::Upload(_) => "upload",
        }
    }
}

/// Local staging filesystem errors.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file at {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
