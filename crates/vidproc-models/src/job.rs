//! Transcode job definitions.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bucket that receives raw uploads.
pub const RAW_BUCKET: &str = "vidproc-raw-videos";

/// Bucket that receives processed, publicly readable videos.
pub const PROCESSED_BUCKET: &str = "vidproc-processed-videos";

/// Prefix applied to the raw key to form the processed key.
pub const PROCESSED_KEY_PREFIX: &str = "processed-";

/// Derive the processed object key for a raw object key.
///
/// Pure prefixing, so redelivery of the same trigger always targets the same
/// processed object.
pub fn output_key_for(input_key: &str) -> String {
    format!("{}{}", PROCESSED_KEY_PREFIX, input_key)
}

/// Identifier used to correlate log lines of one job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One transcode job, alive for a single trigger invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeJob {
    pub job_id: JobId,
    /// Raw object key, verbatim from the trigger
    pub input_key: String,
    /// Processed object key
    pub output_key: String,
    /// Staged download location
    pub local_input_path: PathBuf,
    /// Staged transcode output location
    pub local_output_path: PathBuf,
}

impl TranscodeJob {
    /// Build a job for `input_key`, staging under the given directories.
    pub fn new(
        input_key: impl Into<String>,
        raw_dir: impl AsRef<Path>,
        processed_dir: impl AsRef<Path>,
    ) -> Self {
        let input_key = input_key.into();
        let output_key = output_key_for(&input_key);

        Self {
            job_id: JobId::new(),
            local_input_path: raw_dir.as_ref().join(&input_key),
            local_output_path: processed_dir.as_ref().join(&output_key),
            input_key,
            output_key,
        }
    }
}
