//! Worker configuration.

use std::path::PathBuf;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Listen host
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Staging directory for downloaded raw videos
    pub raw_dir: PathBuf,
    /// Staging directory for transcoded videos
    pub processed_dir: PathBuf,
    /// Max trigger body size
    pub max_body_size: usize,
    /// Serve Prometheus metrics at /metrics
    pub metrics_enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            raw_dir: PathBuf::from("./raw-videos"),
            processed_dir: PathBuf::from("./processed-videos"),
            max_body_size: 1024 * 1024, // 1MB
            metrics_enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            host: std::env::var("HOST").unwrap_or(default.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.port),
            raw_dir: std::env::var("RAW_VIDEO_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.raw_dir),
            processed_dir: std::env::var("PROCESSED_VIDEO_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.processed_dir),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_body_size),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(default.metrics_enabled),
        }
    }

    /// Socket address string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
