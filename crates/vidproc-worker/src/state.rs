//! Application state.

use std::sync::Arc;

use vidproc_media::FfmpegTranscoder;
use vidproc_storage::{BucketAssets, RemoteAssets, StorageConfig, StorageResult};

use crate::config::WorkerConfig;
use crate::pipeline::JobPipeline;
use crate::staging::StagingStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: WorkerConfig,
    pub pipeline: Arc<JobPipeline>,
    pub assets: Arc<dyn RemoteAssets>,
}

impl AppState {
    /// Assemble state from explicit collaborators.
    pub fn new(config: WorkerConfig, pipeline: JobPipeline, assets: Arc<dyn RemoteAssets>) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
            assets,
        }
    }

    /// Build production state: S3-compatible storage and the FFmpeg transcoder.
    pub async fn from_config(config: WorkerConfig) -> StorageResult<Self> {
        let storage_config = StorageConfig::from_env()?;
        let client = storage_config.connect().await;
        let assets: Arc<dyn RemoteAssets> = Arc::new(BucketAssets::with_default_buckets(client));

        let staging = StagingStore::new(&config.raw_dir, &config.processed_dir);
        let pipeline = JobPipeline::new(
            staging,
            Arc::clone(&assets),
            Arc::new(FfmpegTranscoder::default()),
        );

        Ok(Self::new(config, pipeline, assets))
    }
}
