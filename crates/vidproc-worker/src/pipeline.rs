//! Job pipeline.
//!
//! One trigger runs as a single linear job:
//!
//! 1. validate the trigger body (no I/O on failure)
//! 2. claim the raw key against concurrent jobs for the same key
//! 3. acquire the staged files guard
//! 4. download, transcode, upload, each step short-circuiting on error
//! 5. release the guard (both deletions concurrently, errors only logged)
//! 6. report `Done` or the failure of the first step that failed
//!
//! Step 5 runs on every exit from step 4, so no branch carries its own cleanup.

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{warn, Instrument};
use vidproc_media::{TranscodeProfile, Transcoder};
use vidproc_models::{parse_trigger, TranscodeJob};
use vidproc_storage::RemoteAssets;

use crate::error::{WorkerError, WorkerResult, DONE_MESSAGE};
use crate::in_flight::InFlightKeys;
use crate::logging::JobLogger;
use crate::metrics;
use crate::staging::StagingStore;

/// Status and text returned to the trigger transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerOutcome {
    pub status: StatusCode,
    pub message: &'static str,
}

impl TriggerOutcome {
    pub fn done() -> Self {
        Self {
            status: StatusCode::OK,
            message: DONE_MESSAGE,
        }
    }

    pub fn failed(error: &WorkerError) -> Self {
        Self {
            status: error.status_code(),
            message: error.response_message(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl IntoResponse for TriggerOutcome {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Orchestrates download, transcode and upload for one trigger at a time.
pub struct JobPipeline {
    staging: StagingStore,
    assets: Arc<dyn RemoteAssets>,
    transcoder: Arc<dyn Transcoder>,
    profile: TranscodeProfile,
    in_flight: InFlightKeys,
}

impl JobPipeline {
    pub fn new(
        staging: StagingStore,
        assets: Arc<dyn RemoteAssets>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            staging,
            assets,
            transcoder,
            profile: TranscodeProfile::default(),
            in_flight: InFlightKeys::new(),
        }
    }

    /// Override the encoding profile.
    pub fn with_profile(mut self, profile: TranscodeProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn staging(&self) -> &StagingStore {
        &self.staging
    }

    pub fn in_flight(&self) -> &InFlightKeys {
        &self.in_flight
    }

    /// Handle a raw trigger body and produce the transport response.
    pub async fn handle_trigger(&self, body: &[u8]) -> TriggerOutcome {
        let started = Instant::now();
        let result = self.run_job(body).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(_) => {
                metrics::record_job("done", elapsed);
                TriggerOutcome::done()
            }
            Err(e) => {
                metrics::record_job(e.kind(), elapsed);
                TriggerOutcome::failed(&e)
            }
        }
    }

    /// Run one job to completion, returning the finished job on success.
    pub async fn run_job(&self, body: &[u8]) -> WorkerResult<TranscodeJob> {
        let payload = parse_trigger(body).map_err(|e| {
            warn!("Rejecting trigger: {}", e);
            WorkerError::from(e)
        })?;

        let _claim = self.in_flight.try_claim(&payload.name).ok_or_else(|| {
            warn!(input_key = %payload.name, "Job for this key is already running");
            WorkerError::Busy(payload.name.clone())
        })?;

        let job = self.staging.job_for(&payload.name);
        let logger = JobLogger::new(&job);
        let span = logger.create_span();

        async {
            logger.log_start(&format!("{} -> {}", job.input_key, job.output_key));

            let staged = self.staging.stage(&job);
            let result = self.execute_steps(&job, &logger).await;

            let report = staged.release().await;
            if !report.is_clean() {
                logger.log_warning(&format!(
                    "{} staged file(s) could not be deleted",
                    report.failures.len()
                ));
            }

            match &result {
                Ok(()) => logger.log_completion(&format!("published {}", job.output_key)),
                Err(e) => logger.log_error(&e.to_string()),
            }
            result
        }
        .instrument(span)
        .await?;

        Ok(job)
    }

    async fn execute_steps(&self, job: &TranscodeJob, logger: &JobLogger) -> WorkerResult<()> {
        logger.log_progress("downloading raw video");
        self.assets
            .fetch(&job.input_key, &job.local_input_path)
            .await
            .map_err(WorkerError::Download)?;

        logger.log_progress("transcoding");
        self.transcoder
            .transcode(&job.local_input_path, &job.local_output_path, &self.profile)
            .await?;

        logger.log_progress("uploading processed video");
        self.assets
            .publish(&job.local_output_path, &job.output_key)
            .await
            .map_err(WorkerError::Upload)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use vidproc_media::{MediaError, MediaResult};
    use vidproc_models::PushEnvelope;
    use vidproc_storage::{StorageError, StorageResult};

    use crate::error::{BAD_REQUEST_MESSAGE, BUSY_MESSAGE, FAILED_MESSAGE};

    #[derive(Default)]
    struct FakeAssets {
        fail_fetch: bool,
        fail_publish: bool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeAssets {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteAssets for FakeAssets {
        async fn fetch(&self, key: &str, destination: &Path) -> StorageResult<()> {
            self.calls.lock().unwrap().push(format!("fetch {key}"));
            if self.fail_fetch {
                return Err(StorageError::not_found(key));
            }
            if let Some(parent) = destination.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(destination, b"raw video").await?;
            Ok(())
        }

        async fn publish(&self, source: &Path, key: &str) -> StorageResult<()> {
            self.calls.lock().unwrap().push(format!("publish {key}"));
            if self.fail_publish {
                return Err(StorageError::upload_failed("permission denied"));
            }
            assert!(source.exists(), "published file must exist");
            Ok(())
        }

        async fn check_connectivity(&self) -> StorageResult<()> {
            Ok(())
        }
    }

    #[derive(Clone, Copy)]
    enum TranscodeMode {
        Succeed,
        /// Leaves a partial output behind, then fails
        FailPartial,
        /// Produces an output that the cleanup step cannot delete
        SucceedUndeletable,
    }

    struct FakeTranscoder {
        mode: TranscodeMode,
        calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    }

    impl FakeTranscoder {
        fn new(mode: TranscodeMode) -> Self {
            Self {
                mode,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(
            &self,
            input: &Path,
            output: &Path,
            profile: &TranscodeProfile,
        ) -> MediaResult<()> {
            assert_eq!(profile.target_height, 1080);
            self.calls
                .lock()
                .unwrap()
                .push((input.to_path_buf(), output.to_path_buf()));

            if let Some(parent) = output.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            match self.mode {
                TranscodeMode::Succeed => {
                    tokio::fs::copy(input, output).await?;
                    Ok(())
                }
                TranscodeMode::FailPartial => {
                    tokio::fs::write(output, b"partial").await?;
                    Err(MediaError::ffmpeg_failed(
                        "FFmpeg exited with non-zero status",
                        Some("Invalid data found when processing input".to_string()),
                        Some(1),
                    ))
                }
                TranscodeMode::SucceedUndeletable => {
                    tokio::fs::create_dir_all(output).await?;
                    Ok(())
                }
            }
        }
    }

    struct Harness {
        _dir: TempDir,
        pipeline: JobPipeline,
        assets: Arc<FakeAssets>,
        transcoder: Arc<FakeTranscoder>,
    }

    async fn harness(assets: FakeAssets, mode: TranscodeMode) -> Harness {
        let dir = TempDir::new().unwrap();
        let staging = StagingStore::new(
            dir.path().join("raw-videos"),
            dir.path().join("processed-videos"),
        );
        staging.ensure_directories().await.unwrap();

        let assets = Arc::new(assets);
        let transcoder = Arc::new(FakeTranscoder::new(mode));
        let pipeline = JobPipeline::new(staging, assets.clone(), transcoder.clone());

        Harness {
            _dir: dir,
            pipeline,
            assets,
            transcoder,
        }
    }

    fn trigger(payload: Value) -> Vec<u8> {
        serde_json::to_vec(&PushEnvelope::wrap(&payload)).unwrap()
    }

    fn assert_no_staged_files(h: &Harness, key: &str) {
        let job = h.pipeline.staging().job_for(key);
        assert!(!job.local_input_path.exists(), "raw file leaked");
        assert!(!job.local_output_path.exists(), "processed file leaked");
    }

    #[tokio::test]
    async fn test_success_publishes_and_cleans_up() {
        let h = harness(FakeAssets::default(), TranscodeMode::Succeed).await;

        let outcome = h.pipeline.handle_trigger(&trigger(json!({"name": "clip1.mp4"}))).await;

        assert_eq!(outcome, TriggerOutcome::done());
        assert_eq!(outcome.message, "Processing Done");
        assert_eq!(
            h.assets.calls(),
            vec!["fetch clip1.mp4", "publish processed-clip1.mp4"]
        );
        assert_eq!(h.transcoder.call_count(), 1);
        assert_no_staged_files(&h, "clip1.mp4");
        assert!(h.pipeline.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_staged_paths_follow_keys() {
        let h = harness(FakeAssets::default(), TranscodeMode::Succeed).await;

        h.pipeline.handle_trigger(&trigger(json!({"name": "clip1.mp4"}))).await;

        let calls = h.transcoder.calls.lock().unwrap().clone();
        let staging = h.pipeline.staging();
        assert_eq!(calls[0].0, staging.raw_dir().join("clip1.mp4"));
        assert_eq!(calls[0].1, staging.processed_dir().join("processed-clip1.mp4"));
    }

    #[tokio::test]
    async fn test_missing_name_touches_nothing() {
        let h = harness(FakeAssets::default(), TranscodeMode::Succeed).await;

        let outcome = h.pipeline.handle_trigger(&trigger(json!({}))).await;

        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert_eq!(outcome.message, BAD_REQUEST_MESSAGE);
        assert!(h.assets.calls().is_empty());
        assert_eq!(h.transcoder.call_count(), 0);
    }

    #[tokio::test]
    async fn test_garbage_body_is_client_error() {
        let h = harness(FakeAssets::default(), TranscodeMode::Succeed).await;

        let outcome = h.pipeline.handle_trigger(b"\x00\xffnot json").await;

        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert!(h.assets.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transcode_failure_cleans_up_partial_output() {
        let h = harness(FakeAssets::default(), TranscodeMode::FailPartial).await;

        let outcome = h.pipeline.handle_trigger(&trigger(json!({"name": "bad.mp4"}))).await;

        assert_eq!(outcome.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(outcome.message, FAILED_MESSAGE);
        assert_eq!(h.assets.calls(), vec!["fetch bad.mp4"]);
        assert_no_staged_files(&h, "bad.mp4");
    }

    #[tokio::test]
    async fn test_download_failure_skips_transcode() {
        let assets = FakeAssets {
            fail_fetch: true,
            ..Default::default()
        };
        let h = harness(assets, TranscodeMode::Succeed).await;

        let err = h
            .pipeline
            .run_job(&trigger(json!({"name": "gone.mp4"})))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Download(StorageError::NotFound(_))));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(h.transcoder.call_count(), 0);
        assert_no_staged_files(&h, "gone.mp4");
    }

    #[tokio::test]
    async fn test_upload_failure_still_cleans_up() {
        let assets = FakeAssets {
            fail_publish: true,
            ..Default::default()
        };
        let h = harness(assets, TranscodeMode::Succeed).await;

        let err = h
            .pipeline
            .run_job(&trigger(json!({"name": "clip1.mp4"})))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Upload(_)));
        assert_no_staged_files(&h, "clip1.mp4");
        assert!(h.pipeline.in_flight().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_failure_does_not_mask_success() {
        let h = harness(FakeAssets::default(), TranscodeMode::SucceedUndeletable).await;

        let outcome = h.pipeline.handle_trigger(&trigger(json!({"name": "clip1.mp4"}))).await;

        assert_eq!(outcome, TriggerOutcome::done());
        let job = h.pipeline.staging().job_for("clip1.mp4");
        assert!(!job.local_input_path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_job_for_same_key_is_turned_away() {
        let h = harness(FakeAssets::default(), TranscodeMode::Succeed).await;
        let _running = h.pipeline.in_flight().try_claim("clip1.mp4").unwrap();

        let outcome = h.pipeline.handle_trigger(&trigger(json!({"name": "clip1.mp4"}))).await;

        assert_eq!(outcome.status, StatusCode::CONFLICT);
        assert_eq!(outcome.message, BUSY_MESSAGE);
        assert!(h.assets.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dot_prefixed_alias_cannot_share_staged_files() {
        let h = harness(FakeAssets::default(), TranscodeMode::Succeed).await;
        let plain = trigger(json!({"name": "clip.mp4"}));
        let alias = trigger(json!({"name": "./clip.mp4"}));

        let (first, second) = tokio::join!(
            h.pipeline.handle_trigger(&plain),
            h.pipeline.handle_trigger(&alias)
        );

        assert_eq!(first, TriggerOutcome::done());
        assert_eq!(second.status, StatusCode::BAD_REQUEST);
        assert_eq!(h.assets.calls(), vec!["fetch clip.mp4", "publish processed-clip.mp4"]);
        assert_eq!(h.transcoder.call_count(), 1);
        assert_no_staged_files(&h, "clip.mp4");
    }

    #[tokio::test]
    async fn test_nested_key_leaves_no_subdirectories() {
        let h = harness(FakeAssets::default(), TranscodeMode::Succeed).await;

        let outcome = h
            .pipeline
            .handle_trigger(&trigger(json!({"name": "uploads/2024/clip.mp4"})))
            .await;

        assert_eq!(outcome, TriggerOutcome::done());
        let staging = h.pipeline.staging();
        assert!(!staging.raw_dir().join("uploads").exists());
        assert!(!staging.processed_dir().join("processed-uploads").exists());
        assert!(staging.raw_dir().is_dir());
        assert!(staging.processed_dir().is_dir());
    }

    #[tokio::test]
    async fn test_redelivery_after_completion_is_processed_again() {
        let h = harness(FakeAssets::default(), TranscodeMode::Succeed).await;
        let body = trigger(json!({"name": "clip1.mp4"}));

        let first = h.pipeline.run_job(&body).await.unwrap();
        let second = h.pipeline.run_job(&body).await.unwrap();

        assert_eq!(first.output_key, second.output_key);
        assert_eq!(h.transcoder.call_count(), 2);
    }
}
