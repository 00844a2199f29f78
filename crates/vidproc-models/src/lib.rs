//! Shared data models for the video processing worker.
//!
//! This crate provides:
//! - Push-trigger envelope decoding and validation
//! - Transcode job definitions with deterministic key/path derivation
//! - Fixed deployment constants (bucket names, output key prefix)

pub mod job;
pub mod trigger;

pub use job::{output_key_for, JobId, TranscodeJob, PROCESSED_BUCKET, PROCESSED_KEY_PREFIX, RAW_BUCKET};
pub use trigger::{parse_trigger, PushEnvelope, PushMessage, TriggerError, TriggerPayload, TriggerResult};
