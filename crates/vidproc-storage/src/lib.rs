//! Object storage client for the video processing worker.
//!
//! This crate provides:
//! - Bucket-scoped download/upload against any S3-compatible endpoint
//! - Public-read marking of published objects
//! - The `RemoteAssets` capability used by the job pipeline

pub mod assets;
pub mod client;
pub mod error;

pub use assets::{BucketAssets, RemoteAssets};
pub use client::{BucketClient, StorageConfig};
pub use error::{StorageError, StorageResult};
