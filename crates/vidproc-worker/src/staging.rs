//! Local staging store.
//!
//! Two process-wide scratch directories hold the files of in-flight jobs: raw
//! downloads and transcoded outputs. File names come from the object keys, so
//! jobs for distinct keys never touch each other's files.
//!
//! [`StagedFiles`] is the scoped guard for one job's pair of files. The pipeline
//! acquires it before the first step and releases it once on the way out,
//! whatever the outcome. Dropping an unreleased guard (panic, cancelled
//! request) still removes the files, synchronously.
//!
//! Nested keys (`uploads/clip.mp4`) stage under subdirectories of the two
//! roots. Those subdirectories are reference counted across running jobs and
//! removed by the last job that used them.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};
use vidproc_models::TranscodeJob;

use crate::error::StagingError;
use crate::metrics;

/// The pair of local scratch directories.
#[derive(Debug, Clone)]
pub struct StagingStore {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
    nested: Arc<NestedDirs>,
}

impl StagingStore {
    pub fn new(raw_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
            nested: Arc::default(),
        }
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Create both directories if absent. Safe to call repeatedly.
    pub async fn ensure_directories(&self) -> Result<(), StagingError> {
        for dir in [&self.raw_dir, &self.processed_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| StagingError::CreateDir {
                    path: dir.clone(),
                    source,
                })?;
            info!("Staging directory ready at {}", dir.display());
        }
        Ok(())
    }

    /// Build the job for a raw object key, with paths under this store.
    pub fn job_for(&self, input_key: &str) -> TranscodeJob {
        TranscodeJob::new(input_key, &self.raw_dir, &self.processed_dir)
    }

    /// Take ownership of the job's two local files and their subdirectories.
    pub fn stage(&self, job: &TranscodeJob) -> StagedFiles {
        let mut dirs = nested_dirs(&self.raw_dir, &job.local_input_path);
        dirs.extend(nested_dirs(&self.processed_dir, &job.local_output_path));
        self.nested.acquire(&dirs);

        StagedFiles {
            input: job.local_input_path.clone(),
            output: job.local_output_path.clone(),
            dirs,
            nested: Arc::clone(&self.nested),
            released: false,
        }
    }

    /// Delete a file; an absent file is not an error.
    pub async fn delete_if_present(&self, path: &Path) -> Result<bool, StagingError> {
        delete_if_present(path).await
    }
}

/// Delete a file; an absent file is not an error.
///
/// Returns whether a file was actually removed.
pub async fn delete_if_present(path: &Path) -> Result<bool, StagingError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!("File deleted at {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("File not found at {}, skipping delete", path.display());
            Ok(false)
        }
        Err(source) => Err(StagingError::Delete {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Directories strictly between `root` and `file`, deepest first.
fn nested_dirs(root: &Path, file: &Path) -> Vec<PathBuf> {
    file.ancestors()
        .skip(1)
        .take_while(|dir| *dir != root && dir.starts_with(root))
        .map(Path::to_path_buf)
        .collect()
}

/// Use counts of staging subdirectories created for nested keys.
#[derive(Debug, Default)]
struct NestedDirs {
    in_use: Mutex<HashMap<PathBuf, usize>>,
}

impl NestedDirs {
    fn acquire(&self, dirs: &[PathBuf]) {
        if dirs.is_empty() {
            return;
        }
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        for dir in dirs {
            *in_use.entry(dir.clone()).or_insert(0) += 1;
        }
    }

    /// Drop one use of each directory and remove the ones nobody uses.
    ///
    /// Removal happens under the lock so a job staging into the same
    /// directory either keeps it alive or recreates it afterwards.
    fn release(&self, dirs: &[PathBuf]) -> usize {
        if dirs.is_empty() {
            return 0;
        }
        let mut in_use = self.in_use.lock().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;

        for dir in dirs {
            let Some(count) = in_use.get_mut(dir) else {
                continue;
            };
            *count -= 1;
            if *count > 0 {
                continue;
            }
            in_use.remove(dir);

            match std::fs::remove_dir(dir) {
                Ok(()) => {
                    debug!("Staging subdirectory removed at {}", dir.display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => debug!("Keeping staging subdirectory {}: {}", dir.display(), e),
            }
        }

        removed
    }
}

/// Outcome of releasing a [`StagedFiles`] guard.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Files that existed and were removed
    pub removed: usize,
    /// Emptied subdirectories of nested keys that were removed
    pub removed_dirs: usize,
    /// Deletions that failed; never part of the job verdict
    pub failures: Vec<StagingError>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Scoped ownership of one job's input and output files.
#[derive(Debug)]
pub struct StagedFiles {
    input: PathBuf,
    output: PathBuf,
    dirs: Vec<PathBuf>,
    nested: Arc<NestedDirs>,
    released: bool,
}

impl StagedFiles {
    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Delete both files concurrently.
    ///
    /// Failures are logged and returned in the report, never propagated.
    pub async fn release(mut self) -> CleanupReport {
        self.released = true;

        let (input, output) = tokio::join!(
            delete_if_present(&self.input),
            delete_if_present(&self.output)
        );

        let mut report = CleanupReport::default();
        for result in [input, output] {
            match result {
                Ok(removed) => report.removed += usize::from(removed),
                Err(e) => {
                    warn!("Cleanup failed: {}", e);
                    metrics::record_cleanup_failure();
                    report.failures.push(e);
                }
            }
        }
        report.removed_dirs = self.nested.release(&self.dirs);

        report
    }
}

impl Drop for StagedFiles {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        warn!(
            input = %self.input.display(),
            output = %self.output.display(),
            "StagedFiles dropped without release() - removing files synchronously"
        );
        for path in [&self.input, &self.output] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to delete file at {}: {}", path.display(), e);
                    metrics::record_cleanup_failure();
                }
            }
        }
        self.nested.release(&self.dirs);
    }
}
