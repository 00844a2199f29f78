//! In-flight key registry.
//!
//! Staged file names are derived from the object key, so two concurrent jobs
//! for the same key would share files. A key is claimed for the lifetime of
//! its job; a second trigger for a claimed key is turned away instead of
//! racing the first.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::metrics;

/// Set of raw object keys with a job currently running.
#[derive(Debug, Clone, Default)]
pub struct InFlightKeys {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlightKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, or `None` if a job for it is already running.
    pub fn try_claim(&self, key: &str) -> Option<InFlightGuard> {
        let mut keys = self.lock();
        if !keys.insert(key.to_string()) {
            return None;
        }
        metrics::set_jobs_in_flight(keys.len());

        Some(InFlightGuard {
            keys: Arc::clone(&self.keys),
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Claim on one key; released on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        keys.remove(&self.key);
        metrics::set_jobs_in_flight(keys.len());
    }
}
