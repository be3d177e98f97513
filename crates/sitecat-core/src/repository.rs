//! Persistence port for the site snapshot.
//!
//! The catalog is stored as one serialized blob per key. Implementations
//! only move opaque strings; parsing and recovery belong to the caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{SiteError, SiteResult};

pub trait SnapshotStore: Send + Sync {
    /// The blob stored under `key`, or `None` when nothing was written.
    fn read(&self, key: &str) -> impl Future<Output = SiteResult<Option<String>>> + Send;

    /// Replace whatever is stored under `key`.
    fn write(&self, key: &str, blob: String) -> impl Future<Output = SiteResult<()>> + Send;

    fn remove(&self, key: &str) -> impl Future<Output = SiteResult<()>> + Send;
}

/// Process-local store. Used in tests and when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `blob` under `key`.
    pub fn with_blob(key: impl Into<String>, blob: impl Into<String>) -> Self {
        let store = Self::new();
        store.lock_blobs().insert(key.into(), blob.into());
        store
    }

    /// Make every subsequent read fail with a storage error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Synchronous peek, for assertions.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock_blobs().get(key).cloned()
    }

    fn lock_blobs(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotStore for MemoryStore {
    async fn read(&self, key: &str) -> SiteResult<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SiteError::Storage(format!("read of '{key}' refused")));
        }
        Ok(self.get(key))
    }

    async fn write(&self, key: &str, blob: String) -> SiteResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SiteError::Storage(format!("write to '{key}' refused")));
        }
        self.lock_blobs().insert(key.to_string(), blob);
        Ok(())
    }

    async fn remove(&self, key: &str) -> SiteResult<()> {
        self.lock_blobs().remove(key);
        Ok(())
    }
}
