//! In-memory implementation of `SecureKeyValueStore`.
//!
//! Values live in a `HashMap` behind a lock and are lost on drop. Used by tests
//! and `--ephemeral` runs. Read/write failures can be injected to exercise the
//! store's fallback and error-reporting paths.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use sessionvault_types::error::StorageError;

use super::secure_store::{SecureKeyValueStore, StoreKey};

/// Process-local key-value store with failure injection.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<StoreKey, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `store`/`delete` fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `get` calls served so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Synchronous peek at a raw value, bypassing failure injection.
    pub fn raw(&self, key: StoreKey) -> Option<String> {
        self.values
            .read()
            .ok()
            .and_then(|values| values.get(&key).cloned())
    }

    /// Synchronous overwrite of a raw value, bypassing failure injection.
    pub fn put_raw(&self, key: StoreKey, value: impl Into<String>) {
        if let Ok(mut values) = self.values.write() {
            values.insert(key, value.into());
        }
    }

    fn lock_poisoned() -> StorageError {
        StorageError::Backend("memory store lock poisoned".to_string())
    }
}

impl SecureKeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: StoreKey) -> Result<Option<String>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("read of {key} failed")));
        }
        let values = self.values.read().map_err(|_| Self::lock_poisoned())?;
        Ok(values.get(&key).cloned())
    }

    async fn store(&self, key: StoreKey, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("write of {key} failed")));
        }
        let mut values = self.values.write().map_err(|_| Self::lock_poisoned())?;
        values.insert(key, value.to_string());
        Ok(())
    }

    async fn delete(&self, key: StoreKey) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("delete of {key} failed")));
        }
        let mut values = self.values.write().map_err(|_| Self::lock_poisoned())?;
        values.remove(&key);
        Ok(())
    }
}
