//! Secure key-value store trait.
//!
//! An opaque, encrypted-at-rest string store. The session store uses exactly
//! two logical keys: one for the session payload and one for its security
//! metadata. Implementations must replace a key's value atomically.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use sessionvault_types::error::StorageError;

/// The logical keys written by the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Serialized `ChatSession`.
    Session,
    /// Serialized `SessionSecurityMetadata`.
    Security,
}

impl StoreKey {
    /// Physical key name used by storage backends.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Session => "sessionvault.session",
            StoreKey::Security => "sessionvault.security",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for encrypted-at-rest string storage.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
/// Implementations live in sessionvault-infra.
pub trait SecureKeyValueStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        key: StoreKey,
    ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Replace the value stored under a key.
    fn store(
        &self,
        key: StoreKey,
        value: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete a key. No-op if the key does not exist.
    fn delete(&self, key: StoreKey) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<T: SecureKeyValueStore> SecureKeyValueStore for Arc<T> {
    fn get(
        &self,
        key: StoreKey,
    ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send {
        (**self).get(key)
    }

    fn store(
        &self,
        key: StoreKey,
        value: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).store(key, value)
    }

    fn delete(&self, key: StoreKey) -> impl Future<Output = Result<(), StorageError>> + Send {
        (**self).delete(key)
    }
}
