//! Infrastructure layer for SessionVault.
//!
//! Implements the ports defined in `sessionvault-core`: an encrypted SQLite
//! key-value store, the SHA-256 integrity hasher, and the regex sanitizer.
//! Also owns data-directory resolution and config loading.

pub mod config;
pub mod crypto;
pub mod filesystem;
pub mod sanitize;
pub mod sqlite;
pub mod store;
