//! Cryptographic operations for SessionVault.
//!
//! - `hash`: SHA-256 digests for session integrity metadata
//! - `vault`: AES-256-GCM encryption of persisted session payloads

pub mod hash;
pub mod vault;
