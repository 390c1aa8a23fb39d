//! ContentHasher trait for computing integrity digests.
//!
//! Defined in sessionvault-core so the integrity validator can hash without
//! coupling to a specific algorithm. The `Sha256ContentHasher` adapter lives in
//! sessionvault-infra.

/// Abstraction over content hashing for integrity verification.
pub trait ContentHasher: Send + Sync {
    /// Compute a hex-encoded hash of the given content.
    fn compute_hash(&self, content: &str) -> String;
}
