//! SHA-256 digest for session integrity metadata.

use sha2::{Digest, Sha256};

use sessionvault_core::hash::ContentHasher;

/// Lowercase hex SHA-256 of the canonical integrity input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256ContentHasher;

impl Sha256ContentHasher {
    pub fn new() -> Self {
        Self
    }
}

impl ContentHasher for Sha256ContentHasher {
    fn compute_hash(&self, content: &str) -> String {
        format!("{:x}", Sha256::digest(content.as_bytes()))
    }
}
