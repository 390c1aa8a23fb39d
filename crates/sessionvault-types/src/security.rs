//! Security metadata persisted alongside (never inside) the session payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version tag written into every metadata record.
pub const ENCRYPTION_VERSION: &str = "1.0";

/// Freshness and integrity record for the persisted session.
///
/// Stored under its own key so that a tampered session payload cannot carry
/// its own matching digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSecurityMetadata {
    pub encryption_version: String,
    /// Last time the session was saved and re-validated.
    pub last_validation: DateTime<Utc>,
    /// Structural digest of the session at `last_validation`.
    pub integrity_hash: String,
    /// Number of saves since the session was created.
    pub access_count: u64,
    pub last_access: DateTime<Utc>,
}

impl SessionSecurityMetadata {
    /// Seconds elapsed since the last validation, clamped at zero.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_validation).num_seconds().max(0)
    }
}
