//! Structural integrity digest and security-metadata freshness.
//!
//! The digest covers only `{sessionId, timestamp, serverCount, messageCount}`.
//! It detects a swapped or reshaped payload, not edits to message bodies or
//! display names that keep collection sizes intact.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sessionvault_types::error::SessionError;
use sessionvault_types::id::SessionId;
use sessionvault_types::security::{ENCRYPTION_VERSION, SessionSecurityMetadata};
use sessionvault_types::session::ChatSession;

use crate::hash::ContentHasher;

/// Canonical digest input. Field order is fixed by the struct definition.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IntegrityInput {
    session_id: SessionId,
    timestamp: i64,
    server_count: usize,
    message_count: usize,
}

/// Computes and checks integrity digests and metadata staleness.
pub struct IntegrityValidator<H: ContentHasher> {
    hasher: H,
    validation_interval: Duration,
}

impl<H: ContentHasher> IntegrityValidator<H> {
    pub fn new(hasher: H, validation_interval: std::time::Duration) -> Self {
        Self {
            hasher,
            validation_interval: Duration::from_std(validation_interval)
                .unwrap_or_else(|_| Duration::seconds(300)),
        }
    }

    pub fn validation_interval(&self) -> Duration {
        self.validation_interval
    }

    /// Deterministic digest over the session's shape.
    pub fn compute_integrity_hash(&self, session: &ChatSession) -> String {
        let input = IntegrityInput {
            session_id: session.session_id,
            timestamp: session.timestamp.timestamp_millis(),
            server_count: session.servers.len(),
            message_count: session.message_history.len(),
        };
        // Serializing a struct of plain scalars cannot fail.
        let canonical = serde_json::to_string(&input).unwrap_or_default();
        self.hasher.compute_hash(&canonical)
    }

    /// Compare a fresh digest with the stored one.
    pub fn verify(
        &self,
        session: &ChatSession,
        metadata: &SessionSecurityMetadata,
    ) -> Result<(), SessionError> {
        let actual = self.compute_integrity_hash(session);
        if actual == metadata.integrity_hash {
            Ok(())
        } else {
            Err(SessionError::IntegrityMismatch {
                expected: metadata.integrity_hash.clone(),
                actual,
            })
        }
    }

    /// True when more than one validation interval has passed since the
    /// metadata was last refreshed.
    pub fn is_stale(&self, metadata: &SessionSecurityMetadata, now: DateTime<Utc>) -> bool {
        now - metadata.last_validation > self.validation_interval
    }

    /// Reject stale metadata with `SecurityStale`.
    pub fn check_fresh(
        &self,
        metadata: &SessionSecurityMetadata,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        if self.is_stale(metadata, now) {
            Err(SessionError::SecurityStale {
                age_secs: metadata.age_secs(now),
            })
        } else {
            Ok(())
        }
    }

    /// Metadata for a save happening at `now`, continuing the access count of
    /// `previous` when there is one.
    pub fn refresh(
        &self,
        session: &ChatSession,
        previous: Option<&SessionSecurityMetadata>,
        now: DateTime<Utc>,
    ) -> SessionSecurityMetadata {
        SessionSecurityMetadata {
            encryption_version: ENCRYPTION_VERSION.to_string(),
            last_validation: now,
            integrity_hash: self.compute_integrity_hash(session),
            access_count: previous.map(|m| m.access_count).unwrap_or(0) + 1,
            last_access: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::testing::SipHasher;
    use sessionvault_types::session::{MessageHistoryState, MessageRole, ServerState};

    fn validator() -> IntegrityValidator<SipHasher> {
        IntegrityValidator::new(SipHasher, std::time::Duration::from_secs(300))
    }

    #[test]
    fn test_hash_is_deterministic() {
        let v = validator();
        let session = ChatSession::new();
        assert_eq!(
            v.compute_integrity_hash(&session),
            v.compute_integrity_hash(&session.clone())
        );
    }

    #[test]
    fn test_hash_changes_with_server_count() {
        let v = validator();
        let mut session = ChatSession::new();
        let before = v.compute_integrity_hash(&session);
        session.servers.push(ServerState::regular("srv", "Main"));
        assert_ne!(before, v.compute_integrity_hash(&session));
    }

    #[test]
    fn test_hash_ignores_message_content() {
        let v = validator();
        let mut session = ChatSession::new();
        session.message_history.push(MessageHistoryState::new(
            "m1",
            "srv",
            "ch",
            MessageRole::User,
            "original",
        ));
        let before = v.compute_integrity_hash(&session);
        session.message_history[0].content = "tampered".to_string();
        session.servers.clear();
        assert_eq!(before, v.compute_integrity_hash(&session));
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let v = validator();
        let session = ChatSession::new();
        let meta = v.refresh(&session, None, Utc::now());
        assert!(v.verify(&session, &meta).is_ok());

        let mut other = session.clone();
        other.servers.push(ServerState::regular("srv", "Main"));
        let err = v.verify(&other, &meta).unwrap_err();
        assert!(matches!(err, SessionError::IntegrityMismatch { .. }));
    }

    #[test]
    fn test_staleness_boundary() {
        let v = validator();
        let now = Utc::now();
        let mut meta = v.refresh(&ChatSession::new(), None, now);

        meta.last_validation = now - Duration::minutes(5);
        assert!(!v.is_stale(&meta, now));

        meta.last_validation = now - Duration::minutes(6);
        assert!(v.is_stale(&meta, now));
        let err = v.check_fresh(&meta, now).unwrap_err();
        assert_eq!(err, SessionError::SecurityStale { age_secs: 360 });
    }

    #[test]
    fn test_refresh_increments_access_count() {
        let v = validator();
        let session = ChatSession::new();
        let first = v.refresh(&session, None, Utc::now());
        assert_eq!(first.access_count, 1);
        let second = v.refresh(&session, Some(&first), Utc::now());
        assert_eq!(second.access_count, 2);
        assert_eq!(second.encryption_version, ENCRYPTION_VERSION);
    }
}
