//! Restore-vs-create state machine run once per process by `initialize`.
//!
//! ```text
//! Restoring ──no session──────────────▶ CreatingNew
//!     │
//!     ▼
//! ValidatingSecurity ──no metadata────▶ CreatingNew
//!     │              ──stale──(wipe)──▶ CreatingNew
//!     ▼
//! ValidatingIntegrity ──mismatch(wipe)▶ CreatingNew
//!     │
//!     ▼
//! Restored
//! ```
//!
//! Any store or decode error on the way aborts to the in-memory fallback.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use sessionvault_types::error::{SessionError, StorageError};
use sessionvault_types::security::SessionSecurityMetadata;
use sessionvault_types::session::ChatSession;
use tracing::{info, warn};

use crate::hash::ContentHasher;
use crate::storage::secure_store::{SecureKeyValueStore, StoreKey};

use super::service::SessionService;

/// Why a new empty session was created instead of restoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateReason {
    NoSession,
    NoSecurityMetadata,
    Stale,
    IntegrityMismatch,
}

impl fmt::Display for CreateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreateReason::NoSession => write!(f, "no stored session"),
            CreateReason::NoSecurityMetadata => write!(f, "no security metadata"),
            CreateReason::Stale => write!(f, "security metadata stale"),
            CreateReason::IntegrityMismatch => write!(f, "integrity mismatch"),
        }
    }
}

/// How the active session came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Loaded from the store after passing both checks.
    Restored,
    /// A new empty session was created and persisted.
    Created(CreateReason),
    /// Restoration failed unexpectedly; the session lives in memory only.
    Fallback,
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreOutcome::Restored => write!(f, "restored"),
            RestoreOutcome::Created(reason) => write!(f, "created ({reason})"),
            RestoreOutcome::Fallback => write!(f, "fallback (in-memory only)"),
        }
    }
}

enum RestorePhase {
    Restoring,
    ValidatingSecurity {
        session: ChatSession,
    },
    ValidatingIntegrity {
        session: ChatSession,
        metadata: SessionSecurityMetadata,
    },
    CreatingNew {
        reason: CreateReason,
    },
}

impl<K: SecureKeyValueStore, H: ContentHasher> SessionService<K, H> {
    /// Restore or create the active session. Never fails.
    ///
    /// Once a session is active, further calls return it without touching
    /// the store.
    pub async fn initialize(&mut self) -> Arc<ChatSession> {
        if let Some(session) = &self.session {
            return Arc::clone(session);
        }

        let outcome = match self.restore().await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "Session restore failed; continuing with in-memory fallback");
                self.reporter.report(&err);
                self.session = Some(Arc::new(ChatSession::fallback()));
                self.security = None;
                RestoreOutcome::Fallback
            }
        };
        self.outcome = Some(outcome);

        let session = self
            .session
            .get_or_insert_with(|| Arc::new(ChatSession::fallback()));
        Arc::clone(session)
    }

    async fn restore(&mut self) -> Result<RestoreOutcome, SessionError> {
        let mut phase = RestorePhase::Restoring;
        loop {
            phase = match phase {
                RestorePhase::Restoring => match self.store.get(StoreKey::Session).await? {
                    None => RestorePhase::CreatingNew {
                        reason: CreateReason::NoSession,
                    },
                    Some(raw) => RestorePhase::ValidatingSecurity {
                        session: decode(&raw)?,
                    },
                },

                RestorePhase::ValidatingSecurity { session } => {
                    match self.store.get(StoreKey::Security).await? {
                        None => RestorePhase::CreatingNew {
                            reason: CreateReason::NoSecurityMetadata,
                        },
                        Some(raw) => {
                            let metadata: SessionSecurityMetadata = decode(&raw)?;
                            match self.validator.check_fresh(&metadata, Utc::now()) {
                                Ok(()) => RestorePhase::ValidatingIntegrity { session, metadata },
                                Err(err) => {
                                    warn!(error = %err, "Discarding stored session");
                                    self.wipe().await?;
                                    RestorePhase::CreatingNew {
                                        reason: CreateReason::Stale,
                                    }
                                }
                            }
                        }
                    }
                }

                RestorePhase::ValidatingIntegrity { session, metadata } => {
                    match self.validator.verify(&session, &metadata) {
                        Ok(()) => {
                            info!(
                                session_id = %session.session_id,
                                servers = session.servers.len(),
                                messages = session.message_history.len(),
                                access_count = metadata.access_count,
                                "Session restored"
                            );
                            self.session = Some(Arc::new(session));
                            self.security = Some(metadata);
                            return Ok(RestoreOutcome::Restored);
                        }
                        Err(err) => {
                            warn!(error = %err, "Discarding stored session");
                            self.wipe().await?;
                            RestorePhase::CreatingNew {
                                reason: CreateReason::IntegrityMismatch,
                            }
                        }
                    }
                }

                RestorePhase::CreatingNew { reason } => {
                    let session = ChatSession::new();
                    info!(session_id = %session.session_id, %reason, "Creating new session");
                    self.session = Some(Arc::new(session));
                    self.security = None;
                    self.persist().await?;
                    return Ok(RestoreOutcome::Created(reason));
                }
            };
        }
    }

    /// Remove both persisted keys after a failed gate.
    async fn wipe(&self) -> Result<(), SessionError> {
        self.store.delete(StoreKey::Session).await?;
        self.store.delete(StoreKey::Security).await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, SessionError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Decode(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use sessionvault_types::session::{MessageHistoryState, MessageRole, ServerState};

    use super::*;
    use crate::report::testing::RecordingReporter;
    use crate::session::testing::{ScriptStripper, TestService, service_with};
    use crate::storage::memory::MemoryKeyValueStore;

    fn service(store: &Arc<MemoryKeyValueStore>) -> TestService {
        service_with(store.clone(), Arc::new(ScriptStripper))
    }

    /// Persist a session with one server and one message, then drop the service.
    async fn seed(store: &Arc<MemoryKeyValueStore>) -> ChatSession {
        let mut svc = service(store);
        svc.initialize().await;
        svc.add_server(ServerState::regular("srv", "Main")).await.unwrap();
        svc.add_message(MessageHistoryState::new(
            "m1",
            "srv",
            "general",
            MessageRole::User,
            "hello",
        ))
        .await
        .unwrap();
        svc.current_session().unwrap().as_ref().clone()
    }

    fn age_metadata(store: &MemoryKeyValueStore, by: Duration) {
        let raw = store.raw(StoreKey::Security).unwrap();
        let mut meta: SessionSecurityMetadata = serde_json::from_str(&raw).unwrap();
        meta.last_validation -= by;
        store.put_raw(StoreKey::Security, serde_json::to_string(&meta).unwrap());
    }

    #[tokio::test]
    async fn test_first_start_creates_and_persists() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let mut svc = service(&store);
        let session = svc.initialize().await;

        assert_eq!(
            svc.restore_outcome(),
            Some(RestoreOutcome::Created(CreateReason::NoSession))
        );
        assert!(session.servers.is_empty());
        assert!(store.raw(StoreKey::Session).is_some());
        let meta = svc.security_metadata().unwrap();
        assert_eq!(meta.access_count, 1);
        assert_eq!(meta.encryption_version, "1.0");
    }

    #[tokio::test]
    async fn test_restart_restores_equal_session() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let saved = seed(&store).await;

        let mut svc = service(&store);
        let restored = svc.initialize().await;
        assert_eq!(svc.restore_outcome(), Some(RestoreOutcome::Restored));
        assert_eq!(restored.as_ref(), &saved);
        assert_eq!(restored.message_history[0].content, "hello");
    }

    #[tokio::test]
    async fn test_second_initialize_returns_same_session_without_reads() {
        let store = Arc::new(MemoryKeyValueStore::new());
        seed(&store).await;

        let mut svc = service(&store);
        let first = svc.initialize().await;
        let reads = store.read_count();
        let second = svc.initialize().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.read_count(), reads);
    }

    #[tokio::test]
    async fn test_five_minutes_old_is_still_restored() {
        let store = Arc::new(MemoryKeyValueStore::new());
        seed(&store).await;
        age_metadata(&store, Duration::minutes(5) - Duration::seconds(1));

        let mut svc = service(&store);
        svc.initialize().await;
        assert_eq!(svc.restore_outcome(), Some(RestoreOutcome::Restored));
    }

    #[tokio::test]
    async fn test_stale_metadata_wipes_and_creates_new() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let saved = seed(&store).await;
        age_metadata(&store, Duration::minutes(6));

        let mut svc = service(&store);
        let session = svc.initialize().await;
        assert_eq!(
            svc.restore_outcome(),
            Some(RestoreOutcome::Created(CreateReason::Stale))
        );
        assert_ne!(session.session_id, saved.session_id);
        assert!(session.servers.is_empty());
        assert!(session.message_history.is_empty());

        // The store now holds only the new session.
        let stored: ChatSession =
            serde_json::from_str(&store.raw(StoreKey::Session).unwrap()).unwrap();
        assert_eq!(stored.session_id, session.session_id);
        assert_eq!(svc.security_metadata().unwrap().access_count, 1);
    }

    #[tokio::test]
    async fn test_integrity_mismatch_creates_new() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let mut saved = seed(&store).await;
        saved.servers.push(ServerState::regular("injected", "Injected"));
        store.put_raw(StoreKey::Session, serde_json::to_string(&saved).unwrap());

        let mut svc = service(&store);
        let session = svc.initialize().await;
        assert_eq!(
            svc.restore_outcome(),
            Some(RestoreOutcome::Created(CreateReason::IntegrityMismatch))
        );
        assert!(session.servers.is_empty());
    }

    #[tokio::test]
    async fn test_content_only_edit_is_not_detected() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let mut saved = seed(&store).await;
        saved.message_history[0].content = "edited".to_string();
        store.put_raw(StoreKey::Session, serde_json::to_string(&saved).unwrap());

        let mut svc = service(&store);
        let session = svc.initialize().await;
        assert_eq!(svc.restore_outcome(), Some(RestoreOutcome::Restored));
        assert_eq!(session.message_history[0].content, "edited");
    }

    #[tokio::test]
    async fn test_missing_metadata_creates_new() {
        let store = Arc::new(MemoryKeyValueStore::new());
        seed(&store).await;
        store.delete(StoreKey::Security).await.unwrap();

        let mut svc = service(&store);
        svc.initialize().await;
        assert_eq!(
            svc.restore_outcome(),
            Some(RestoreOutcome::Created(CreateReason::NoSecurityMetadata))
        );
    }

    #[tokio::test]
    async fn test_read_failure_falls_back() {
        let store = Arc::new(MemoryKeyValueStore::new());
        seed(&store).await;
        store.set_fail_reads(true);
        let reporter = Arc::new(RecordingReporter::default());

        let mut svc = service(&store).with_reporter(reporter.clone());
        let session = svc.initialize().await;
        assert_eq!(svc.restore_outcome(), Some(RestoreOutcome::Fallback));
        assert!(session.servers.is_empty());
        assert!(!session.user_preferences.notification_settings.enabled);
        assert!(svc.security_metadata().is_none());
        assert_eq!(reporter.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_payload_falls_back_without_overwriting() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store.put_raw(StoreKey::Session, "{not json");

        let mut svc = service(&store);
        svc.initialize().await;
        assert_eq!(svc.restore_outcome(), Some(RestoreOutcome::Fallback));
        assert_eq!(store.raw(StoreKey::Session).as_deref(), Some("{not json"));
    }

    #[tokio::test]
    async fn test_create_write_failure_falls_back() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store.set_fail_writes(true);

        let mut svc = service(&store);
        let session = svc.initialize().await;
        assert_eq!(svc.restore_outcome(), Some(RestoreOutcome::Fallback));
        assert!(!session.user_preferences.notification_settings.enabled);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            RestoreOutcome::Created(CreateReason::Stale).to_string(),
            "created (security metadata stale)"
        );
        assert_eq!(RestoreOutcome::Restored.to_string(), "restored");
    }
}
