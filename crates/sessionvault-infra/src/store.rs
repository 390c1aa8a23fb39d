//! Encrypted `SecureKeyValueStore` backed by SQLite.
//!
//! Values are encrypted with the vault before they reach the repository and
//! decrypted on read, so the database only ever holds `nonce || ciphertext`.

use std::sync::Arc;

use sessionvault_core::storage::secure_store::{SecureKeyValueStore, StoreKey};
use sessionvault_types::error::StorageError;

use crate::crypto::vault::VaultCrypto;
use crate::sqlite::blob::{BlobInfo, SqliteBlobRepository};

pub struct VaultKeyValueStore {
    repo: SqliteBlobRepository,
    crypto: Arc<VaultCrypto>,
}

impl VaultKeyValueStore {
    pub fn new(repo: SqliteBlobRepository, crypto: Arc<VaultCrypto>) -> Self {
        Self { repo, crypto }
    }

    /// Size and timestamp of each stored key. Never decrypts.
    pub async fn entries(&self) -> Result<Vec<BlobInfo>, StorageError> {
        self.repo.list().await
    }
}

impl SecureKeyValueStore for VaultKeyValueStore {
    async fn get(&self, key: StoreKey) -> Result<Option<String>, StorageError> {
        let Some(encrypted) = self.repo.get(key.as_str()).await? else {
            return Ok(None);
        };
        let plaintext = self
            .crypto
            .decrypt(&encrypted)
            .map_err(|_| StorageError::Backend("decryption failed".to_string()))?;
        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|_| StorageError::Decode("decrypted value is not valid UTF-8".to_string()))
    }

    async fn store(&self, key: StoreKey, value: &str) -> Result<(), StorageError> {
        let encrypted = self
            .crypto
            .encrypt(value.as_bytes())
            .map_err(|_| StorageError::Backend("encryption failed".to_string()))?;
        self.repo.put(key.as_str(), &encrypted).await
    }

    async fn delete(&self, key: StoreKey) -> Result<(), StorageError> {
        self.repo.delete(key.as_str()).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::Duration;
    use sessionvault_core::session::{CreateReason, RestoreOutcome, SessionService, SessionStore};
    use sessionvault_types::config::SessionConfig;
    use sessionvault_types::id::{ChannelId, ServerId, TaskId};
    use sessionvault_types::security::SessionSecurityMetadata;
    use sessionvault_types::session::{
        ChannelState, ChannelType, MessageHistoryState, MessageRole, ServerState, TaskStatus,
    };

    use super::*;
    use crate::crypto::hash::Sha256ContentHasher;
    use crate::crypto::vault::VaultKeySource;
    use crate::filesystem::vault_key_path;
    use crate::sanitize::RegexSanitizer;
    use crate::sqlite::pool::DatabasePool;

    fn key(byte: u8) -> Arc<VaultCrypto> {
        Arc::new(VaultCrypto::new(&[byte; 32]))
    }

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open_in(dir.path()).await.unwrap();
        std::mem::forget(dir);
        pool
    }

    #[tokio::test]
    async fn test_roundtrip_and_ciphertext_at_rest() {
        let pool = test_pool().await;
        let store = VaultKeyValueStore::new(SqliteBlobRepository::new(pool.clone()), key(7));
        let payload = r#"{"sessionId":"abc","note":"top secret"}"#;
        store.store(StoreKey::Session, payload).await.unwrap();

        assert_eq!(
            store.get(StoreKey::Session).await.unwrap().as_deref(),
            Some(payload)
        );

        let raw = SqliteBlobRepository::new(pool)
            .get(StoreKey::Session.as_str())
            .await
            .unwrap()
            .unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("top secret"));
    }

    #[tokio::test]
    async fn test_wrong_key_is_backend_error() {
        let pool = test_pool().await;
        VaultKeyValueStore::new(SqliteBlobRepository::new(pool.clone()), key(1))
            .store(StoreKey::Security, "{}")
            .await
            .unwrap();

        let other = VaultKeyValueStore::new(SqliteBlobRepository::new(pool), key(2));
        let err = other.get(StoreKey::Security).await.unwrap_err();
        assert_eq!(err, StorageError::Backend("decryption failed".to_string()));
    }

    #[tokio::test]
    async fn test_delete_absent_key_is_noop() {
        let store = VaultKeyValueStore::new(SqliteBlobRepository::new(test_pool().await), key(3));
        store.delete(StoreKey::Session).await.unwrap();
        assert!(store.get(StoreKey::Session).await.unwrap().is_none());
        assert!(store.entries().await.unwrap().is_empty());
    }

    async fn open_kv(data_dir: &Path) -> (VaultKeyValueStore, DatabasePool) {
        let pool = DatabasePool::open_in(data_dir).await.unwrap();
        let crypto =
            VaultCrypto::open(&VaultKeySource::KeyFile(vault_key_path(data_dir))).unwrap();
        (
            VaultKeyValueStore::new(SqliteBlobRepository::new(pool.clone()), Arc::new(crypto)),
            pool,
        )
    }

    async fn start(data_dir: &Path) -> (SessionStore, DatabasePool) {
        let config = SessionConfig::default();
        let (kv, pool) = open_kv(data_dir).await;
        let sanitizer = RegexSanitizer::new(config.display_name_max_chars).unwrap();
        let service =
            SessionService::new(kv, Sha256ContentHasher, Arc::new(sanitizer), config.clone());
        let store = SessionStore::spawn(service, config.command_buffer);
        store.initialize().await;
        (store, pool)
    }

    #[tokio::test]
    async fn test_session_survives_restart() {
        let dir = tempfile::tempdir().unwrap();

        let (store, pool) = start(dir.path()).await;
        assert_eq!(
            store.restore_outcome(),
            Some(RestoreOutcome::Created(CreateReason::NoSession))
        );
        store
            .add_server(
                ServerState::task("srv-t", "<b>Refactor</b>", "task-1")
                    .with_channel(ChannelState::agent("coder", "Coder", "coder"))
                    .with_channel(ChannelState::new("progress", "Progress", ChannelType::Progress)),
            )
            .await
            .unwrap();
        let stored = store
            .add_message(MessageHistoryState::new(
                "m1",
                "srv-t",
                "coder",
                MessageRole::Assistant,
                "<script>steal()</script>Plan ready",
            ))
            .await
            .unwrap();
        assert_eq!(stored.content, "Plan ready");
        assert!(stored.sanitized);
        store.archive_task_server(TaskId::from("task-1")).await.unwrap();
        let before = store.current_session().unwrap();
        drop(store);
        pool.close().await;

        let (store, _pool) = start(dir.path()).await;
        assert_eq!(store.restore_outcome(), Some(RestoreOutcome::Restored));
        let after = store.current_session().unwrap();
        assert_eq!(after.as_ref(), before.as_ref());
        assert_eq!(after.servers[0].server_name, "Refactor");
        assert!(after.servers[0].archived);
        assert_eq!(
            store.task_server_state(&TaskId::from("task-1")).unwrap().status,
            TaskStatus::Archived
        );
        let history = store.channel_history(&ServerId::from("srv-t"), &ChannelId::from("coder"));
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_metadata_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();

        let (store, pool) = start(dir.path()).await;
        store
            .add_server(ServerState::regular("srv", "Main"))
            .await
            .unwrap();
        let old_id = store.current_session().unwrap().session_id;
        drop(store);
        pool.close().await;

        // Age the persisted metadata past the validation interval.
        let (kv, pool) = open_kv(dir.path()).await;
        let raw = kv.get(StoreKey::Security).await.unwrap().unwrap();
        let mut meta: SessionSecurityMetadata = serde_json::from_str(&raw).unwrap();
        meta.last_validation -= Duration::minutes(6);
        kv.store(StoreKey::Security, &serde_json::to_string(&meta).unwrap())
            .await
            .unwrap();
        pool.close().await;

        let (store, _pool) = start(dir.path()).await;
        assert_eq!(
            store.restore_outcome(),
            Some(RestoreOutcome::Created(CreateReason::Stale))
        );
        let session = store.current_session().unwrap();
        assert_ne!(session.session_id, old_id);
        assert!(session.servers.is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_encrypted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _pool) = start(dir.path()).await;
        store.clear_session().await.unwrap();

        let (kv, _pool) = open_kv(dir.path()).await;
        assert!(kv.entries().await.unwrap().is_empty());
    }
}
