//! Application state wiring the session store to its infrastructure.
//!
//! The session service is generic over store and hasher; `AppState` pins it
//! to the encrypted SQLite store (or the in-memory store for `--ephemeral`)
//! and hands the rest of the CLI a type-erased `SessionStore` handle.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use sessionvault_core::session::{SessionService, SessionStore};
use sessionvault_core::storage::memory::MemoryKeyValueStore;
use sessionvault_infra::config::load_global_config;
use sessionvault_infra::crypto::hash::Sha256ContentHasher;
use sessionvault_infra::crypto::vault::{VaultCrypto, VaultKeySource};
use sessionvault_infra::filesystem::{ensure_data_dir, resolve_data_dir, vault_key_path};
use sessionvault_infra::sanitize::RegexSanitizer;
use sessionvault_infra::sqlite::blob::{BlobInfo, SqliteBlobRepository};
use sessionvault_infra::sqlite::pool::DatabasePool;
use sessionvault_infra::store::VaultKeyValueStore;
use sessionvault_types::config::SessionConfig;

const PASSWORD_ENV: &str = "SESSIONVAULT_PASSWORD";

pub struct StateOptions {
    pub keychain: bool,
    pub ephemeral: bool,
}

/// Where session payloads are persisted.
pub enum Backend {
    Vault {
        kv: Arc<VaultKeyValueStore>,
        pool: DatabasePool,
        key_source: String,
    },
    Memory,
}

pub struct AppState {
    pub store: SessionStore,
    pub backend: Backend,
    pub config: SessionConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config, open the backend, spawn the session actor, and restore
    /// (or create) the session.
    pub async fn init(options: StateOptions) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir)
            .await
            .with_context(|| format!("Failed to create data dir {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await.session;
        let sanitizer = Arc::new(
            RegexSanitizer::new(config.display_name_max_chars)
                .context("Failed to compile sanitizer rules")?,
        );

        let (store, backend) = if options.ephemeral {
            let service = SessionService::new(
                MemoryKeyValueStore::new(),
                Sha256ContentHasher::new(),
                sanitizer,
                config.clone(),
            );
            (SessionStore::spawn(service, config.command_buffer), Backend::Memory)
        } else {
            let db_pool = DatabasePool::open_in(&data_dir)
                .await
                .context("Failed to open session database")?;
            let key_source = resolve_key_source(&data_dir, options.keychain);
            let crypto = VaultCrypto::open(&key_source).context("Failed to open session vault")?;
            let kv = Arc::new(VaultKeyValueStore::new(
                SqliteBlobRepository::new(db_pool.clone()),
                Arc::new(crypto),
            ));
            let service = SessionService::new(
                kv.clone(),
                Sha256ContentHasher::new(),
                sanitizer,
                config.clone(),
            );
            (
                SessionStore::spawn(service, config.command_buffer),
                Backend::Vault {
                    kv,
                    pool: db_pool,
                    key_source: key_source.label(),
                },
            )
        };

        store.initialize().await;

        Ok(Self {
            store,
            backend,
            config,
            data_dir,
        })
    }

    /// Stored rows (never decrypted). Empty for the in-memory backend.
    pub async fn stored_entries(&self) -> anyhow::Result<Vec<BlobInfo>> {
        match &self.backend {
            Backend::Vault { kv, .. } => kv.entries().await.context("Failed to list stored entries"),
            Backend::Memory => Ok(Vec::new()),
        }
    }

    pub fn backend_label(&self) -> String {
        match &self.backend {
            Backend::Vault { key_source, .. } => format!("SQLite (WAL), {key_source}"),
            Backend::Memory => "in-memory (ephemeral)".to_string(),
        }
    }

    pub async fn close(&self) {
        if let Backend::Vault { pool, .. } = &self.backend {
            pool.close().await;
        }
    }
}

/// `--keychain` wins, then `SESSIONVAULT_PASSWORD`, then the key file.
fn resolve_key_source(data_dir: &std::path::Path, keychain: bool) -> VaultKeySource {
    if keychain {
        return VaultKeySource::Keychain;
    }
    match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => VaultKeySource::Password(password),
        _ => VaultKeySource::KeyFile(vault_key_path(data_dir)),
    }
}
