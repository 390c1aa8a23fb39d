//! Data directory layout.

use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "SESSIONVAULT_DATA_DIR";
const VAULT_KEY_FILE: &str = "vault.key";

/// Resolve the data directory.
///
/// Priority:
/// 1. `SESSIONVAULT_DATA_DIR` environment variable
/// 2. `~/.sessionvault`
/// 3. `.sessionvault` in the current directory
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".sessionvault");
    }
    PathBuf::from(".sessionvault")
}

/// Default location of the hex vault key.
pub fn vault_key_path(data_dir: &Path) -> PathBuf {
    data_dir.join(VAULT_KEY_FILE)
}

/// Create the data directory if needed.
pub async fn ensure_data_dir(data_dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(data_dir).await
}
