//! Global configuration loader.
//!
//! Reads `config.toml` from the data directory. A missing or malformed file
//! yields [`GlobalConfig::default()`] so the session store always starts.

use std::path::Path;

use sessionvault_types::config::GlobalConfig;

pub const CONFIG_FILE: &str = "config.toml";

/// Load `{data_dir}/config.toml`, normalizing the `[session]` table.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(mut config) => {
            config.session = config.session.normalized();
            config
        }
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", config_path.display());
            GlobalConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionvault_types::config::SessionConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_global_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.session, SessionConfig::default());
    }

    #[tokio::test]
    async fn load_global_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join(CONFIG_FILE),
            r#"
[session]
validation_interval_secs = 60
max_file_contexts = 0
"#,
        )
        .await
        .unwrap();

        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.session.validation_interval_secs, 60);
        assert_eq!(config.session.max_file_contexts, 1);
        assert_eq!(config.session.max_message_history, 1000);
    }

    #[tokio::test]
    async fn load_global_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join(CONFIG_FILE), "[session\nnot toml")
            .await
            .unwrap();
        let config = load_global_config(tmp.path()).await;
        assert_eq!(config.session, SessionConfig::default());
    }
}
