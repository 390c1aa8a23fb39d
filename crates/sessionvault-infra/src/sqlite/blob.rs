//! Raw encrypted-blob repository over the `secure_store` table.
//!
//! Stores and returns opaque bytes; encryption is the caller's job
//! (`VaultKeyValueStore`). Never logs values.

use chrono::{DateTime, Utc};
use sessionvault_types::error::StorageError;
use sqlx::Row;

use super::pool::DatabasePool;

/// Row metadata without the blob itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub key: String,
    pub size: usize,
    pub updated_at: DateTime<Utc>,
}

pub struct SqliteBlobRepository {
    pool: DatabasePool,
}

fn backend(e: sqlx::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Backend(format!("invalid datetime: {e}")))
}

impl SqliteBlobRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let row = sqlx::query("SELECT encrypted_value FROM secure_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(backend)?;

        row.map(|row| row.try_get::<Vec<u8>, _>("encrypted_value").map_err(backend))
            .transpose()
    }

    /// Insert or replace the whole value for `key`.
    pub async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        sqlx::query(
            r#"INSERT INTO secure_store (key, encrypted_value, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET encrypted_value = excluded.encrypted_value, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(backend)?;
        Ok(())
    }

    /// Delete `key`. Deleting an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM secure_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(backend)?;
        Ok(())
    }

    /// Metadata of every stored key, ordered by key.
    pub async fn list(&self) -> Result<Vec<BlobInfo>, StorageError> {
        let rows = sqlx::query(
            "SELECT key, length(encrypted_value) AS size, updated_at FROM secure_store ORDER BY key",
        )
        .fetch_all(&self.pool.reader)
        .await
        .map_err(backend)?;

        rows.iter()
            .map(|row| {
                let updated_at: String = row.try_get("updated_at").map_err(backend)?;
                let size: i64 = row.try_get("size").map_err(backend)?;
                Ok(BlobInfo {
                    key: row.try_get("key").map_err(backend)?,
                    size: usize::try_from(size).unwrap_or_default(),
                    updated_at: parse_datetime(&updated_at)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_repo() -> SqliteBlobRepository {
        let dir = tempfile::tempdir().unwrap();
        let pool = DatabasePool::open_in(dir.path()).await.unwrap();
        std::mem::forget(dir);
        SqliteBlobRepository::new(pool)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let repo = test_repo().await;
        repo.put("k", &[1, 2, 3]).await.unwrap();
        assert_eq!(repo.get("k").await.unwrap(), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let repo = test_repo().await;
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_whole_value() {
        let repo = test_repo().await;
        repo.put("k", &[1, 2, 3, 4]).await.unwrap();
        repo.put("k", &[9]).await.unwrap();
        assert_eq!(repo.get("k").await.unwrap(), Some(vec![9]));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let repo = test_repo().await;
        repo.put("k", &[1]).await.unwrap();
        repo.delete("k").await.unwrap();
        repo.delete("k").await.unwrap();
        assert!(repo.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_reports_sizes() {
        let repo = test_repo().await;
        repo.put("b", &[0; 10]).await.unwrap();
        repo.put("a", &[0; 3]).await.unwrap();
        let infos = repo.list().await.unwrap();
        let summary: Vec<(&str, usize)> = infos.iter().map(|i| (i.key.as_str(), i.size)).collect();
        assert_eq!(summary, vec![("a", 3), ("b", 10)]);
    }
}
