//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows one writer at a time: `writer` is a single-connection pool
//! that serializes upserts and deletes, `reader` serves concurrent SELECTs.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

const DATABASE_FILE: &str = "sessionvault.db";

#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open (creating if missing) and migrate the database at `database_url`.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(base_opts.clone())
            .await?;

        // Schema must exist before the read-only pool connects.
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(base_opts.read_only(true))
            .await?;

        Ok(Self { reader, writer })
    }

    /// Open the database file inside `data_dir`.
    pub async fn open_in(data_dir: &Path) -> Result<Self, sqlx::Error> {
        Self::new(&database_url(data_dir)).await
    }

    pub async fn close(&self) {
        self.writer.close().await;
        self.reader.close().await;
    }
}

/// `sqlite://{data_dir}/sessionvault.db?mode=rwc`
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join(DATABASE_FILE).display())
}
