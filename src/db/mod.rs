//! Database module
//!
//! Append-only storage for sessions, their page views and custom events.
//! All filtering and ordering happens in SQLite; nothing is cached here.

mod events;
mod models;
mod page_views;
mod schema;
mod sessions;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

pub use models::{
    Event, EventResult, PageView, PageViewItem, PageViewResult, Session, StoredSession,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to encode event payload: {0}")]
    EncodePayload(#[source] serde_json::Error),

    #[error("Stored payload of event {id} is not valid JSON: {source}")]
    CorruptPayload {
        id: i64,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let in_memory = config.url == ":memory:";

        let pool = if in_memory {
            // Each connection to :memory: is a separate database, so keep exactly one open
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true))
                .await?
        } else {
            if let Some(parent) = Path::new(&config.url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let options = SqliteConnectOptions::new()
                .filename(&config.url)
                .create_if_missing(true)
                .foreign_keys(true)
                // WAL lets readers proceed while a session transaction commits
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .connect_with(options)
                .await?
        };

        info!("Connected to SQLite database: {}", config.url);
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        for statement in schema::MIGRATIONS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn to_millis(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_millis()
}

/// Lower range bound in stored precision. Rounds up so that truncated rows
/// from before `timestamp` stay excluded.
fn to_millis_ceil(timestamp: DateTime<Utc>) -> i64 {
    let millis = timestamp.timestamp_millis();
    if timestamp.timestamp_subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis + 1
    }
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
pub(crate) async fn test_database() -> Database {
    let config = DatabaseConfig {
        url: ":memory:".to_string(),
        max_connections: 1,
    };
    let db = Database::new(&config).await.unwrap();
    db.run_migrations().await.unwrap();
    db
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = test_database().await;
        db.run_migrations().await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&db.pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(name,)| name.as_str()).collect();

        assert_eq!(names, vec!["events", "flat_page_views", "page_views", "sessions"]);
    }

    #[tokio::test]
    async fn file_database_is_created() {
        let dir = std::env::temp_dir().join(format!("beacon-db-test-{}", std::process::id()));
        let path = dir.join("data").join("beacon.db");

        let config = DatabaseConfig {
            url: path.display().to_string(),
            max_connections: 2,
        };
        let db = Database::new(&config).await.unwrap();
        db.run_migrations().await.unwrap();

        assert!(path.exists());
        drop(db);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn millis_round_trip_truncates_sub_millisecond() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let back = from_millis(to_millis(ts));
        assert_eq!(back.timestamp_millis(), ts.timestamp_millis());
        assert_eq!(back.timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn lower_bound_rounds_up_to_next_millisecond() {
        let exact = Utc.timestamp_opt(1_700_000_000, 5_000_000).unwrap();
        assert_eq!(to_millis_ceil(exact), to_millis(exact));

        let partial = Utc.timestamp_opt(1_700_000_000, 900_000).unwrap();
        assert_eq!(to_millis_ceil(partial), 1_700_000_000_001);
        assert_eq!(to_millis(partial), 1_700_000_000_000);
    }
}
