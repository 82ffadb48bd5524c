//! Database handle: open, configure and migrate the SQLite file.

use std::path::Path;

use rollcall_core::error::StoreError;
use thiserror::Error;
use tokio_rusqlite::Connection;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS auth_tokens (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL UNIQUE,
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_faces (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id         INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    image_path      TEXT NOT NULL,
    image_hash      TEXT,
    embedding       TEXT,
    embedding_model TEXT NOT NULL DEFAULT 'VGG-Face',
    embedding_dim   INTEGER,
    is_primary      INTEGER NOT NULL DEFAULT 0,
    metadata        TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS user_faces_user_id ON user_faces(user_id);

-- At most one primary face per user, enforced in storage. Application code
-- additionally clears the previous primary before inserting a new one.
CREATE UNIQUE INDEX IF NOT EXISTS user_faces_one_primary_per_user
    ON user_faces(user_id) WHERE is_primary = 1;

CREATE TABLE IF NOT EXISTS attendances (
    id            TEXT PRIMARY KEY,
    user_id       INTEGER NOT NULL,
    date          TEXT NOT NULL,
    check_in      TEXT,
    check_out     TEXT,
    latitude      REAL,
    longitude     REAL,
    distance_m    REAL,
    activity_note TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    UNIQUE(user_id, date)
);

CREATE TABLE IF NOT EXISTS assignments (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    title       TEXT NOT NULL,
    description TEXT,
    image_url   TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS leaves (
    id         TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    type       TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date   TEXT NOT NULL,
    reason     TEXT,
    status     TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Handle to the opened database. Cloning is cheap; all clones share one
/// SQLite connection serviced by a dedicated thread.
#[derive(Clone)]
pub struct Db {
    conn: Connection,
}

impl Db {
    /// Open (creating if missing) and migrate the database at `path`.
    pub async fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.to_path_buf()).await?;
        let db = Self { conn };
        db.init().await?;
        tracing::info!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// In-memory database for tests.
    pub async fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().await?;
        let db = Self { conn };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<(), DbError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;",
                )?;
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub fn connection(&self) -> Connection {
        self.conn.clone()
    }

    /// Connectivity probe backing `GET /health/db`.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.query_row("SELECT 1", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_store_err)
    }
}

/// Translate a database error into the core taxonomy. Uniqueness violations
/// become `Conflict` (the primary-face race); everything else is opaque.
pub(crate) fn map_store_err(err: tokio_rusqlite::Error) -> StoreError {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, _)) = &err {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            return StoreError::Conflict;
        }
    }
    StoreError::Unavailable(err.to_string())
}

/// RFC 3339 timestamp for row stamps.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_and_probe() {
        let db = Db::open_in_memory().await.unwrap();
        db.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_migration_is_idempotent() {
        let db = Db::open_in_memory().await.unwrap();
        db.init().await.unwrap();
        db.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/rollcall.db");
        let db = Db::open(&path).await.unwrap();
        db.health_check().await.unwrap();
        assert!(path.exists());
    }
}
