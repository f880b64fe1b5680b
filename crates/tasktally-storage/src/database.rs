// SPDX-FileCopyrightText: 2026 Tasktally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Clones of [`Database`] share that thread; do not open a second connection
//! for writes.

use std::path::Path;

use tasktally_core::TasktallyError;
use tracing::debug;

use crate::migrations;

/// Convert a tokio-rusqlite error into [`TasktallyError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> TasktallyError {
    TasktallyError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the single SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies connection
    /// PRAGMAs, and runs pending migrations.
    pub async fn open(path: &str) -> Result<Self, TasktallyError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TasktallyError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| TasktallyError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare().await?;
        debug!(path, "database opened");
        Ok(db)
    }

    /// Opens a private in-memory database with the full schema.
    pub async fn open_in_memory() -> Result<Self, TasktallyError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| TasktallyError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn };
        db.prepare().await?;
        Ok(db)
    }

    async fn prepare(&self) -> Result<(), TasktallyError> {
        self.conn
            .call(|conn| -> Result<Result<(), TasktallyError>, rusqlite::Error> {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;",
                )?;
                Ok(migrations::run_migrations(conn))
            })
            .await
            .map_err(map_tr_err)?
    }

    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoints the WAL so the main database file is self-contained.
    pub async fn close(&self) -> Result<(), TasktallyError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

/// Current time as unix milliseconds, the unit of `kv_entries.expires_at`.
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Current time in the ISO 8601 form used by the text timestamp columns.
pub(crate) fn now_iso() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
