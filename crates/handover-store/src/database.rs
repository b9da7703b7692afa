// SPDX-FileCopyrightText: 2026 Handover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Async SQLite connection management.
//!
//! All SQL runs on the dedicated connection thread owned by
//! [`tokio_rusqlite::Connection`]; the single-writer model means query
//! modules never contend on the database lock.

use std::path::Path;

use handover_core::HandoverError;
use tokio_rusqlite::Connection;
use tracing::debug;

/// Handle to the opened SQLite database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path`, enable WAL mode,
    /// and run any pending migrations.
    pub async fn open(path: &str) -> Result<Self, HandoverError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| HandoverError::Storage {
                    source: Box::new(e),
                })?;
            }
        }

        // Migrations run on a short-lived blocking connection so the async
        // connection only ever sees a fully migrated schema.
        let migrate_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), HandoverError> {
            let mut conn =
                rusqlite::Connection::open(&migrate_path).map_err(|e| HandoverError::Storage {
                    source: Box::new(e),
                })?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")
                .map_err(|e| HandoverError::Storage {
                    source: Box::new(e),
                })?;
            crate::migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| HandoverError::Storage {
            source: Box::new(e),
        })??;

        let conn = Connection::open(path)
            .await
            .map_err(|e| HandoverError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path, "database opened");
        Ok(Self { conn })
    }

    /// The underlying async connection, for query modules.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL. Called before shutdown so the main database file
    /// is complete on disk.
    pub async fn close(&self) -> Result<(), HandoverError> {
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

/// Map a tokio-rusqlite error into the domain storage error.
pub fn map_tr_err<E: std::fmt::Display>(e: tokio_rusqlite::Error<E>) -> HandoverError {
    HandoverError::Storage {
        source: format!("{e}").into(),
    }
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
///
/// The fixed width and UTC offset make lexicographic comparison equivalent
/// to time comparison, which the lock-expiry SQL relies on.
pub fn now_ts() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
