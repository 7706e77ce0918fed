// SPDX-FileCopyrightText: 2026 Comanda Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;
use std::time::Duration;

use comanda_core::ComandaError;
use tracing::{debug, info};

use crate::migrations;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Convert a tokio-rusqlite error into `ComandaError::Storage`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ComandaError {
    ComandaError::storage(e)
}

/// Handle to the order database.
///
/// Wraps the single `tokio_rusqlite::Connection`; query modules take
/// `&Database` and run their statements through [`Database::connection`].
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at `path` with WAL enabled.
    pub async fn open(path: &str) -> Result<Self, ComandaError> {
        Self::open_with(path, true, DEFAULT_BUSY_TIMEOUT).await
    }

    /// Open the database, apply PRAGMAs and run pending migrations.
    ///
    /// Migrations run on a short-lived blocking connection before the
    /// long-lived async connection is opened.
    pub async fn open_with(
        path: &str,
        wal_mode: bool,
        busy_timeout: Duration,
    ) -> Result<Self, ComandaError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(ComandaError::storage)?;
            }
        }

        let setup_path = path.to_string();
        let applied = tokio::task::spawn_blocking(move || -> Result<usize, ComandaError> {
            let mut conn =
                rusqlite::Connection::open(&setup_path).map_err(ComandaError::storage)?;
            apply_pragmas(&conn, wal_mode, busy_timeout).map_err(ComandaError::storage)?;
            migrations::run_migrations(&mut conn).map_err(ComandaError::storage)
        })
        .await
        .map_err(|e| ComandaError::Internal(format!("database setup task failed: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(ComandaError::storage)?;
        conn.call(move |conn| apply_pragmas(conn, wal_mode, busy_timeout))
            .await
            .map_err(map_tr_err)?;

        info!(path, applied_migrations = applied, "database opened");
        Ok(Self { conn })
    }

    /// The async connection all queries go through.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Flush the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<(), ComandaError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |_| Ok(()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Checkpoint and close the connection.
    pub async fn close(self) -> Result<(), ComandaError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(ComandaError::storage)
    }
}

fn apply_pragmas(
    conn: &rusqlite::Connection,
    wal_mode: bool,
    busy_timeout: Duration,
) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    if wal_mode {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "journal mode set");
    }
    Ok(())
}
