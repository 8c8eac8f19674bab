//! SQLite connection management and per-port table setup.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

/// Errors from presence store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored timestamp {value:?} is not valid RFC 3339: {reason}")]
    Timestamp { value: String, reason: String },

    #[error("Presence store connection poisoned by a panicked writer")]
    Poisoned,
}

/// Handle to the presence database.
///
/// Holds a single connection behind a mutex; a run processes ports
/// sequentially, so contention only matters for the read-only CLI paths.
pub struct PresenceStore {
    conn: Mutex<Connection>,
}

impl PresenceStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "Presence database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create the presence table for every given port if it does not exist.
    pub fn ensure_tables(&self, ports: &[u16]) -> Result<(), StoreError> {
        let conn = self.lock()?;
        for &port in ports {
            create_table(&conn, port)?;
        }
        tracing::info!(?ports, "Presence tables initialized");
        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// Table name holding the presence records of `port`.
pub fn table_name(port: u16) -> String {
    format!("hosts_port_{port}")
}

pub(crate) fn create_table(conn: &Connection, port: u16) -> Result<(), StoreError> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            ip_address TEXT PRIMARY KEY,
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL
        )",
        table_name(port)
    ))?;
    Ok(())
}
