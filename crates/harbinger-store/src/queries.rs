//! Read operations over presence state.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use harbinger_core::PresenceRecord;

use crate::client::{table_name, PresenceStore, StoreError};

impl PresenceStore {
    /// Look up the record for one (port, ip) pair.
    pub fn find(&self, port: u16, ip: &str) -> Result<Option<PresenceRecord>, StoreError> {
        let conn = self.lock()?;
        if !table_exists(&conn, port)? {
            return Ok(None);
        }

        let raw = conn
            .query_row(
                &format!(
                    "SELECT ip_address, first_seen, last_seen FROM {} WHERE ip_address = ?1",
                    table_name(port)
                ),
                params![ip],
                raw_row,
            )
            .optional()?;

        raw.map(|r| r.into_record(port)).transpose()
    }

    /// All records for a port, oldest first.
    pub fn list(&self, port: u16) -> Result<Vec<PresenceRecord>, StoreError> {
        let conn = self.lock()?;
        if !table_exists(&conn, port)? {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT ip_address, first_seen, last_seen FROM {}
             ORDER BY first_seen, ip_address",
            table_name(port)
        ))?;
        let rows = stmt.query_map([], raw_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record(port)?);
        }
        Ok(records)
    }

    /// Number of hosts ever seen on a port.
    pub fn count(&self, port: u16) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        if !table_exists(&conn, port)? {
            return Ok(0);
        }

        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table_name(port)),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Ports that have a presence table, ascending.
    pub fn tracked_ports(&self) -> Result<Vec<u16>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'hosts_port_%'",
        )?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut ports = Vec::new();
        for name in names {
            if let Some(port) = name?
                .strip_prefix("hosts_port_")
                .and_then(|p| p.parse::<u16>().ok())
            {
                ports.push(port);
            }
        }
        ports.sort_unstable();
        Ok(ports)
    }
}

struct RawRow {
    ip_address: String,
    first_seen: String,
    last_seen: String,
}

impl RawRow {
    fn into_record(self, port: u16) -> Result<PresenceRecord, StoreError> {
        Ok(PresenceRecord {
            port,
            first_seen: parse_timestamp(&self.first_seen)?,
            last_seen: parse_timestamp(&self.last_seen)?,
            ip_address: self.ip_address,
        })
    }
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        ip_address: row.get(0)?,
        first_seen: row.get(1)?,
        last_seen: row.get(2)?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn table_exists(conn: &rusqlite::Connection, port: u16) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table_name(port)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
