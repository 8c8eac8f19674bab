//! Write operations for presence state.
//!
//! A batch of observations for one port is applied in a single
//! transaction: either every row is inserted or touched, or none is.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::client::{create_table, table_name, PresenceStore, StoreError};

impl PresenceStore {
    /// Record that `ips` were seen on `port` now; return the ones never seen before.
    pub fn upsert(&self, port: u16, ips: &[String]) -> Result<Vec<String>, StoreError> {
        self.upsert_at(port, ips, Utc::now())
    }

    /// Same as [`upsert`](Self::upsert) with an explicit observation time.
    ///
    /// New rows get `first_seen = last_seen = seen_at`; existing rows only
    /// have `last_seen` moved. An IP repeated within the batch is new at
    /// most once. Returned IPs keep their input order.
    pub fn upsert_at(
        &self,
        port: u16,
        ips: &[String],
        seen_at: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        if ips.is_empty() {
            return Ok(Vec::new());
        }

        let table = table_name(port);
        let now = seen_at.to_rfc3339();
        let mut conn = self.lock()?;
        create_table(&conn, port)?;

        let tx = conn.transaction()?;
        let mut new_ips = Vec::new();
        {
            let mut insert = tx.prepare(&format!(
                "INSERT OR IGNORE INTO {table} (ip_address, first_seen, last_seen)
                 VALUES (?1, ?2, ?2)"
            ))?;
            let mut touch =
                tx.prepare(&format!("UPDATE {table} SET last_seen = ?2 WHERE ip_address = ?1"))?;

            for ip in ips {
                if insert.execute(params![ip, now])? == 1 {
                    tracing::info!(port, ip = %ip, "New host detected");
                    new_ips.push(ip.clone());
                } else {
                    touch.execute(params![ip, now])?;
                }
            }
        }
        tx.commit()?;

        tracing::debug!(
            port,
            observed = ips.len(),
            new = new_ips.len(),
            "Presence batch applied"
        );
        Ok(new_ips)
    }
}
