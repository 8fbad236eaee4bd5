//! On-device cache of recently viewed scans.
//!
//! Only used by the client side; the server never touches this table.

use chrono::{DateTime, Utc};
use rusqlite::params;

use freshscan_shared::api::ScanView;

use crate::database::Database;
use crate::error::Result;
use crate::models::ts_to_sql;

impl Database {
    /// Save `scan` as the most recent entry and keep only the newest `keep`.
    ///
    /// Saving a scan that is already cached moves it to the front.
    pub fn push_recent_scan(
        &mut self,
        scan: &ScanView,
        keep: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let payload = serde_json::to_string(scan)?;
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);

        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "DELETE FROM recent_scans WHERE scan_id = ?1",
            params![scan.id.to_string()],
        )?;
        tx.execute(
            "INSERT INTO recent_scans (scan_id, payload, saved_at) VALUES (?1, ?2, ?3)",
            params![scan.id.to_string(), payload, ts_to_sql(&now)],
        )?;
        tx.execute(
            "DELETE FROM recent_scans
             WHERE seq NOT IN (SELECT seq FROM recent_scans ORDER BY seq DESC LIMIT ?1)",
            params![keep],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Cached scans, newest first.
    pub fn list_recent_scans(&self) -> Result<Vec<ScanView>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT payload FROM recent_scans ORDER BY seq DESC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut scans = Vec::new();
        for row in rows {
            scans.push(serde_json::from_str(&row?)?);
        }
        Ok(scans)
    }

    pub fn clear_recent_scans(&self) -> Result<usize> {
        let removed = self.conn().execute("DELETE FROM recent_scans", [])?;
        Ok(removed)
    }
}
