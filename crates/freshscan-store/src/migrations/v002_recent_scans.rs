//! v002 -- On-device recent-scans cache.

use rusqlite::Connection;

/// SQL executed when upgrading from version 1 to version 2.
const UP_SQL: &str = r#"
-- On-device cache of the most recently viewed scans
CREATE TABLE IF NOT EXISTS recent_scans (
    seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    scan_id  TEXT NOT NULL UNIQUE,             -- UUID of the remote scan
    payload  TEXT NOT NULL,                    -- JSON ScanView
    saved_at TEXT NOT NULL                     -- RFC-3339
);
"#;

/// Create the `recent_scans` table.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
