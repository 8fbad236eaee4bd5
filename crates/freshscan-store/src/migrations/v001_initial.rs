//! v001 -- Initial schema creation.
//!
//! Creates `accounts` and `scans`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Accounts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS accounts (
    id            TEXT PRIMARY KEY NOT NULL,          -- UUID v4
    email         TEXT NOT NULL UNIQUE COLLATE NOCASE,
    name          TEXT NOT NULL,
    password_hash TEXT NOT NULL,                      -- argon2 PHC string
    created_at    TEXT NOT NULL,                      -- RFC-3339, UTC, micros
    updated_at    TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Scans (append-only analysis results)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS scans (
    id                 TEXT PRIMARY KEY NOT NULL,     -- UUID v7
    owner_id           TEXT NOT NULL,                 -- FK -> accounts(id)
    file_name          TEXT NOT NULL,
    content_type       TEXT NOT NULL
        CHECK (content_type IN ('image/jpeg', 'image/png', 'image/webp', 'application/pdf')),
    blob_name          TEXT NOT NULL UNIQUE,
    file_size          INTEGER NOT NULL
        CHECK (file_size >= 0 AND file_size <= 10485760),
    analyzed_at        TEXT NOT NULL,                 -- RFC-3339, UTC, micros
    quality_score      INTEGER NOT NULL
        CHECK (quality_score BETWEEN 0 AND 100),
    freshness          TEXT NOT NULL
        CHECK (freshness IN ('Excellent', 'Good', 'Fair', 'Poor')),
    nutrition          TEXT NOT NULL
        CHECK (nutrition IN ('High', 'Medium', 'Low')),
    recommendations    TEXT NOT NULL,                 -- JSON array of strings
    warnings           TEXT NOT NULL,                 -- JSON array of strings
    processing_time_ms INTEGER NOT NULL CHECK (processing_time_ms >= 0),
    model_version      TEXT NOT NULL,
    confidence         REAL NOT NULL
        CHECK (confidence >= 0.0 AND confidence <= 1.0),

    FOREIGN KEY (owner_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_scans_owner_analyzed
    ON scans(owner_id, analyzed_at DESC, id DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
