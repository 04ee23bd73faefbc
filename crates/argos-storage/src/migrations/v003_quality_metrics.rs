//! v003: per-file code quality rollups.

use rusqlite::Connection;

use argos_core::errors::StoreError;

use crate::connection::sqe;

pub fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS code_quality_metrics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL,
            validator TEXT NOT NULL,
            total_scans INTEGER NOT NULL DEFAULT 0,
            total_violations INTEGER NOT NULL DEFAULT 0,
            avg_violations_per_scan REAL NOT NULL DEFAULT 0,
            most_common_code TEXT,
            last_scan INTEGER,
            last_violation INTEGER,
            UNIQUE (file_path, validator)
        );
        ",
    )
    .map_err(sqe)
}
