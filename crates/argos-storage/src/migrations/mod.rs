//! Migration runner: version tracking, forward-only, transactional per
//! migration. Versions are recorded in `anvil_schema_version`.
//!
//! A database created by a newer binary is tolerated as long as every
//! required table exists: the run logs a warning instead of failing.

mod v001_initial_schema;
mod v002_ci_tables;
mod v003_quality_metrics;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use argos_core::errors::StoreError;

use crate::connection::sqe;

/// Total number of migrations.
pub const LATEST_VERSION: u32 = 3;

/// Tables that must exist for the binary to operate.
const REQUIRED_TABLES: [&str; 10] = [
    "execution_history",
    "execution_rules",
    "entity_statistics",
    "lint_violations",
    "lint_summaries",
    "coverage_history",
    "coverage_summaries",
    "ci_workflow_runs",
    "ci_workflow_jobs",
    "code_quality_metrics",
];

type MigrationFn = fn(&Connection) -> Result<(), StoreError>;

const MIGRATIONS: [(u32, &str, MigrationFn); 3] = [
    (1, "initial_schema", v001_initial_schema::migrate),
    (2, "ci_tables", v002_ci_tables::migrate),
    (3, "quality_metrics", v003_quality_metrics::migrate),
];

/// Get the current schema version from the database.
/// Returns 0 if the sentinel table doesn't exist yet.
pub fn current_version(conn: &Connection) -> Result<u32, StoreError> {
    let exists: bool = conn
        .prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name='anvil_schema_version'")
        .and_then(|mut stmt| stmt.exists([]))
        .map_err(sqe)?;

    if !exists {
        return Ok(0);
    }

    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM anvil_schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(sqe)
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1")
        .and_then(|mut stmt| stmt.exists([name]))
        .map_err(sqe)
}

/// Run all pending migrations. Forward-only, each wrapped in a transaction.
pub fn run_migrations(conn: &Connection) -> Result<u32, StoreError> {
    let current = current_version(conn)?;

    if current > LATEST_VERSION {
        // Created by a newer binary. Usable as long as nothing we need is
        // missing.
        let missing: Vec<&str> = REQUIRED_TABLES
            .iter()
            .copied()
            .filter(|t| !table_exists(conn, t).unwrap_or(false))
            .collect();
        if missing.is_empty() {
            warn!(
                "database schema v{current} is newer than this binary's v{LATEST_VERSION}; continuing"
            );
            return Ok(0);
        }
        return Err(StoreError::MigrationFailed {
            version: current,
            message: format!("newer schema is missing required tables: {}", missing.join(", ")),
        });
    }

    if current == LATEST_VERSION {
        debug!("database schema is up to date (v{current})");
        return Ok(0);
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS anvil_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
        )",
        [],
    )
    .map_err(sqe)?;

    info!("running migrations: v{current} -> v{LATEST_VERSION}");

    let mut applied = 0;
    for &(version, name, migrate_fn) in &MIGRATIONS {
        if version <= current {
            continue;
        }

        debug!("applying migration v{version:03}: {name}");

        conn.execute_batch("BEGIN IMMEDIATE").map_err(|e| StoreError::MigrationFailed {
            version,
            message: format!("begin transaction: {e}"),
        })?;

        match migrate_fn(conn) {
            Ok(()) => {
                conn.execute(
                    "INSERT INTO anvil_schema_version (version) VALUES (?1)",
                    [version],
                )
                .map_err(|e| StoreError::MigrationFailed {
                    version,
                    message: format!("record version: {e}"),
                })?;

                conn.execute_batch("COMMIT").map_err(|e| StoreError::MigrationFailed {
                    version,
                    message: format!("commit: {e}"),
                })?;

                info!("applied migration v{version:03}: {name}");
                applied += 1;
            }
            Err(e) => {
                warn!("migration v{version:03} failed: {e}, rolling back");
                let _ = conn.execute_batch("ROLLBACK");
                return Err(StoreError::MigrationFailed {
                    version,
                    message: e.to_string(),
                });
            }
        }
    }

    info!("applied {applied} migration(s), now at v{LATEST_VERSION}");
    Ok(applied)
}
