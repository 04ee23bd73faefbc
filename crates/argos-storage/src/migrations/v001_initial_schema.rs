//! v001: execution history, rules, statistics, lint, and coverage tables.

use rusqlite::Connection;

use argos_core::errors::StoreError;

use crate::connection::sqe;

pub fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS execution_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            execution_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('PASSED','FAILED','SKIPPED','ERROR')),
            duration_seconds REAL NOT NULL DEFAULT 0 CHECK (duration_seconds >= 0),
            space TEXT NOT NULL CHECK (space IN ('local','ci')),
            metadata_json TEXT,
            UNIQUE (entity_id, execution_id)
        );
        CREATE INDEX IF NOT EXISTS idx_execution_history_entity_ts
            ON execution_history (entity_id, timestamp DESC);
        CREATE INDEX IF NOT EXISTS idx_execution_history_space_ts
            ON execution_history (space, timestamp DESC);
        CREATE INDEX IF NOT EXISTS idx_execution_history_execution
            ON execution_history (execution_id);

        CREATE TABLE IF NOT EXISTS execution_rules (
            name TEXT PRIMARY KEY,
            enabled INTEGER NOT NULL DEFAULT 1,
            criteria TEXT NOT NULL,
            window INTEGER NOT NULL DEFAULT 1 CHECK (window >= 1),
            threshold REAL NOT NULL DEFAULT 0 CHECK (threshold >= 0 AND threshold <= 1),
            entity_type TEXT NOT NULL DEFAULT 'test',
            groups_json TEXT NOT NULL DEFAULT '[]',
            executor_json TEXT NOT NULL DEFAULT 'null',
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS entity_statistics (
            entity_id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL,
            total_runs INTEGER NOT NULL DEFAULT 0,
            passed INTEGER NOT NULL DEFAULT 0,
            failed INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            failure_rate REAL NOT NULL DEFAULT 0,
            avg_duration REAL NOT NULL DEFAULT 0,
            last_run INTEGER,
            last_failure INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_entity_statistics_rate
            ON entity_statistics (failure_rate DESC, total_runs DESC);

        CREATE TABLE IF NOT EXISTS lint_violations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            execution_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            line INTEGER NOT NULL,
            column_num INTEGER,
            severity TEXT NOT NULL CHECK (severity IN ('ERROR','WARNING','INFO')),
            code TEXT NOT NULL,
            message TEXT NOT NULL,
            validator TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            space TEXT NOT NULL CHECK (space IN ('local','ci'))
        );
        CREATE INDEX IF NOT EXISTS idx_lint_violations_validator_code
            ON lint_violations (validator, code);
        CREATE INDEX IF NOT EXISTS idx_lint_violations_execution
            ON lint_violations (execution_id);

        CREATE TABLE IF NOT EXISTS lint_summaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            execution_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            validator TEXT NOT NULL,
            files_scanned INTEGER NOT NULL DEFAULT 0,
            total_violations INTEGER NOT NULL DEFAULT 0,
            errors INTEGER NOT NULL DEFAULT 0,
            warnings INTEGER NOT NULL DEFAULT 0,
            info INTEGER NOT NULL DEFAULT 0,
            by_code_json TEXT NOT NULL DEFAULT '{}',
            space TEXT NOT NULL CHECK (space IN ('local','ci')),
            UNIQUE (execution_id, validator)
        );
        CREATE INDEX IF NOT EXISTS idx_lint_summaries_space_ts
            ON lint_summaries (space, timestamp DESC);

        CREATE TABLE IF NOT EXISTS coverage_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            execution_id TEXT NOT NULL,
            file_path TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            total_statements INTEGER NOT NULL DEFAULT 0,
            covered_statements INTEGER NOT NULL DEFAULT 0,
            coverage_percentage REAL NOT NULL DEFAULT 0,
            missing_lines_json TEXT NOT NULL DEFAULT '[]',
            space TEXT NOT NULL CHECK (space IN ('local','ci'))
        );
        CREATE INDEX IF NOT EXISTS idx_coverage_history_file_ts
            ON coverage_history (file_path, timestamp);
        CREATE INDEX IF NOT EXISTS idx_coverage_history_execution
            ON coverage_history (execution_id);

        CREATE TABLE IF NOT EXISTS coverage_summaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            execution_id TEXT NOT NULL UNIQUE,
            timestamp INTEGER NOT NULL,
            total_coverage REAL NOT NULL DEFAULT 0,
            files_analyzed INTEGER NOT NULL DEFAULT 0,
            total_statements INTEGER NOT NULL DEFAULT 0,
            covered_statements INTEGER NOT NULL DEFAULT 0,
            space TEXT NOT NULL CHECK (space IN ('local','ci'))
        );
        CREATE INDEX IF NOT EXISTS idx_coverage_summaries_space_ts
            ON coverage_summaries (space, timestamp DESC);
        ",
    )
    .map_err(sqe)
}
