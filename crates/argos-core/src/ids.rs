//! Execution-id construction.
//!
//! Canonical forms:
//!   `local-YYYYMMDD-HHMMSS`          one local tool invocation
//!   `ci-{run_id}`                    run-level CI ingest
//!   `ci-{run_id}-{job_id}`           per-job CI ingest
//!   `ci-{run_id}-{project}`         project-subdivided CI lint ingest

use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};

/// Current time as Unix seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Format a local execution id for the given instant.
pub fn local_execution_id(ts: DateTime<Utc>) -> String {
    format!("local-{}", ts.format("%Y%m%d-%H%M%S"))
}

/// Run-level CI execution id.
pub fn ci_execution_id(run_id: u64) -> String {
    format!("ci-{run_id}")
}

/// Per-job CI execution id.
pub fn ci_job_execution_id(run_id: u64, job_id: u64) -> String {
    format!("ci-{run_id}-{job_id}")
}

/// Generates monotonic local execution ids. Two calls within the same
/// second bump the second so ids stay unique within a process.
pub struct ExecutionIdGenerator {
    last_second: Mutex<i64>,
}

impl ExecutionIdGenerator {
    pub fn new() -> Self {
        Self {
            last_second: Mutex::new(0),
        }
    }

    /// Next unique local execution id.
    pub fn next(&self) -> String {
        let now = now_unix();
        let mut last = self.last_second.lock().unwrap_or_else(|e| e.into_inner());
        let second = if now <= *last { *last + 1 } else { now };
        *last = second;
        let ts = Utc
            .timestamp_opt(second, 0)
            .single()
            .unwrap_or_else(Utc::now);
        local_execution_id(ts)
    }
}

impl Default for ExecutionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_id_format() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(local_execution_id(ts), "local-20260101-000000");
    }

    #[test]
    fn ci_id_forms() {
        assert_eq!(ci_execution_id(42), "ci-42");
        assert_eq!(ci_job_execution_id(42, 7), "ci-42-7");
    }

    #[test]
    fn generator_is_monotonic() {
        let gen = ExecutionIdGenerator::new();
        let a = gen.next();
        let b = gen.next();
        let c = gen.next();
        assert!(a < b, "{a} !< {b}");
        assert!(b < c, "{b} !< {c}");
    }
}
