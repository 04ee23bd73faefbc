//! Stable machine codes for every error kind.
//!
//! The CLI prints `code: sentence` on stderr; the HTTP layer embeds the code
//! in error payloads. Codes are append-only.

pub const STORE_ERROR: &str = "store/error";
pub const STORE_BUSY: &str = "store/busy";
pub const STORE_CORRUPTION: &str = "store/corruption";
pub const STORE_CONSTRAINT: &str = "store/constraint";
pub const STORE_NOT_FOUND: &str = "store/not-found";
pub const STORE_MIGRATION_FAILED: &str = "store/migration-failed";

pub const PARSE_SYNTAX: &str = "parse/syntax";
pub const PARSE_INCOMPLETE: &str = "parse/incomplete";
pub const PARSE_UNKNOWN_FORMAT: &str = "parse/unknown-format";

pub const RUNNER_SPAWN: &str = "runner/spawn";
pub const RUNNER_TIMEOUT: &str = "runner/timeout";
pub const RUNNER_FAILED: &str = "runner/failed";
pub const RUNNER_MISSING_REPORT: &str = "runner/missing-report";
pub const RUNNER_CANCELLED: &str = "runner/cancelled";

pub const CI_AUTH: &str = "ci/auth";
pub const CI_RATE_LIMITED: &str = "ci/rate-limited";
pub const CI_STATUS: &str = "ci/status";
pub const CI_TRANSPORT: &str = "ci/transport";
pub const CI_ARCHIVE: &str = "ci/archive";

pub const CONFIG_IO: &str = "config/io";
pub const CONFIG_SYNTAX: &str = "config/syntax";
pub const CONFIG_INVALID: &str = "config/invalid";

pub const WORKSPACE_LOCKED: &str = "workspace/locked";
pub const WORKSPACE_IO: &str = "workspace/io";

/// Trait implemented by every error enum in the taxonomy.
pub trait ArgosErrorCode {
    /// The stable machine code for this error.
    fn error_code(&self) -> &'static str;
}
