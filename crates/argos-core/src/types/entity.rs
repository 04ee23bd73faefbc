//! Entity identity, provenance spaces, and outcome statuses.
//!
//! An entity is the atomic unit under observation: a test node id, a source
//! file for lint or coverage, or a CI job. Entities are identified by an
//! opaque `entity_id` string plus an [`EntityType`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Provenance tag of any ingested record. Spaces never mix in a single
/// statistic unless the caller explicitly asks for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    Local,
    Ci,
}

impl Space {
    pub fn as_str(&self) -> &'static str {
        match self {
            Space::Local => "local",
            Space::Ci => "ci",
        }
    }
}

impl fmt::Display for Space {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Space {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Space::Local),
            "ci" => Ok(Space::Ci),
            other => Err(format!("unknown space: {other}")),
        }
    }
}

/// Kind of entity under observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Test,
    LintFile,
    CoverageFile,
    CiJob,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Test => "test",
            EntityType::LintFile => "lint-file",
            EntityType::CoverageFile => "coverage-file",
            EntityType::CiJob => "ci-job",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(EntityType::Test),
            "lint-file" => Ok(EntityType::LintFile),
            "coverage-file" => Ok(EntityType::CoverageFile),
            "ci-job" => Ok(EntityType::CiJob),
            other => Err(format!("unknown entity type: {other}")),
        }
    }
}

/// Outcome of one entity in one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Passed => "PASSED",
            OutcomeStatus::Failed => "FAILED",
            OutcomeStatus::Skipped => "SKIPPED",
            OutcomeStatus::Error => "ERROR",
        }
    }

    /// FAILED and ERROR both count as failures for statistics and rules.
    pub fn is_failure(&self) -> bool {
        matches!(self, OutcomeStatus::Failed | OutcomeStatus::Error)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASSED" => Ok(OutcomeStatus::Passed),
            "FAILED" => Ok(OutcomeStatus::Failed),
            "SKIPPED" => Ok(OutcomeStatus::Skipped),
            "ERROR" => Ok(OutcomeStatus::Error),
            other => Err(format!("unknown outcome status: {other}")),
        }
    }
}

/// Severity of a lint violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ERROR" => Ok(Severity::Error),
            "WARNING" => Ok(Severity::Warning),
            "INFO" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Derive the file path used for grouping from an entity id.
///
/// The substring before the first `::` is the file path; a node id with no
/// `::` separator is its own file path.
pub fn entity_file_path(entity_id: &str) -> &str {
    match entity_id.find("::") {
        Some(idx) => &entity_id[..idx],
        None => entity_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_round_trips() {
        assert_eq!("local".parse::<Space>().unwrap(), Space::Local);
        assert_eq!(Space::Ci.as_str(), "ci");
        assert!("remote".parse::<Space>().is_err());
    }

    #[test]
    fn outcome_failure_classification() {
        assert!(OutcomeStatus::Failed.is_failure());
        assert!(OutcomeStatus::Error.is_failure());
        assert!(!OutcomeStatus::Passed.is_failure());
        assert!(!OutcomeStatus::Skipped.is_failure());
    }

    #[test]
    fn entity_file_path_splits_on_double_colon() {
        assert_eq!(entity_file_path("tests/test_api.py::TestApi::test_get"), "tests/test_api.py");
        assert_eq!(entity_file_path("src/module.py"), "src/module.py");
    }
}
