//! Lint output parsers.
//!
//! Each validator is a closed variant; dispatch is a match returning the
//! typed handler. Every parser produces a summary whose by_code histogram
//! is exactly the multiset of codes among its violations.

mod black;
mod flake8;
mod isort;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use argos_core::errors::ParseError;
use argos_core::types::entity::Severity;

/// Supported lint validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Validator {
    Flake8,
    Black,
    Isort,
}

impl Validator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Validator::Flake8 => "flake8",
            Validator::Black => "black",
            Validator::Isort => "isort",
        }
    }

    /// Parse this validator's stdout into violations plus a summary.
    pub fn parse_output(&self, input: &str) -> Result<ParsedLint, ParseError> {
        let violations = match self {
            Validator::Flake8 => flake8::parse(input),
            Validator::Black => black::parse(input),
            Validator::Isort => isort::parse(input),
        }?;
        Ok(ParsedLint {
            summary: build_summary(*self, &violations),
            violations,
        })
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Validator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flake8" => Ok(Validator::Flake8),
            "black" => Ok(Validator::Black),
            "isort" => Ok(Validator::Isort),
            other => Err(format!("unknown validator: {other}")),
        }
    }
}

/// One parsed violation.
#[derive(Debug, Clone, PartialEq)]
pub struct LintViolationData {
    pub file_path: String,
    pub line: u32,
    pub column: Option<u32>,
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

/// Aggregate over one validator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LintSummaryData {
    pub validator: Validator,
    pub files_scanned: u64,
    pub total_violations: u64,
    pub errors: u64,
    pub warnings: u64,
    pub info: u64,
    /// code -> occurrence count; ordered for deterministic serialization.
    pub by_code: BTreeMap<String, u64>,
}

/// Violations plus their summary for one validator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLint {
    pub summary: LintSummaryData,
    pub violations: Vec<LintViolationData>,
}

/// Build the summary from a violation list. This is the only constructor,
/// so errors + warnings + info always equals total_violations and by_code
/// mirrors the violations exactly.
pub fn build_summary(validator: Validator, violations: &[LintViolationData]) -> LintSummaryData {
    let mut by_code: BTreeMap<String, u64> = BTreeMap::new();
    let mut files: BTreeMap<&str, ()> = BTreeMap::new();
    let (mut errors, mut warnings, mut info) = (0u64, 0u64, 0u64);

    for v in violations {
        *by_code.entry(v.code.clone()).or_insert(0) += 1;
        files.entry(v.file_path.as_str()).or_insert(());
        match v.severity {
            Severity::Error => errors += 1,
            Severity::Warning => warnings += 1,
            Severity::Info => info += 1,
        }
    }

    LintSummaryData {
        validator,
        files_scanned: files.len() as u64,
        total_violations: violations.len() as u64,
        errors,
        warnings,
        info,
        by_code,
    }
}

/// Normalize a tool-reported path to project-relative with forward
/// slashes.
pub(crate) fn normalize_path(raw: &str) -> String {
    let slashed = raw.replace('\\', "/");
    let trimmed = slashed.strip_prefix("./").unwrap_or(&slashed);
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_round_trips() {
        assert_eq!("flake8".parse::<Validator>().unwrap(), Validator::Flake8);
        assert!("pylint".parse::<Validator>().is_err());
    }

    #[test]
    fn summary_matches_violations() {
        let violations = vec![
            LintViolationData {
                file_path: "src/x.py".to_string(),
                line: 10,
                column: Some(5),
                severity: Severity::Error,
                code: "E501".to_string(),
                message: "line too long".to_string(),
            },
            LintViolationData {
                file_path: "src/x.py".to_string(),
                line: 11,
                column: Some(1),
                severity: Severity::Warning,
                code: "W503".to_string(),
                message: "break before operator".to_string(),
            },
        ];
        let summary = build_summary(Validator::Flake8, &violations);
        assert_eq!(summary.total_violations, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.info, 0);
        assert_eq!(summary.files_scanned, 1);
        assert_eq!(summary.by_code.get("E501"), Some(&1));
        assert_eq!(summary.by_code.get("W503"), Some(&1));
    }

    #[test]
    fn paths_normalize_to_forward_slashes() {
        assert_eq!(normalize_path("./src/x.py"), "src/x.py");
        assert_eq!(normalize_path("src\\pkg\\y.py"), "src/pkg/y.py");
    }
}
