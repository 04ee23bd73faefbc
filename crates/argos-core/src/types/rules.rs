//! Execution rules: named, declarative predicates over history that select
//! a set of entities to run next.

use std::fmt;
use std::str::FromStr;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use super::entity::EntityType;

/// Placeholder expanded in rule groups with the caller-supplied changed-file
/// list at evaluation time.
pub const CHANGED_FILES_PLACEHOLDER: &str = "${CHANGED_FILES}";

/// Closed set of rule criteria. New criteria are added by extending this
/// enum and the selection match in the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleCriteria {
    All,
    Group,
    FailedInLast,
    FailureRate,
    ChangedFiles,
    Marker,
    Pattern,
}

impl RuleCriteria {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCriteria::All => "all",
            RuleCriteria::Group => "group",
            RuleCriteria::FailedInLast => "failed-in-last",
            RuleCriteria::FailureRate => "failure-rate",
            RuleCriteria::ChangedFiles => "changed-files",
            RuleCriteria::Marker => "marker",
            RuleCriteria::Pattern => "pattern",
        }
    }
}

impl fmt::Display for RuleCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleCriteria {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(RuleCriteria::All),
            "group" => Ok(RuleCriteria::Group),
            "failed-in-last" => Ok(RuleCriteria::FailedInLast),
            "failure-rate" => Ok(RuleCriteria::FailureRate),
            "changed-files" => Ok(RuleCriteria::ChangedFiles),
            "marker" => Ok(RuleCriteria::Marker),
            "pattern" => Ok(RuleCriteria::Pattern),
            other => Err(format!("unknown rule criteria: {other}")),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_window() -> u32 {
    1
}

/// A named execution rule, user-mutable via the rules file or the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRule {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub criteria: RuleCriteria,
    /// Count of most-recent history rows considered. Minimum 1.
    #[serde(default = "default_window")]
    pub window: u32,
    /// Failure-rate threshold in `0.0..=1.0`. Only meaningful for
    /// `failure-rate` rules.
    #[serde(default)]
    pub threshold: f64,
    /// Glob patterns narrowing the selection. `**` crosses path separators.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Executor configuration forwarded opaquely to the runner adapter
    /// (markers, extra args).
    #[serde(default)]
    pub executor: serde_json::Value,
    /// Entity kind this rule selects. Defaults to tests.
    #[serde(default = "default_entity_type")]
    pub entity_type: EntityType,
}

fn default_entity_type() -> EntityType {
    EntityType::Test
}

impl ExecutionRule {
    /// Validate rule bounds: window ≥ 1, threshold in `0.0..=1.0`,
    /// non-empty name.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("rule name must not be empty".to_string());
        }
        if self.window < 1 {
            return Err(format!("rule {}: window must be >= 1", self.name));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(format!(
                "rule {}: threshold must be within 0.0..=1.0, got {}",
                self.name, self.threshold
            ));
        }
        Ok(())
    }

    /// Expand `${CHANGED_FILES}` in this rule's groups against the
    /// caller-supplied changed-file set.
    pub fn expanded_groups(&self, changed_files: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            if group == CHANGED_FILES_PLACEHOLDER {
                out.extend(changed_files.iter().cloned());
            } else {
                out.push(group.clone());
            }
        }
        out
    }
}

/// Match an entity id or its derived file path against a set of glob
/// patterns. `**` matches across path separators.
pub fn matches_any_group(candidate: &str, groups: &[String]) -> bool {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    groups.iter().any(|g| {
        Pattern::new(g)
            .map(|p| p.matches_with(candidate, options))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(criteria: RuleCriteria) -> ExecutionRule {
        ExecutionRule {
            name: "r".to_string(),
            enabled: true,
            criteria,
            window: 3,
            threshold: 0.5,
            groups: vec![],
            executor: serde_json::Value::Null,
            entity_type: EntityType::Test,
        }
    }

    #[test]
    fn criteria_round_trips_kebab_case() {
        assert_eq!("failed-in-last".parse::<RuleCriteria>().unwrap(), RuleCriteria::FailedInLast);
        assert_eq!(RuleCriteria::FailureRate.as_str(), "failure-rate");
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let mut r = rule(RuleCriteria::FailureRate);
        r.threshold = 1.5;
        assert!(r.validate().is_err());
    }

    #[test]
    fn changed_files_placeholder_expands() {
        let mut r = rule(RuleCriteria::ChangedFiles);
        r.groups = vec!["src/core/**".to_string(), CHANGED_FILES_PLACEHOLDER.to_string()];
        let expanded = r.expanded_groups(&["src/api/views.py".to_string()]);
        assert_eq!(expanded, vec!["src/core/**", "src/api/views.py"]);
    }

    #[test]
    fn group_globs_cross_separators() {
        let groups = vec!["tests/**".to_string()];
        assert!(matches_any_group("tests/unit/test_db.py::test_open", &groups));
        assert!(!matches_any_group("src/db.py", &groups));
    }

    #[test]
    fn rule_deserializes_with_defaults() {
        let yaml = "name: nightly\ncriteria: all\n";
        let r: ExecutionRule = serde_yaml::from_str(yaml).unwrap();
        assert!(r.enabled);
        assert_eq!(r.window, 1);
        assert_eq!(r.entity_type, EntityType::Test);
    }
}
