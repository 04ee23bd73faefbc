//! YAML project configuration (`argos.yml`).
//!
//! All sections are optional; defaults come from `#[serde(default)]` plus
//! the `effective_*` accessors. Environment overrides: `ARGOS_DB_PATH` for
//! the database location, the env var named by `ci.token_env` for the
//! provider token.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::types::rules::ExecutionRule;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ArgosConfig {
    pub project: ProjectConfig,
    pub validators: ValidatorsConfig,
    pub test: TestConfig,
    pub history: HistoryConfig,
    #[serde(default)]
    pub rules: Vec<ExecutionRule>,
    pub ci: CiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ValidatorsConfig {
    /// Validator names to run (e.g. "flake8", "black", "isort").
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TestConfig {
    /// Globs selecting test files.
    pub patterns: Vec<String>,
    /// Runner invocation (argv). Empty = built-in pytest-shaped default.
    pub command: Vec<String>,
    /// Per-entity timeout in seconds. Default 300.
    pub timeout_secs: Option<u64>,
}

impl TestConfig {
    pub fn effective_timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(300)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HistoryConfig {
    /// History tracking toggle. Default true.
    pub enabled: Option<bool>,
    /// Database path. Default `.anvil/history.db` under the project root.
    pub database: Option<PathBuf>,
    /// Retention window for execution history in days. Default 90.
    pub retention_days: Option<u32>,
}

impl HistoryConfig {
    pub fn effective_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn effective_retention_days(&self) -> u32 {
        self.retention_days.unwrap_or(90)
    }
}

/// Supported CI providers. Currently a single variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CiProvider {
    #[default]
    GithubActions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CiConfig {
    pub provider: CiProvider,
    /// Name of the env var holding the bearer token.
    pub token_env: String,
    /// `owner/repo` slug.
    pub repository: Option<String>,
    /// Override for the provider API base URL (tests, GHES).
    pub api_url: Option<String>,
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            provider: CiProvider::GithubActions,
            token_env: "GITHUB_TOKEN".to_string(),
            repository: None,
            api_url: None,
        }
    }
}

impl ArgosConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ArgosConfig =
            serde_yaml::from_str(&text).map_err(|e| ConfigError::Syntax {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `argos.yml` from the project root if present, else defaults.
    pub fn load_or_default(project_root: &Path) -> Result<Self, ConfigError> {
        let path = project_root.join("argos.yml");
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for rule in &self.rules {
            rule.validate().map_err(|message| ConfigError::Invalid {
                field: format!("rules.{}", rule.name),
                message,
            })?;
        }
        if let Some(days) = self.history.retention_days {
            if days == 0 {
                return Err(ConfigError::Invalid {
                    field: "history.retention_days".to_string(),
                    message: "must be >= 1".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resolve the database path: config value, then `ARGOS_DB_PATH`, then
    /// `.anvil/history.db` under the project root.
    pub fn database_path(&self, project_root: &Path) -> PathBuf {
        if let Some(db) = &self.history.database {
            return project_root.join(db);
        }
        if let Ok(env_path) = std::env::var("ARGOS_DB_PATH") {
            if !env_path.is_empty() {
                return PathBuf::from(env_path);
            }
        }
        project_root.join(".anvil").join("history.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = ArgosConfig::default();
        assert!(c.history.effective_enabled());
        assert_eq!(c.history.effective_retention_days(), 90);
        assert_eq!(c.test.effective_timeout_secs(), 300);
        assert_eq!(c.ci.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn parses_full_config() {
        let yaml = r#"
project:
  name: billing
validators:
  enabled: [flake8, black]
test:
  patterns: ["tests/**"]
history:
  retention_days: 30
rules:
  - name: recent-failures
    criteria: failed-in-last
    window: 5
ci:
  token_env: CI_TOKEN
  repository: acme/billing
"#;
        let c: ArgosConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.project.name, "billing");
        assert_eq!(c.validators.enabled, vec!["flake8", "black"]);
        assert_eq!(c.history.effective_retention_days(), 30);
        assert_eq!(c.rules.len(), 1);
        assert_eq!(c.ci.repository.as_deref(), Some("acme/billing"));
    }

    #[test]
    fn invalid_rule_is_rejected() {
        let yaml = r#"
rules:
  - name: bad
    criteria: failure-rate
    threshold: 2.0
"#;
        let c: ArgosConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(c.validate().is_err());
    }
}
