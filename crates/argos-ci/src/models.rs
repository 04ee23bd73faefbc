//! Provider wire shapes and their store seed conversions.

use chrono::DateTime;
use serde::Deserialize;

use argos_storage::queries::ci::{NewCiWorkflowJob, NewCiWorkflowRun};

#[derive(Debug, Deserialize)]
pub(crate) struct RunsResponse {
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobsResponse {
    #[serde(default)]
    pub jobs: Vec<WorkflowJob>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArtifactsResponse {
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

/// One workflow run as the provider reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub head_branch: Option<String>,
    #[serde(default)]
    pub head_sha: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub run_number: i64,
    #[serde(default)]
    pub run_started_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// One job of a run as the provider reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowJob {
    pub id: i64,
    pub run_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// One uploaded artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub archive_download_url: Option<String>,
    #[serde(default)]
    pub expired: bool,
}

fn parse_ts(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp())
}

impl WorkflowRun {
    /// Store seed for this run. Duration is derived from the started and
    /// updated stamps when both are present.
    pub fn to_seed(&self) -> NewCiWorkflowRun {
        let started_at = parse_ts(self.run_started_at.as_deref());
        let updated_at = parse_ts(self.updated_at.as_deref());
        let duration_seconds = match (started_at, updated_at) {
            (Some(start), Some(end)) if end >= start => Some((end - start) as f64),
            _ => None,
        };
        NewCiWorkflowRun {
            run_id: self.id,
            workflow_name: self.name.clone().unwrap_or_default(),
            branch: self.head_branch.clone().unwrap_or_default(),
            commit_sha: self.head_sha.clone().unwrap_or_default(),
            status: self.status.clone().unwrap_or_default(),
            conclusion: self.conclusion.clone(),
            started_at,
            duration_seconds,
            run_number: self.run_number,
        }
    }
}

impl WorkflowJob {
    /// Runner OS derived from the job labels (`ubuntu-latest`,
    /// `windows-2022`, ...). Falls back to the first label.
    pub fn runner_os(&self) -> Option<String> {
        self.labels
            .iter()
            .find(|l| {
                let l = l.to_ascii_lowercase();
                l.starts_with("ubuntu") || l.starts_with("windows") || l.starts_with("macos")
            })
            .or_else(|| self.labels.first())
            .cloned()
    }

    /// Store seed for this job.
    pub fn to_seed(&self) -> NewCiWorkflowJob {
        NewCiWorkflowJob {
            job_id: self.id,
            run_id: self.run_id,
            job_name: self.name.clone(),
            status: self.status.clone().unwrap_or_default(),
            conclusion: self.conclusion.clone(),
            started_at: parse_ts(self.started_at.as_deref()),
            completed_at: parse_ts(self.completed_at.as_deref()),
            runner_os: self.runner_os(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_seed_derives_duration() {
        let run: WorkflowRun = serde_json::from_str(
            r#"{
                "id": 42, "name": "CI", "head_branch": "main",
                "head_sha": "abc123", "status": "completed",
                "conclusion": "success", "run_number": 7,
                "run_started_at": "2026-01-01T00:00:00Z",
                "updated_at": "2026-01-01T00:05:00Z"
            }"#,
        )
        .unwrap();
        let seed = run.to_seed();
        assert_eq!(seed.run_id, 42);
        assert_eq!(seed.workflow_name, "CI");
        assert_eq!(seed.duration_seconds, Some(300.0));
    }

    #[test]
    fn job_runner_os_prefers_os_label() {
        let job: WorkflowJob = serde_json::from_str(
            r#"{
                "id": 7, "run_id": 42, "name": "tests",
                "labels": ["self-hosted", "ubuntu-latest"]
            }"#,
        )
        .unwrap();
        assert_eq!(job.runner_os().as_deref(), Some("ubuntu-latest"));
    }

    #[test]
    fn job_seed_parses_timestamps() {
        let job: WorkflowJob = serde_json::from_str(
            r#"{
                "id": 7, "run_id": 42, "name": "tests",
                "started_at": "2026-01-01T00:00:00Z",
                "completed_at": "2026-01-01T00:01:00Z",
                "labels": ["windows-latest"]
            }"#,
        )
        .unwrap();
        let seed = job.to_seed();
        assert_eq!(seed.completed_at.unwrap() - seed.started_at.unwrap(), 60);
        assert_eq!(seed.runner_os.as_deref(), Some("windows-latest"));
    }
}
