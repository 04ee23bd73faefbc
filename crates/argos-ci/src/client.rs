//! The provider REST client.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Response, StatusCode};
use tracing::{debug, warn};

use argos_core::errors::CiError;

use crate::artifacts::{self, ArtifactFile};
use crate::backoff;
use crate::models::{ArtifactsResponse, JobsResponse, RunsResponse, WorkflowJob, WorkflowRun};

const DEFAULT_API_URL: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PER_PAGE: usize = 100;

/// Client configuration; the token comes from the env var named in the
/// project config and is forwarded as-is.
#[derive(Debug, Clone)]
pub struct CiClientConfig {
    /// `owner/repo` slug.
    pub repository: String,
    pub token: Option<String>,
    /// Base URL override (tests, GHES).
    pub api_url: Option<String>,
}

/// Filter for run listings.
#[derive(Debug, Clone, Default)]
pub struct RunsFilter {
    pub workflow: Option<String>,
    pub branch: Option<String>,
    pub status: Option<String>,
    pub limit: usize,
    /// Only runs started at or after this Unix timestamp.
    pub since: Option<i64>,
}

/// Narrow client over the provider's runs/jobs/logs/artifacts surface.
pub struct CiClient {
    http: reqwest::Client,
    base_url: String,
    repository: String,
}

impl CiClient {
    pub fn new(config: CiClientConfig) -> Result<Self, CiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("argos"));
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                CiError::Transport {
                    message: "token contains invalid header characters".to_string(),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CiError::Transport { message: e.to_string() })?;

        Ok(Self {
            http,
            base_url: config
                .api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            repository: config.repository,
        })
    }

    /// GET with retry. 429 and 5xx retry with backoff; 401/403 surface as
    /// auth failures; other 4xx surface unchanged.
    async fn get(&self, url: &str) -> Result<Response, CiError> {
        for attempt in 1..=backoff::MAX_ATTEMPTS {
            let response = match self.http.get(url).send().await {
                Ok(response) => response,
                Err(e) => {
                    if attempt == backoff::MAX_ATTEMPTS {
                        return Err(CiError::Transport { message: e.to_string() });
                    }
                    warn!(url, attempt, "transport error, retrying: {e}");
                    tokio::time::sleep(backoff::delay_for_attempt(attempt)).await;
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(CiError::Auth { status: status.as_u16() });
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    if attempt == backoff::MAX_ATTEMPTS {
                        return Err(CiError::RateLimited { attempts: attempt });
                    }
                    let delay = retry_after(&response)
                        .unwrap_or_else(|| backoff::delay_for_attempt(attempt));
                    warn!(url, attempt, delay_ms = delay.as_millis() as u64, "rate limited");
                    tokio::time::sleep(delay).await;
                }
                s if s.is_server_error() => {
                    if attempt == backoff::MAX_ATTEMPTS {
                        let body = response.text().await.unwrap_or_default();
                        return Err(CiError::Status { status: s.as_u16(), body: excerpt(&body) });
                    }
                    warn!(url, attempt, status = s.as_u16(), "server error, retrying");
                    tokio::time::sleep(backoff::delay_for_attempt(attempt)).await;
                }
                s => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(CiError::Status { status: s.as_u16(), body: excerpt(&body) });
                }
            }
        }
        Err(CiError::RateLimited { attempts: backoff::MAX_ATTEMPTS })
    }

    /// List workflow runs matching `filter`, paging until `limit` is
    /// satisfied or the results run out.
    pub async fn list_runs(&self, filter: &RunsFilter) -> Result<Vec<WorkflowRun>, CiError> {
        let limit = if filter.limit == 0 { 20 } else { filter.limit };
        let mut runs: Vec<WorkflowRun> = Vec::new();
        let mut page = 1;

        while runs.len() < limit {
            let mut url = format!(
                "{}/repos/{}/actions/runs?per_page={}&page={}",
                self.base_url,
                self.repository,
                PER_PAGE.min(limit.max(1)),
                page
            );
            if let Some(branch) = &filter.branch {
                url.push_str(&format!("&branch={branch}"));
            }
            if let Some(status) = &filter.status {
                url.push_str(&format!("&status={status}"));
            }

            let response = self.get(&url).await?;
            let body: RunsResponse = response.json().await.map_err(|e| CiError::Transport {
                message: format!("decode runs response: {e}"),
            })?;
            if body.workflow_runs.is_empty() {
                break;
            }
            let fetched = body.workflow_runs.len();

            for run in body.workflow_runs {
                if let Some(workflow) = &filter.workflow {
                    if run.name.as_deref() != Some(workflow.as_str()) {
                        continue;
                    }
                }
                if let Some(since) = filter.since {
                    let started = run.to_seed().started_at.unwrap_or(0);
                    if started < since {
                        continue;
                    }
                }
                runs.push(run);
                if runs.len() >= limit {
                    break;
                }
            }

            if fetched < PER_PAGE.min(limit.max(1)) {
                break;
            }
            page += 1;
        }

        debug!(count = runs.len(), "listed workflow runs");
        Ok(runs)
    }

    /// Fetch one run by id.
    pub async fn get_run(&self, run_id: i64) -> Result<WorkflowRun, CiError> {
        let url = format!(
            "{}/repos/{}/actions/runs/{}",
            self.base_url, self.repository, run_id
        );
        let response = self.get(&url).await?;
        response.json().await.map_err(|e| CiError::Transport {
            message: format!("decode run response: {e}"),
        })
    }

    /// List all jobs of one run.
    pub async fn list_jobs(&self, run_id: i64) -> Result<Vec<WorkflowJob>, CiError> {
        let mut jobs: Vec<WorkflowJob> = Vec::new();
        let mut page = 1;

        loop {
            let url = format!(
                "{}/repos/{}/actions/runs/{}/jobs?per_page={}&page={}",
                self.base_url, self.repository, run_id, PER_PAGE, page
            );
            let response = self.get(&url).await?;
            let body: JobsResponse = response.json().await.map_err(|e| CiError::Transport {
                message: format!("decode jobs response: {e}"),
            })?;
            let fetched = body.jobs.len();
            jobs.extend(body.jobs);
            if fetched < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(jobs)
    }

    /// Fetch one job's raw log (the provider redirects to blob storage;
    /// redirects are followed transparently).
    pub async fn fetch_job_log(&self, job_id: i64) -> Result<String, CiError> {
        let url = format!(
            "{}/repos/{}/actions/jobs/{}/logs",
            self.base_url, self.repository, job_id
        );
        let response = self.get(&url).await?;
        response.text().await.map_err(|e| CiError::Transport {
            message: format!("read job log: {e}"),
        })
    }

    /// Download a run's artifacts whose names match `name_pattern` and
    /// return the extracted file contents.
    pub async fn fetch_run_artifacts(
        &self,
        run_id: i64,
        name_pattern: &str,
    ) -> Result<Vec<ArtifactFile>, CiError> {
        let url = format!(
            "{}/repos/{}/actions/runs/{}/artifacts",
            self.base_url, self.repository, run_id
        );
        let response = self.get(&url).await?;
        let body: ArtifactsResponse = response.json().await.map_err(|e| CiError::Transport {
            message: format!("decode artifacts response: {e}"),
        })?;

        let pattern = glob::Pattern::new(name_pattern).map_err(|e| CiError::Archive {
            message: format!("bad artifact pattern {name_pattern}: {e}"),
        })?;

        let mut files = Vec::new();
        for artifact in body.artifacts {
            if artifact.expired || !pattern.matches(&artifact.name) {
                continue;
            }
            let Some(download_url) = &artifact.archive_download_url else {
                continue;
            };
            let response = self.get(download_url).await?;
            let bytes = response.bytes().await.map_err(|e| CiError::Transport {
                message: format!("download artifact {}: {e}", artifact.name),
            })?;
            files.extend(artifacts::extract_matching(&bytes, "*")?);
        }
        Ok(files)
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs.min(60)))
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= 512 {
        trimmed.to_string()
    } else {
        let mut end = 512;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_public_api() {
        let client = CiClient::new(CiClientConfig {
            repository: "acme/billing".to_string(),
            token: None,
            api_url: None,
        })
        .unwrap();
        assert_eq!(client.base_url, DEFAULT_API_URL);
    }

    #[test]
    fn api_url_override_is_trimmed() {
        let client = CiClient::new(CiClientConfig {
            repository: "acme/billing".to_string(),
            token: Some("t0ken".to_string()),
            api_url: Some("http://127.0.0.1:9999/".to_string()),
        })
        .unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn excerpt_truncates() {
        let long = "x".repeat(2_000);
        assert!(excerpt(&long).len() < 600);
    }
}
