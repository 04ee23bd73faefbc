//! Test-runner adapter.
//!
//! Spawns the configured runner (pytest-shaped) with the selected
//! entities, streams its output lines to an optional sink, and enforces a
//! wall-clock ceiling on top of the runner's own per-entity timeout.
//! A nonzero exit WITH a report is a successful execution that produced
//! FAILED rows, not an error.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use argos_core::errors::RunnerError;

/// Options for one runner invocation.
#[derive(Debug, Clone)]
pub struct TestRunnerOptions {
    /// Runner argv. Empty means the built-in pytest default.
    pub command: Vec<String>,
    /// Working directory of the project under test.
    pub workdir: PathBuf,
    /// Where the runner must write its JSON report.
    pub report_path: PathBuf,
    /// Coverage XML target; enables coverage when set.
    pub coverage_path: Option<PathBuf>,
    /// Per-entity timeout forwarded to the runner. Default 300.
    pub timeout_secs: u64,
    /// Hard ceiling for the whole invocation.
    pub wall_clock_secs: u64,
    /// Marker expression forwarded from marker rules.
    pub marker: Option<String>,
    /// Test-name pattern forwarded from pattern rules.
    pub pattern: Option<String>,
}

impl TestRunnerOptions {
    pub fn new(workdir: PathBuf, report_path: PathBuf) -> Self {
        Self {
            command: Vec::new(),
            workdir,
            report_path,
            coverage_path: None,
            timeout_secs: 300,
            wall_clock_secs: 3_600,
            marker: None,
            pattern: None,
        }
    }

    fn argv(&self, entities: &[String]) -> Vec<String> {
        let mut argv: Vec<String> = if self.command.is_empty() {
            vec!["python".into(), "-m".into(), "pytest".into()]
        } else {
            self.command.clone()
        };

        argv.extend(entities.iter().cloned());
        argv.push("--json-report".into());
        argv.push(format!(
            "--json-report-file={}",
            self.report_path.display()
        ));
        argv.push(format!("--timeout={}", self.timeout_secs));
        if let Some(marker) = &self.marker {
            argv.push("-m".into());
            argv.push(marker.clone());
        }
        if let Some(pattern) = &self.pattern {
            argv.push("-k".into());
            argv.push(pattern.clone());
        }
        if let Some(coverage_path) = &self.coverage_path {
            argv.push("--cov".into());
            argv.push("--cov-report".into());
            argv.push(format!("xml:{}", coverage_path.display()));
        }
        argv
    }
}

/// What the runner produced.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub report_path: PathBuf,
    pub coverage_path: Option<PathBuf>,
    pub exit_code: i32,
}

/// Run the selected entities. Output lines stream to `sink` when given;
/// flipping `cancel` to true terminates the process group.
pub async fn run(
    entities: &[String],
    options: &TestRunnerOptions,
    sink: Option<mpsc::Sender<String>>,
    mut cancel: watch::Receiver<bool>,
) -> Result<RunArtifacts, RunnerError> {
    let argv = options.argv(entities);
    debug!(?argv, "spawning test runner");

    let mut child = Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(&options.workdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RunnerError::Spawn {
            message: format!("{}: {e}", argv[0]),
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Forward both streams line-by-line; stderr is also kept for error
    // reporting.
    let sink_out = sink.clone();
    let stdout_task = tokio::spawn(async move {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(sink) = &sink_out {
                    let _ = sink.send(line).await;
                }
            }
        }
    });
    let stderr_task = tokio::spawn(async move {
        let mut collected = String::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(sink) = &sink {
                    let _ = sink.send(line.clone()).await;
                }
                if collected.len() < 4_096 {
                    collected.push_str(&line);
                    collected.push('\n');
                }
            }
        }
        collected
    });

    let wall_clock = Duration::from_secs(options.wall_clock_secs);
    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| RunnerError::Spawn {
            message: format!("wait: {e}"),
        })?,
        _ = tokio::time::sleep(wall_clock) => {
            warn!(secs = options.wall_clock_secs, "runner hit wall clock, killing");
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(RunnerError::Timeout { seconds: options.wall_clock_secs });
        }
        _ = wait_for_cancel(&mut cancel) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(RunnerError::Cancelled);
        }
    };

    let _ = stdout_task.await;
    let stderr_excerpt = stderr_task.await.unwrap_or_default();

    let exit_code = status.code().unwrap_or(-1);
    let report_exists = options.report_path.exists();

    // pytest: 0 = all passed, 1 = failures, 5 = no tests collected. All
    // are valid executions as long as the report landed.
    if !report_exists {
        if exit_code == 0 {
            return Err(RunnerError::MissingReport {
                path: options.report_path.display().to_string(),
            });
        }
        return Err(RunnerError::Failed {
            exit_code,
            stderr_excerpt: truncate(&stderr_excerpt, 1_024),
        });
    }

    if !matches!(exit_code, 0 | 1 | 5) {
        return Err(RunnerError::Failed {
            exit_code,
            stderr_excerpt: truncate(&stderr_excerpt, 1_024),
        });
    }

    Ok(RunArtifacts {
        report_path: options.report_path.clone(),
        coverage_path: options.coverage_path.clone(),
        exit_code,
    })
}

async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone; nobody can cancel any more.
            std::future::pending::<()>().await;
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_includes_selection_and_report() {
        let opts = TestRunnerOptions::new(PathBuf::from("."), PathBuf::from("/tmp/report.json"));
        let argv = opts.argv(&["tests/a.py::t1".to_string()]);
        assert_eq!(&argv[..3], &["python", "-m", "pytest"]);
        assert!(argv.contains(&"tests/a.py::t1".to_string()));
        assert!(argv.contains(&"--json-report".to_string()));
        assert!(argv.iter().any(|a| a.starts_with("--json-report-file=")));
        assert!(argv.contains(&"--timeout=300".to_string()));
    }

    #[test]
    fn argv_forwards_marker_and_coverage() {
        let mut opts =
            TestRunnerOptions::new(PathBuf::from("."), PathBuf::from("/tmp/report.json"));
        opts.marker = Some("slow".to_string());
        opts.coverage_path = Some(PathBuf::from("/tmp/cov.xml"));
        let argv = opts.argv(&[]);
        let m = argv.iter().position(|a| a == "-m").unwrap();
        assert_eq!(argv[m + 1], "slow");
        assert!(argv.contains(&"--cov".to_string()));
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let mut opts = TestRunnerOptions::new(
            std::env::temp_dir(),
            std::env::temp_dir().join("argos-no-report.json"),
        );
        opts.command = vec!["argos-definitely-not-a-binary".to_string()];
        let (_tx, rx) = watch::channel(false);
        let err = run(&[], &opts, None, rx).await.unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }
}
