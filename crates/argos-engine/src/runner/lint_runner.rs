//! Lint validator adapter: one subprocess per validator, stdout captured
//! for the matching parser. Nonzero exits are expected when violations
//! exist, so only spawn failures and timeouts are errors.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use argos_core::errors::RunnerError;
use argos_parsers::lint::Validator;

/// Captured output of one validator invocation.
#[derive(Debug, Clone)]
pub struct LintRunOutput {
    pub validator: Validator,
    pub stdout: String,
    pub exit_code: i32,
}

fn default_argv(validator: Validator) -> Vec<String> {
    match validator {
        Validator::Flake8 => vec!["flake8".into()],
        Validator::Black => vec!["black".into(), "--check".into()],
        Validator::Isort => vec!["isort".into(), "--check-only".into()],
    }
}

/// Run one validator over `paths` (project root when empty).
pub async fn run_validator(
    validator: Validator,
    command: Option<&[String]>,
    paths: &[String],
    workdir: &Path,
    timeout_secs: u64,
) -> Result<LintRunOutput, RunnerError> {
    let mut argv = match command {
        Some(argv) if !argv.is_empty() => argv.to_vec(),
        _ => default_argv(validator),
    };
    if paths.is_empty() {
        argv.push(".".into());
    } else {
        argv.extend(paths.iter().cloned());
    }

    debug!(validator = %validator, ?argv, "spawning validator");

    let child = Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(workdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| RunnerError::Spawn {
            message: format!("{}: {e}", argv[0]),
        })?;

    let output = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        child.wait_with_output(),
    )
    .await
    .map_err(|_| RunnerError::Timeout {
        seconds: timeout_secs,
    })?
    .map_err(|e| RunnerError::Spawn {
        message: format!("wait: {e}"),
    })?;

    // black and isort report on stderr in some versions; give the parser
    // both streams.
    let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        stdout.push('\n');
        stdout.push_str(&stderr);
    }

    Ok(LintRunOutput {
        validator,
        stdout,
        exit_code: output.status.code().unwrap_or(-1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_of_custom_command() {
        let command = vec!["echo".to_string(), "would reformat src/a.py".to_string()];
        let out = run_validator(
            Validator::Black,
            Some(&command),
            &[],
            Path::new("."),
            30,
        )
        .await
        .unwrap();
        assert!(out.stdout.contains("would reformat src/a.py"));
        assert_eq!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let command = vec!["argos-not-a-validator".to_string()];
        let err = run_validator(Validator::Flake8, Some(&command), &[], Path::new("."), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }
}
