//! `argos execute --rule NAME`: rule-driven selective execution.

use std::sync::Arc;

use clap::Args;
use tokio::sync::{broadcast, watch, Semaphore};

use argos_core::errors::RunnerError;
use argos_engine::execution::{run_rule_execution, ExecutionEnv, ExecutionRequest};
use argos_engine::EngineError;

use crate::context::{op_err, CliContext};

#[derive(Args)]
pub struct ExecuteArgs {
    /// Rule to evaluate.
    #[arg(long)]
    pub rule: String,

    /// Execution id override (defaults to a fresh local id).
    #[arg(long)]
    pub execution_id: Option<String>,

    /// Changed files for `${CHANGED_FILES}` expansion. Repeatable.
    #[arg(long = "changed-file")]
    pub changed_files: Vec<String>,

    /// Collect coverage during the run.
    #[arg(long)]
    pub coverage: bool,
}

pub async fn run(ctx: &CliContext, args: ExecuteArgs, verbose: bool) -> anyhow::Result<u8> {
    let slots = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let report_dir = ctx.workspace.dir().join("reports");
    tokio::fs::create_dir_all(&report_dir).await?;

    let env = ExecutionEnv {
        store: Arc::clone(&ctx.store),
        workdir: ctx.workspace.project_root().to_path_buf(),
        report_dir,
        runner_command: ctx.config.test.command.clone(),
        timeout_secs: ctx.config.test.effective_timeout_secs(),
        pool: Arc::new(Semaphore::new(slots)),
    };

    let execution_id = args
        .execution_id
        .unwrap_or_else(|| argos_core::ids::ExecutionIdGenerator::new().next());
    let request = ExecutionRequest {
        rule_name: args.rule,
        execution_id,
        changed_files: args.changed_files,
        coverage: args.coverage,
    };

    let (progress_tx, mut progress_rx) =
        broadcast::channel::<argos_engine::execution::ProgressEvent>(256);
    let printer = tokio::spawn(async move {
        while let Ok(event) = progress_rx.recv().await {
            if verbose {
                let entity = event.current_entity.as_deref().unwrap_or("");
                eprintln!(
                    "[{:>3}%] {:?} {} (ran {} passed {} failed {})",
                    event.percent,
                    event.stage,
                    entity,
                    event.stats.ran,
                    event.stats.passed,
                    event.stats.failed,
                );
            }
            if event.stage.is_terminal() {
                break;
            }
        }
    });

    // Ctrl-C cancels: the runner is killed and nothing is committed.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let result = run_rule_execution(env, request, progress_tx, cancel_rx).await;
    let _ = printer.await;

    match result {
        Ok(summary) => {
            println!(
                "{}: selected {} ran {} passed {} failed {} skipped {} errors {} in {:.2}s",
                summary.execution_id,
                summary.selected,
                summary.ran,
                summary.passed,
                summary.failed,
                summary.skipped,
                summary.errors,
                summary.duration_seconds,
            );
            if let Some(coverage) = summary.coverage_percent {
                println!("coverage: {coverage:.2}%");
            }
            Ok(if summary.failed + summary.errors > 0 { 1 } else { 0 })
        }
        Err(EngineError::Runner(RunnerError::Cancelled)) => {
            eprintln!("execution cancelled");
            Ok(2)
        }
        Err(e) => Err(op_err(e)),
    }
}
