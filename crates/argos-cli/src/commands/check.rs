//! `argos check`: run the configured lint validators and ingest their
//! output under one execution id.

use std::str::FromStr;

use clap::Args;
use tracing::warn;

use argos_core::ids::{self, ExecutionIdGenerator};
use argos_engine::ingest::{IngestContext, Ingestor};
use argos_engine::runner::run_validator;
use argos_parsers::lint::{ParsedLint, Validator};

use crate::context::{op_err, CliContext};

#[derive(Args)]
pub struct CheckArgs {
    /// Validators to run (defaults to the configured set).
    #[arg(long = "validator")]
    pub validators: Vec<String>,

    /// Paths to scan (defaults to the project root).
    pub paths: Vec<String>,
}

pub async fn run(ctx: &CliContext, args: CheckArgs) -> anyhow::Result<u8> {
    let names = if args.validators.is_empty() {
        ctx.config.validators.enabled.clone()
    } else {
        args.validators
    };
    if names.is_empty() {
        anyhow::bail!("config/invalid: no validators configured; set validators.enabled in argos.yml");
    }

    let timeout = ctx.config.test.effective_timeout_secs();
    let workdir = ctx.workspace.project_root().to_path_buf();

    let mut parsed: Vec<ParsedLint> = Vec::new();
    for name in &names {
        let validator = match Validator::from_str(name) {
            Ok(validator) => validator,
            Err(e) => {
                warn!("skipping validator: {e}");
                continue;
            }
        };
        let output = run_validator(validator, None, &args.paths, &workdir, timeout)
            .await
            .map_err(op_err)?;
        // Lint batches are best-effort: a validator whose output cannot be
        // parsed is skipped, the rest still ingest.
        match validator.parse_output(&output.stdout) {
            Ok(batch) => parsed.push(batch),
            Err(e) => warn!(validator = %validator, "unparseable output: {e}"),
        }
    }

    let execution_id = ExecutionIdGenerator::new().next();
    let ingest_ctx = IngestContext::local(execution_id.clone(), ids::now_unix());
    let store = std::sync::Arc::clone(&ctx.store);
    let batches = parsed.clone();
    let scanned = args.paths.clone();
    tokio::task::spawn_blocking(move || {
        Ingestor::new(&store).ingest_lint(&batches, &scanned, &ingest_ctx)
    })
    .await?
    .map_err(op_err)?;

    let mut total = 0u64;
    for batch in &parsed {
        println!(
            "{}: {} violations ({} errors, {} warnings, {} info) across {} files",
            batch.summary.validator,
            batch.summary.total_violations,
            batch.summary.errors,
            batch.summary.warnings,
            batch.summary.info,
            batch.summary.files_scanned,
        );
        total += batch.summary.total_violations;
    }
    println!("{execution_id}: {total} total violations");

    Ok(if total > 0 { 1 } else { 0 })
}
