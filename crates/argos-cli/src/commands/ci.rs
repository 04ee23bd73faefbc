//! `argos ci`: fetch workflow run metadata and parse job logs into the
//! store.

use std::sync::Arc;

use clap::{Args, Subcommand};
use tracing::warn;

use argos_ci::{CiClient, CiClientConfig, RunsFilter};
use argos_engine::ingest::{CiJobData, CiRunData, IngestContext, Ingestor};

use crate::context::{op_err, CliContext};

#[derive(Args)]
pub struct CiArgs {
    #[command(subcommand)]
    pub command: CiCommand,
}

#[derive(Subcommand)]
pub enum CiCommand {
    /// Fetch recent runs and their job metadata.
    Fetch {
        #[arg(long)]
        workflow: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Fetch one run's job logs and ingest the extracted outcomes.
    Parse { run_id: i64 },
}

fn client(ctx: &CliContext) -> anyhow::Result<CiClient> {
    let repository = ctx
        .config
        .ci
        .repository
        .clone()
        .ok_or_else(|| anyhow::anyhow!("config/invalid: ci.repository is not configured"))?;
    let token = std::env::var(&ctx.config.ci.token_env).ok();
    if token.is_none() {
        warn!(
            "no CI token in ${}; unauthenticated requests are heavily rate limited",
            ctx.config.ci.token_env
        );
    }
    CiClient::new(CiClientConfig {
        repository,
        token,
        api_url: ctx.config.ci.api_url.clone(),
    })
    .map_err(op_err)
}

pub async fn run(ctx: &CliContext, args: CiArgs) -> anyhow::Result<u8> {
    match args.command {
        CiCommand::Fetch {
            workflow,
            branch,
            limit,
        } => {
            let client = client(ctx)?;
            let runs = client
                .list_runs(&RunsFilter {
                    workflow,
                    branch,
                    limit,
                    ..RunsFilter::default()
                })
                .await
                .map_err(op_err)?;

            let mut jobs_total = 0usize;
            for run in &runs {
                let jobs = client.list_jobs(run.id).await.map_err(op_err)?;
                jobs_total += jobs.len();
                let data = CiRunData {
                    run: run.to_seed(),
                    jobs: jobs
                        .iter()
                        .map(|job| CiJobData {
                            job: job.to_seed(),
                            log: None,
                        })
                        .collect(),
                };
                let store = Arc::clone(&ctx.store);
                tokio::task::spawn_blocking(move || Ingestor::new(&store).ingest_ci_run(&data))
                    .await?
                    .map_err(op_err)?;
            }
            println!("fetched {} runs, {} jobs", runs.len(), jobs_total);
            Ok(0)
        }
        CiCommand::Parse { run_id } => {
            let client = client(ctx)?;
            let run = client.get_run(run_id).await.map_err(op_err)?;
            let jobs = client.list_jobs(run_id).await.map_err(op_err)?;

            let mut job_data = Vec::with_capacity(jobs.len());
            for job in &jobs {
                let log = if job.conclusion.is_some() {
                    match client.fetch_job_log(job.id).await {
                        Ok(log) => Some(log),
                        Err(e) => {
                            warn!(job_id = job.id, "job log unavailable: {e}");
                            None
                        }
                    }
                } else {
                    None
                };
                job_data.push(CiJobData {
                    job: job.to_seed(),
                    log,
                });
            }

            let run_seed = run.to_seed();
            let run_started = run_seed.started_at;
            let data = CiRunData {
                run: run_seed,
                jobs: job_data,
            };
            let store = Arc::clone(&ctx.store);
            let summary =
                tokio::task::spawn_blocking(move || Ingestor::new(&store).ingest_ci_run(&data))
                    .await?
                    .map_err(op_err)?;

            // Coverage XML uploaded as a workflow artifact feeds the
            // coverage tables under the run-level execution id.
            match client.fetch_run_artifacts(run_id, "*coverage*").await {
                Ok(files) => {
                    for file in files {
                        let cache = ctx.workspace.artifact_cache_path(run_id as u64, &file.name);
                        if let Err(e) = std::fs::write(&cache, &file.content) {
                            warn!("cannot cache artifact {}: {e}", file.name);
                        }
                        if !file.name.ends_with(".xml") {
                            continue;
                        }
                        let text = String::from_utf8_lossy(&file.content).into_owned();
                        match argos_parsers::coverage::parse(&text) {
                            Ok(coverage) => {
                                let total = coverage.total_coverage;
                                let ingest_ctx = IngestContext::ci(
                                    argos_core::ids::ci_execution_id(run_id as u64),
                                    run_started.unwrap_or_else(argos_core::ids::now_unix),
                                );
                                let store = Arc::clone(&ctx.store);
                                tokio::task::spawn_blocking(move || {
                                    Ingestor::new(&store).ingest_coverage(&coverage, &ingest_ctx)
                                })
                                .await?
                                .map_err(op_err)?;
                                println!("ingested coverage artifact {} ({total:.2}%)", file.name);
                            }
                            Err(e) => warn!("artifact {} unusable: {e}", file.name),
                        }
                    }
                }
                Err(e) => warn!("run artifacts unavailable: {e}"),
            }

            println!(
                "run {}: {} jobs, {} history rows, {} failed tests",
                summary.run_id, summary.jobs, summary.history_rows, summary.failed_tests,
            );
            Ok(0)
        }
    }
}
