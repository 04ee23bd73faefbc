//! `argos stats`: rollups and flaky listing.

use clap::{Args, Subcommand};

use argos_engine::stats;

use crate::context::{op_err, CliContext};

#[derive(Args)]
pub struct StatsArgs {
    #[command(subcommand)]
    pub command: StatsCommand,
}

#[derive(Subcommand)]
pub enum StatsCommand {
    /// Show entity rollups.
    Show {
        /// Entity type: test, lint-file, coverage-file, ci-job.
        #[arg(long, default_value = "test")]
        entity_type: String,
        /// Restrict to one entity; windowed figures recompute from
        /// history.
        #[arg(long)]
        entity: Option<String>,
        #[arg(long)]
        window: Option<usize>,
    },
    /// List flaky entities.
    Flaky {
        #[arg(long)]
        threshold: f64,
        #[arg(long, default_value_t = 10)]
        window: usize,
        #[arg(long)]
        space: Option<String>,
    },
}

pub fn run(ctx: &CliContext, args: StatsArgs) -> anyhow::Result<u8> {
    match args.command {
        StatsCommand::Show {
            entity_type,
            entity,
            window,
        } => {
            if let Some(entity_id) = entity {
                let rows = ctx
                    .store
                    .recent_history_for_entity(&entity_id, None, window)
                    .map_err(op_err)?;
                if rows.is_empty() {
                    anyhow::bail!("store/not-found: no history for {entity_id}");
                }
                let s = stats::compute(&entity_id, &rows, window);
                println!(
                    "{}: runs={} passed={} failed={} skipped={} rate={:.2} avg={:.3}s",
                    s.entity_id, s.total_runs, s.passed, s.failed, s.skipped,
                    s.failure_rate, s.avg_duration,
                );
                return Ok(0);
            }

            let rows = ctx.store.list_entity_statistics(&entity_type).map_err(op_err)?;
            if rows.is_empty() {
                println!("no statistics for entity type {entity_type}");
                return Ok(0);
            }
            for s in rows {
                println!(
                    "{}\truns={} passed={} failed={} rate={:.2} avg={:.3}s",
                    s.entity_id, s.total_runs, s.passed, s.failed, s.failure_rate, s.avg_duration,
                );
            }
            Ok(0)
        }
        StatsCommand::Flaky {
            threshold,
            window,
            space,
        } => {
            let rows = ctx
                .store
                .with_reader(|conn| stats::flaky(conn, threshold, window, space.as_deref()))
                .map_err(op_err)?;
            if rows.is_empty() {
                println!("no flaky entities at threshold {threshold}");
                return Ok(0);
            }
            for f in rows {
                println!(
                    "{}\trate={:.2} runs={} failed={}",
                    f.entity_id, f.failure_rate, f.total_runs, f.failed,
                );
            }
            Ok(0)
        }
    }
}
