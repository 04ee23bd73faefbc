//! `argos prune`: retention pruning with rollup recompute.

use clap::Args;

use argos_core::ids;
use argos_engine::stats;

use crate::context::{op_err, CliContext};

#[derive(Args)]
pub struct PruneArgs {
    /// Retention window in days (defaults to history.retention_days).
    #[arg(long)]
    pub days: Option<u32>,
}

pub fn run(ctx: &CliContext, args: PruneArgs) -> anyhow::Result<u8> {
    let days = args
        .days
        .unwrap_or_else(|| ctx.config.history.effective_retention_days());

    let outcome = ctx
        .store
        .prune_execution_history_older_than(days, ids::now_unix())
        .map_err(op_err)?;

    // Rollups of pruned entities are recomputed, never left stale.
    if !outcome.touched_entities.is_empty() {
        ctx.store
            .ingest_transaction(|conn| {
                stats::recompute_entities(conn, &outcome.touched_entities)
            })
            .map_err(op_err)?;
    }

    println!(
        "pruned {} rows older than {} days ({} entities recomputed)",
        outcome.removed,
        days,
        outcome.touched_entities.len(),
    );
    Ok(0)
}
