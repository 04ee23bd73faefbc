//! `argos history show`: raw execution history.

use chrono::{TimeZone, Utc};
use clap::{Args, Subcommand};

use argos_storage::queries::execution_history::HistoryFilter;

use crate::context::{op_err, CliContext};

#[derive(Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommand,
}

#[derive(Subcommand)]
pub enum HistoryCommand {
    /// Show history rows, most recent first.
    Show {
        #[arg(long)]
        entity: Option<String>,
        #[arg(long)]
        execution_id: Option<String>,
        #[arg(long)]
        space: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub fn run(ctx: &CliContext, args: HistoryArgs) -> anyhow::Result<u8> {
    match args.command {
        HistoryCommand::Show {
            entity,
            execution_id,
            space,
            limit,
        } => {
            let rows = ctx
                .store
                .get_execution_history(&HistoryFilter {
                    entity_id: entity,
                    execution_id,
                    space,
                    limit: Some(limit),
                    ..HistoryFilter::default()
                })
                .map_err(op_err)?;
            if rows.is_empty() {
                println!("no history");
                return Ok(0);
            }
            for row in rows {
                let when = Utc
                    .timestamp_opt(row.timestamp, 0)
                    .single()
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| row.timestamp.to_string());
                println!(
                    "{when}\t{}\t{}\t{}\t{:.3}s\t{}",
                    row.space, row.status, row.entity_id, row.duration_seconds, row.execution_id,
                );
            }
            Ok(0)
        }
    }
}
