//! Argos CLI entry point.
//!
//! Exit codes: 0 success, 1 rule violation / test failure, 2 operational
//! error (store, CI, configuration).

mod commands;
mod context;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "argos", version, about = "Developer observability: test history, lint, coverage, CI")]
struct Cli {
    /// Project root (defaults to the current directory).
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Database path override.
    #[arg(long, global = true, env = "ARGOS_DB_PATH")]
    database: Option<PathBuf>,

    /// Print progress frames while executing.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the entities selected by a rule and ingest the results.
    Execute(commands::execute::ExecuteArgs),
    /// Run the configured lint validators and ingest their output.
    Check(commands::check::CheckArgs),
    /// Manage execution rules.
    Rules(commands::rules::RulesArgs),
    /// Entity statistics and flaky tests.
    Stats(commands::stats::StatsArgs),
    /// Execution history.
    History(commands::history::HistoryArgs),
    /// CI runs: fetch metadata or parse logs into the store.
    Ci(commands::ci::CiArgs),
    /// Render an HTML or Markdown report.
    Report(commands::report::ReportArgs),
    /// Prune execution history beyond the retention window.
    Prune(commands::prune::PruneArgs),
    /// Start the HTTP/WebSocket API.
    Serve(commands::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("ARGOS_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = run(cli).await;
    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let ctx = context::CliContext::open(cli.project_root, cli.database)?;
    match cli.command {
        Command::Execute(args) => commands::execute::run(&ctx, args, cli.verbose).await,
        Command::Check(args) => commands::check::run(&ctx, args).await,
        Command::Rules(args) => commands::rules::run(&ctx, args),
        Command::Stats(args) => commands::stats::run(&ctx, args),
        Command::History(args) => commands::history::run(&ctx, args),
        Command::Ci(args) => commands::ci::run(&ctx, args).await,
        Command::Report(args) => commands::report::run(&ctx, args),
        Command::Prune(args) => commands::prune::run(&ctx, args),
        Command::Serve(args) => commands::serve::run(ctx, args).await,
    }
}
