//! `argos report`: render a report to stdout or a file.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use argos_server::reports::{self, assemble, ReportFormat};

use crate::context::{op_err, CliContext};

#[derive(Args)]
pub struct ReportArgs {
    #[command(subcommand)]
    pub command: ReportCommand,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Html,
    Markdown,
}

impl From<Format> for ReportFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Html => ReportFormat::Html,
            Format::Markdown => ReportFormat::Markdown,
        }
    }
}

#[derive(Args)]
pub struct CommonReportArgs {
    #[arg(long, value_enum, default_value = "html")]
    pub format: Format,
    /// Write to this path instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum ReportCommand {
    /// Test-execution report.
    Test {
        #[command(flatten)]
        common: CommonReportArgs,
        #[arg(long, default_value_t = 0.3)]
        threshold: f64,
        #[arg(long, default_value_t = 10)]
        window: usize,
    },
    /// Coverage report, optionally with regressions against a baseline
    /// execution.
    Coverage {
        #[command(flatten)]
        common: CommonReportArgs,
        #[arg(long)]
        baseline: Option<String>,
        #[arg(long, default_value_t = 1.0)]
        threshold: f64,
    },
    /// Code-quality report.
    Quality {
        #[command(flatten)]
        common: CommonReportArgs,
    },
}

fn emit(common: &CommonReportArgs, content: String) -> anyhow::Result<u8> {
    match &common.output {
        Some(path) => {
            std::fs::write(path, content)?;
            println!("wrote {}", path.display());
        }
        None => print!("{content}"),
    }
    Ok(0)
}

pub fn run(ctx: &CliContext, args: ReportArgs) -> anyhow::Result<u8> {
    let project = &ctx.config.project.name;
    match args.command {
        ReportCommand::Test {
            common,
            threshold,
            window,
        } => {
            let input =
                assemble::test_report_input(&ctx.store, project, threshold, window).map_err(op_err)?;
            let content = match common.format.into() {
                ReportFormat::Html => reports::render_test_html(&input),
                ReportFormat::Markdown => reports::render_test_markdown(&input),
            };
            emit(&common, content)
        }
        ReportCommand::Coverage {
            common,
            baseline,
            threshold,
        } => {
            let input = assemble::coverage_report_input(
                &ctx.store,
                project,
                baseline.as_deref(),
                threshold,
            )
            .map_err(op_err)?;
            let content = match common.format.into() {
                ReportFormat::Html => reports::render_coverage_html(&input),
                ReportFormat::Markdown => reports::render_coverage_markdown(&input),
            };
            emit(&common, content)
        }
        ReportCommand::Quality { common } => {
            let input = assemble::quality_report_input(&ctx.store, project).map_err(op_err)?;
            let content = match common.format.into() {
                ReportFormat::Html => reports::render_quality_html(&input),
                ReportFormat::Markdown => reports::render_quality_markdown(&input),
            };
            emit(&common, content)
        }
    }
}
