//! `argos rules`: list, add, update, delete execution rules.

use clap::{Args, Subcommand};

use argos_core::ids;
use argos_core::types::entity::EntityType;
use argos_core::types::rules::{ExecutionRule, RuleCriteria};

use crate::context::{op_err, CliContext};

#[derive(Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Subcommand)]
pub enum RulesCommand {
    /// List stored rules.
    List {
        #[arg(long)]
        enabled_only: bool,
    },
    /// Add or replace a rule.
    Add(RuleSpec),
    /// Update an existing rule (same fields as add).
    Update(RuleSpec),
    /// Delete a rule by name.
    Delete { name: String },
}

#[derive(Args)]
pub struct RuleSpec {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub criteria: RuleCriteria,
    #[arg(long, default_value_t = 1)]
    pub window: u32,
    #[arg(long, default_value_t = 0.0)]
    pub threshold: f64,
    /// Glob pattern narrowing the selection. Repeatable.
    #[arg(long = "group")]
    pub groups: Vec<String>,
    #[arg(long, default_value_t = true)]
    pub enabled: bool,
    /// Marker expression forwarded to the runner.
    #[arg(long)]
    pub marker: Option<String>,
    /// Test-name pattern forwarded to the runner.
    #[arg(long)]
    pub pattern: Option<String>,
}

impl RuleSpec {
    fn into_rule(self) -> ExecutionRule {
        let mut executor = serde_json::Map::new();
        if let Some(marker) = self.marker {
            executor.insert("marker".to_string(), serde_json::Value::from(marker));
        }
        if let Some(pattern) = self.pattern {
            executor.insert("pattern".to_string(), serde_json::Value::from(pattern));
        }
        ExecutionRule {
            name: self.name,
            enabled: self.enabled,
            criteria: self.criteria,
            window: self.window,
            threshold: self.threshold,
            groups: self.groups,
            executor: if executor.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::Value::Object(executor)
            },
            entity_type: EntityType::Test,
        }
    }
}

pub fn run(ctx: &CliContext, args: RulesArgs) -> anyhow::Result<u8> {
    match args.command {
        RulesCommand::List { enabled_only } => {
            let rules = ctx.store.list_execution_rules(enabled_only).map_err(op_err)?;
            if rules.is_empty() {
                println!("no rules");
                return Ok(0);
            }
            for rule in rules {
                println!(
                    "{}\t{}\twindow={} threshold={} groups={:?}{}",
                    rule.name,
                    rule.criteria,
                    rule.window,
                    rule.threshold,
                    rule.groups,
                    if rule.enabled { "" } else { "\t(disabled)" },
                );
            }
            Ok(0)
        }
        RulesCommand::Add(spec) | RulesCommand::Update(spec) => {
            let rule = spec.into_rule();
            rule.validate()
                .map_err(|e| anyhow::anyhow!("config/invalid: {e}"))?;
            ctx.store
                .upsert_execution_rule(&rule, ids::now_unix())
                .map_err(op_err)?;
            println!("stored rule {}", rule.name);
            Ok(0)
        }
        RulesCommand::Delete { name } => {
            if ctx.store.delete_execution_rule(&name).map_err(op_err)? {
                println!("deleted rule {name}");
                Ok(0)
            } else {
                anyhow::bail!("store/not-found: rule {name} not found");
            }
        }
    }
}
