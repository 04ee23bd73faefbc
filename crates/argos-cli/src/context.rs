//! Shared CLI context: config, workspace, and an open store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use argos_core::config::ArgosConfig;
use argos_core::errors::error_code::ArgosErrorCode;
use argos_core::ids;
use argos_core::workspace::AnvilWorkspace;
use argos_storage::ArgosStorageEngine;

/// Wrap a taxonomy error as `code: sentence` for stderr.
pub fn op_err<E>(e: E) -> anyhow::Error
where
    E: ArgosErrorCode + std::fmt::Display,
{
    anyhow::anyhow!("{}: {}", e.error_code(), e)
}

pub struct CliContext {
    pub config: ArgosConfig,
    pub workspace: AnvilWorkspace,
    pub store: Arc<ArgosStorageEngine>,
}

impl CliContext {
    /// Open config, workspace, and store, then sync the config-file rules
    /// into the store so `execute --rule` sees them.
    pub fn open(
        project_root: Option<PathBuf>,
        database: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let root = match project_root {
            Some(root) => root,
            None => std::env::current_dir().context("cannot determine working directory")?,
        };

        let config = ArgosConfig::load_or_default(&root).map_err(op_err)?;
        let workspace = AnvilWorkspace::open(&root).map_err(op_err)?;

        let db_path = database.unwrap_or_else(|| config.database_path(&root));
        let store = ArgosStorageEngine::open(&db_path).map_err(op_err)?;

        let now = ids::now_unix();
        for rule in &config.rules {
            store.upsert_execution_rule(rule, now).map_err(op_err)?;
        }

        Ok(Self {
            config,
            workspace,
            store: Arc::new(store),
        })
    }
}
