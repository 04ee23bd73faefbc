//! Retention pruning for execution history.
//!
//! Deletes are forbidden elsewhere; this is the one sanctioned removal
//! path, and it reports the touched entities so their rollups can be
//! recomputed (not deleted) by the caller.

use rusqlite::Connection;
use tracing::info;

use argos_core::errors::StoreError;

use crate::queries::execution_history;

/// Result of a prune pass.
#[derive(Debug, Clone)]
pub struct PruneOutcome {
    /// Rows removed from execution_history.
    pub removed: usize,
    /// Entities that lost at least one row; their statistics must be
    /// recomputed.
    pub touched_entities: Vec<String>,
}

/// Remove rows older than `cutoff` (Unix seconds) inside the caller's
/// transaction.
pub fn prune(conn: &Connection, cutoff: i64) -> Result<PruneOutcome, StoreError> {
    let touched_entities = execution_history::entities_older_than(conn, cutoff)?;
    let removed = execution_history::delete_older_than(conn, cutoff)?;
    if removed > 0 {
        info!(removed, entities = touched_entities.len(), "pruned execution history");
    }
    Ok(PruneOutcome {
        removed,
        touched_entities,
    })
}
