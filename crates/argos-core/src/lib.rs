//! # argos-core
//!
//! Foundation crate for the Argos observability platform.
//! Defines the domain types, error taxonomy, configuration, and
//! `.anvil/` workspace handling. Every other crate in the workspace
//! depends on this.

pub mod config;
pub mod errors;
pub mod ids;
pub mod types;
pub mod workspace;

// Re-export the most commonly used types at the crate root.
pub use config::ArgosConfig;
pub use errors::error_code::ArgosErrorCode;
pub use types::entity::{EntityType, OutcomeStatus, Severity, Space};
pub use types::rules::{ExecutionRule, RuleCriteria};
