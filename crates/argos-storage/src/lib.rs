//! # argos-storage
//!
//! SQLite persistence layer for the Argos observability platform.
//! WAL mode, write-serialized + read-pooled, forward-only schema
//! migrations, per-table query modules, retention pruning.

pub mod connection;
pub mod engine;
pub mod migrations;
pub mod queries;
pub mod retention;

pub use connection::DatabaseManager;
pub use engine::ArgosStorageEngine;
