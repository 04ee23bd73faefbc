//! Per-table query modules. Each module owns its record type and the SQL
//! touching its table; nothing outside this crate holds a raw `&Connection`.

pub mod ci;
pub mod coverage;
pub mod execution_history;
pub mod lint;
pub mod quality;
pub mod rules;
pub mod statistics;
