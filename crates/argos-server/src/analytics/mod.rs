//! Pure-ish analytics over stored rows: local-vs-CI comparison, platform
//! failure detection, and per-validator quality deltas.

pub mod comparison;
pub mod quality;

pub use comparison::{compare_entity, platform_failures, EntityComparison, PlatformFailure};
pub use quality::{quality_comparison, QualityDelta};
