//! Population-level outlier rejection of fitted curves.
//!
//! - population statistics and acceptance band (`stats`)
//! - per-group rejection with the combined-cycle aggregation rule (`rejector`)

pub mod rejector;
pub mod stats;

pub use rejector::*;
pub use stats::*;
