//! Regime filtering.
//!
//! - pluggable clustering capability and strategy map (`cluster`)
//! - per-group orchestration over a worker pool (`regime`)

pub mod cluster;
pub mod regime;

pub use cluster::*;
pub use regime::*;
