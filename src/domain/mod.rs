//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - group types and operating-point time series (`GroupType`, `UnitSeries`, `GroupTable`)
//! - fit rows and tables (`CurveFit`, `FitTable`)
//! - per-operation configuration (`FilterConfig`, `FitConfig`, `RejectConfig`)

pub mod config;
pub mod fit;
pub mod types;

pub use config::*;
pub use fit::*;
pub use types::*;
