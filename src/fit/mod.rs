//! Curve fitting.
//!
//! Responsibilities:
//!
//! - fit one (load, heat rate) series to a bounded-degree polynomial (`fitter`)
//! - dispatch per unit / per regime and assemble group fit tables (`unit`)

pub mod fitter;
pub mod unit;

pub use fitter::*;
pub use unit::*;
