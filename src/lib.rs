//! `heat-rate-curves` library crate.
//!
//! Turns hourly (load, heat rate) series of generating units into per-unit
//! efficiency curves in three stages: regime filtering, curve fitting and
//! population outlier rejection.
//!
//! The binary (`hrc`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - stores and clusterers can be swapped by embedding callers

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod filter;
pub mod fit;
pub mod io;
pub mod math;
pub mod reject;
pub mod store;
