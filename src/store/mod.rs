//! Group-keyed storage for time series and fit tables.
//!
//! Operations only see these traits; `MemoryStore` backs tests and embedding,
//! the directory stores back the CLI.

pub mod dir;
pub mod memory;

pub use dir::*;
pub use memory::*;

use crate::domain::{FitTable, GroupTable, GroupType};
use crate::error::AppError;

/// Source and sink of per-group time-series tables.
pub trait TimeSeriesStore {
    /// Every group present, sorted.
    fn series_groups(&self) -> Result<Vec<GroupType>, AppError>;

    /// `AppError::MissingGroup` when the group is absent.
    fn read_group(&self, group: &GroupType) -> Result<GroupTable, AppError>;

    /// Replace the stored table for `table.group_type`.
    fn write_group(&mut self, table: &GroupTable) -> Result<(), AppError>;
}

/// Source and sink of per-group fit tables.
pub trait FitStore {
    fn fit_groups(&self) -> Result<Vec<GroupType>, AppError>;

    fn read_fits(&self, group: &GroupType) -> Result<FitTable, AppError>;

    fn write_fits(&mut self, table: &FitTable) -> Result<(), AppError>;
}
