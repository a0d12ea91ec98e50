use std::collections::BTreeMap;

use crate::domain::{FitTable, GroupTable, GroupType};
use crate::error::AppError;
use crate::store::{FitStore, TimeSeriesStore};

/// In-memory store keyed by group type.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    series: BTreeMap<GroupType, GroupTable>,
    fits: BTreeMap<GroupType, FitTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(tables: impl IntoIterator<Item = GroupTable>) -> Self {
        Self {
            series: tables.into_iter().map(|t| (t.group_type.clone(), t)).collect(),
            fits: BTreeMap::new(),
        }
    }

    pub fn with_fits(tables: impl IntoIterator<Item = FitTable>) -> Self {
        Self {
            series: BTreeMap::new(),
            fits: tables.into_iter().map(|t| (t.group_type.clone(), t)).collect(),
        }
    }
}

impl TimeSeriesStore for MemoryStore {
    fn series_groups(&self) -> Result<Vec<GroupType>, AppError> {
        Ok(self.series.keys().cloned().collect())
    }

    fn read_group(&self, group: &GroupType) -> Result<GroupTable, AppError> {
        self.series
            .get(group)
            .cloned()
            .ok_or_else(|| AppError::MissingGroup(group.to_string()))
    }

    fn write_group(&mut self, table: &GroupTable) -> Result<(), AppError> {
        self.series.insert(table.group_type.clone(), table.clone());
        Ok(())
    }
}

impl FitStore for MemoryStore {
    fn fit_groups(&self) -> Result<Vec<GroupType>, AppError> {
        Ok(self.fits.keys().cloned().collect())
    }

    fn read_fits(&self, group: &GroupType) -> Result<FitTable, AppError> {
        self.fits
            .get(group)
            .cloned()
            .ok_or_else(|| AppError::MissingGroup(group.to_string()))
    }

    fn write_fits(&mut self, table: &FitTable) -> Result<(), AppError> {
        self.fits.insert(table.group_type.clone(), table.clone());
        Ok(())
    }
}
