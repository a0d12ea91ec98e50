//! Per-unit curve fitting.
//!
//! A unit with several retained regimes produces one row per regime, keyed
//! `<unit_id>-<label>`; otherwise the unit produces exactly one row keyed by
//! its bare id (an all-`NaN` row when nothing was retained).

use tracing::{Span, debug, info};

use crate::domain::{CurveFit, FitConfig, FitTable, GroupTable, RegimeLabel, UnitSeries, regime_fit_id};
use crate::error::AppError;
use crate::fit::fitter::extract_fit;

/// Fits efficiency curves for every unit of a group.
#[derive(Debug, Clone)]
pub struct CurveFitter {
    config: FitConfig,
    span: Span,
}

impl CurveFitter {
    pub fn new(config: FitConfig) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self {
            config,
            span: tracing::info_span!("curve_fitter"),
        })
    }

    /// Replace the span events are recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Fit every unit of `table`; rows are ordered by fit id.
    pub fn fit_group(&self, table: &GroupTable) -> FitTable {
        let _guard = self.span.enter();
        let group = table.group_type.name();
        info!(group, units = table.units.len(), "fitting all units");

        let mut rows = Vec::with_capacity(table.units.len());
        for unit in &table.units {
            debug!(unit_id = %unit.unit_id, "fitting unit");
            let mut unit_rows = self.fit_unit(unit);
            for row in &mut unit_rows {
                if row.meta.group_type.is_none() {
                    row.meta.group_type = Some(group.to_string());
                }
            }
            rows.extend(unit_rows);
        }

        FitTable::new(table.group_type.clone(), self.config.order, self.config.points, rows)
    }

    /// Fit one unit, returning one row per retained regime (at least one row).
    pub fn fit_unit(&self, unit: &UnitSeries) -> Vec<CurveFit> {
        let _guard = self.span.enter();
        let labels = unit.retained_labels();

        if labels.len() > 1 {
            labels
                .iter()
                .map(|&label| {
                    let (load, hr) = sorted_regime(unit, |l| l == label);
                    extract_fit(&load, &hr, self.config.order, self.config.points)
                        .into_row(regime_fit_id(&unit.unit_id, label), unit.meta.clone())
                })
                .collect()
        } else {
            let (load, hr) = sorted_regime(unit, |l| l >= 0);
            vec![
                extract_fit(&load, &hr, self.config.order, self.config.points)
                    .into_row(unit.unit_id.clone(), unit.meta.clone()),
            ]
        }
    }
}

/// Loads and heat rates of the selected points, ordered by `(load, heat_rate)`.
fn sorted_regime(unit: &UnitSeries, keep: impl Fn(RegimeLabel) -> bool) -> (Vec<f64>, Vec<f64>) {
    let mut pairs: Vec<(f64, f64)> = unit
        .points
        .iter()
        .filter(|p| keep(p.regime))
        .map(|p| (p.load, p.heat_rate))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    pairs.into_iter().unzip()
}
