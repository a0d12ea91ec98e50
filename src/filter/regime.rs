//! Per-unit regime labeling of a group.
//!
//! For each group the filter:
//!
//! 1. derives `min_samples` / `threshold` from the expected number of hourly points
//! 2. resolves the clustering strategy from the group's unit kind
//! 3. labels every unit as an independent job (worker pool or sequential)
//! 4. joins the per-unit tables and restores `(unit_id, timestamp)` order
//!
//! A failing job aborts the whole group; nothing partial is returned.

use std::collections::BTreeSet;

use rayon::prelude::*;
use tracing::{Span, debug, info, warn};

use crate::domain::{FilterConfig, GroupTable, UnitSeries};
use crate::error::AppError;
use crate::filter::cluster::{ClusterStrategies, ClusterStrategy, RegimeClusterer};

/// Integer parameters handed to the clusterer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterParams {
    /// `years × hours_per_year`.
    pub total_points: usize,
    /// Density parameter for the clusterer.
    pub min_samples: usize,
    /// Units with fewer observed points are not clustered.
    pub threshold: usize,
}

impl FilterParams {
    pub fn derive(config: &FilterConfig) -> Self {
        let total_points = config.years as usize * config.hours_per_year as usize;
        Self {
            total_points,
            min_samples: total_points / config.min_samples_divisor.max(1) as usize,
            threshold: total_points / config.threshold_divisor.max(1) as usize,
        }
    }
}

/// Labels operating regimes for every unit of a group.
pub struct RegimeFilter {
    strategies: ClusterStrategies,
    config: FilterConfig,
    pool: Option<rayon::ThreadPool>,
    span: Span,
}

impl RegimeFilter {
    pub fn new(strategies: ClusterStrategies, config: FilterConfig) -> Result<Self, AppError> {
        config.validate()?;

        let pool = if config.parallel {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers.unwrap_or(0))
                .thread_name(|i| format!("regime-filter-{i}"))
                .build()
                .map_err(|e| AppError::config(format!("Failed to start worker pool: {e}")))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            strategies,
            config,
            pool,
            span: tracing::info_span!("regime_filter"),
        })
    }

    /// Replace the span events are recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn params(&self) -> FilterParams {
        FilterParams::derive(&self.config)
    }

    /// Label every unit of `table`, returning a new table.
    pub fn filter_group(&self, table: &GroupTable) -> Result<GroupTable, AppError> {
        let params = self.params();
        let group = table.group_type.name();
        info!(parent: &self.span, group, "filtering all units");
        debug!(parent: &self.span, group, min_samples = params.min_samples, "density parameter");
        debug!(parent: &self.span, group, threshold = params.threshold, "skipping units below threshold");

        let strategy = ClusterStrategy::for_kind(table.group_type.kind());
        let clusterer = self.strategies.resolve(strategy);

        let selected = self.select_units(table);
        let (jobs, skipped): (Vec<&UnitSeries>, Vec<&UnitSeries>) =
            selected.into_iter().partition(|u| u.len() >= params.threshold);

        for unit in &skipped {
            debug!(
                parent: &self.span,
                group,
                unit_id = %unit.unit_id,
                points = unit.len(),
                "too few points, labeling as noise"
            );
        }

        let run = |unit: &&UnitSeries| self.label_unit(clusterer.as_ref(), unit, params);
        let labeled: Vec<UnitSeries> = match &self.pool {
            Some(pool) => pool.install(|| jobs.par_iter().map(run).collect::<Result<Vec<_>, _>>())?,
            None => jobs.iter().map(run).collect::<Result<Vec<_>, _>>()?,
        };

        let mut units = labeled;
        units.extend(skipped.into_iter().map(UnitSeries::unlabeled));

        Ok(GroupTable::new(table.group_type.clone(), units))
    }

    fn select_units<'a>(&self, table: &'a GroupTable) -> Vec<&'a UnitSeries> {
        let Some(wanted) = &self.config.units else {
            return table.units.iter().collect();
        };

        let wanted: BTreeSet<&str> = wanted.iter().map(String::as_str).collect();
        let mut out = Vec::with_capacity(wanted.len());
        for unit_id in wanted {
            match table.unit(unit_id) {
                Some(unit) => out.push(unit),
                None => warn!(
                    parent: &self.span,
                    group = table.group_type.name(),
                    unit_id = %unit_id,
                    "unit not present in store, skipping"
                ),
            }
        }
        out
    }

    fn label_unit(
        &self,
        clusterer: &dyn RegimeClusterer,
        unit: &UnitSeries,
        params: FilterParams,
    ) -> Result<UnitSeries, AppError> {
        debug!(parent: &self.span, unit_id = %unit.unit_id, "filtering unit");

        let input = unit.unlabeled();
        let expected = input.len();
        let labeled = clusterer
            .label(input, params.min_samples, params.threshold)
            .map_err(|e| match e {
                AppError::Cluster { .. } => e,
                other => AppError::cluster(&unit.unit_id, other.to_string()),
            })?;

        if labeled.unit_id != unit.unit_id {
            return Err(AppError::cluster(
                &unit.unit_id,
                format!("clusterer returned unit '{}'", labeled.unit_id),
            ));
        }
        if labeled.len() != expected {
            return Err(AppError::cluster(
                &unit.unit_id,
                format!("clusterer returned {} points for {expected} inputs", labeled.len()),
            ));
        }
        if let Some(p) = labeled.points.iter().find(|p| p.regime < -1) {
            return Err(AppError::cluster(&unit.unit_id, format!("invalid regime label {}", p.regime)));
        }

        Ok(labeled)
    }
}

impl std::fmt::Debug for RegimeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegimeFilter")
            .field("config", &self.config)
            .field("parallel", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}
