//! Clustering capability consumed by the regime filter.
//!
//! The density-based clustering algorithm itself lives outside this crate.
//! It is plugged in through `RegimeClusterer`, one implementation per unit
//! strategy, and resolved once per group through `ClusterStrategies`.

use std::sync::Arc;

use crate::domain::{NOISE_LABEL, UnitKind, UnitSeries};
use crate::error::AppError;

/// Assigns a regime label to every operating point of one unit.
///
/// Implementations receive their own copy of the unit (all labels reset to
/// noise) and return the labeled copy. They run concurrently on worker
/// threads, so they must not share mutable state.
pub trait RegimeClusterer: Send + Sync {
    fn label(&self, unit: UnitSeries, min_samples: usize, threshold: usize) -> Result<UnitSeries, AppError>;
}

impl<F> RegimeClusterer for F
where
    F: Fn(UnitSeries, usize, usize) -> Result<UnitSeries, AppError> + Send + Sync,
{
    fn label(&self, unit: UnitSeries, min_samples: usize, threshold: usize) -> Result<UnitSeries, AppError> {
        self(unit, min_samples, threshold)
    }
}

/// Which clustering strategy a group uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterStrategy {
    SingleUnit,
    /// May reconcile several co-located sub-units.
    CombinedCycle,
}

impl ClusterStrategy {
    pub fn for_kind(kind: UnitKind) -> Self {
        match kind {
            UnitKind::CombinedCycle => ClusterStrategy::CombinedCycle,
            UnitKind::Boiler | UnitKind::CombustionTurbine | UnitKind::Other => ClusterStrategy::SingleUnit,
        }
    }
}

/// Clusterer per strategy.
#[derive(Clone)]
pub struct ClusterStrategies {
    single: Arc<dyn RegimeClusterer>,
    combined_cycle: Arc<dyn RegimeClusterer>,
}

impl ClusterStrategies {
    pub fn new(single: Arc<dyn RegimeClusterer>, combined_cycle: Arc<dyn RegimeClusterer>) -> Self {
        Self { single, combined_cycle }
    }

    /// Use the same clusterer for every strategy.
    pub fn uniform(clusterer: Arc<dyn RegimeClusterer>) -> Self {
        Self {
            single: Arc::clone(&clusterer),
            combined_cycle: clusterer,
        }
    }

    pub fn resolve(&self, strategy: ClusterStrategy) -> Arc<dyn RegimeClusterer> {
        match strategy {
            ClusterStrategy::SingleUnit => Arc::clone(&self.single),
            ClusterStrategy::CombinedCycle => Arc::clone(&self.combined_cycle),
        }
    }
}

impl Default for ClusterStrategies {
    fn default() -> Self {
        Self::uniform(Arc::new(SingleRegime))
    }
}

impl std::fmt::Debug for ClusterStrategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterStrategies").finish_non_exhaustive()
    }
}

/// Built-in clusterer that treats every finite point of a unit as one regime.
///
/// Units with fewer than `threshold` points, or fewer than `min_samples`
/// finite points, are labeled entirely as noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleRegime;

impl RegimeClusterer for SingleRegime {
    fn label(&self, mut unit: UnitSeries, min_samples: usize, threshold: usize) -> Result<UnitSeries, AppError> {
        let finite = |load: f64, hr: f64| load.is_finite() && hr.is_finite() && load > 0.0 && hr > 0.0;
        let usable = unit.points.iter().filter(|p| finite(p.load, p.heat_rate)).count();
        let keep = unit.len() >= threshold && usable >= min_samples.max(1);

        for p in &mut unit.points {
            p.regime = if keep && finite(p.load, p.heat_rate) { 0 } else { NOISE_LABEL };
        }
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OperatingPoint, UnitMeta};
    use chrono::NaiveDate;

    fn unit(n: usize) -> UnitSeries {
        let t0 = NaiveDate::from_ymd_opt(2017, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let points = (0..n)
            .map(|i| OperatingPoint::new(t0 + chrono::Duration::hours(i as i64), 50.0 + i as f64, 10.0))
            .collect();
        UnitSeries::new("u1", UnitMeta::default(), points)
    }

    #[test]
    fn strategy_is_resolved_from_unit_kind() {
        assert_eq!(ClusterStrategy::for_kind(UnitKind::CombinedCycle), ClusterStrategy::CombinedCycle);
        assert_eq!(ClusterStrategy::for_kind(UnitKind::Boiler), ClusterStrategy::SingleUnit);
        assert_eq!(ClusterStrategy::for_kind(UnitKind::Other), ClusterStrategy::SingleUnit);
    }

    #[test]
    fn single_regime_labels_large_units() {
        let labeled = SingleRegime.label(unit(10), 2, 5).unwrap();
        assert!(labeled.points.iter().all(|p| p.regime == 0));

        let small = SingleRegime.label(unit(3), 2, 5).unwrap();
        assert!(small.points.iter().all(|p| p.regime == NOISE_LABEL));
    }

    #[test]
    fn single_regime_marks_non_finite_points_as_noise() {
        let mut u = unit(6);
        u.points[2].heat_rate = f64::NAN;
        let labeled = SingleRegime.label(u, 1, 1).unwrap();
        assert_eq!(labeled.points[2].regime, NOISE_LABEL);
        assert_eq!(labeled.points[3].regime, 0);
    }

    #[test]
    fn closures_are_clusterers() {
        let strategies = ClusterStrategies::new(
            Arc::new(SingleRegime),
            Arc::new(|u: UnitSeries, _: usize, _: usize| -> Result<UnitSeries, AppError> {
                Err(AppError::cluster(u.unit_id, "boom"))
            }),
        );
        let cc = strategies.resolve(ClusterStrategy::CombinedCycle);
        assert!(cc.label(unit(4), 1, 1).is_err());
        let single = strategies.resolve(ClusterStrategy::SingleUnit);
        assert!(single.label(unit(4), 1, 1).is_ok());
    }
}
