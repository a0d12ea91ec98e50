//! Cross-unit outlier rejection of fitted curves.
//!
//! For each group:
//!
//! 1. skip the group when it has fewer than `min_units` fitted units
//! 2. compute each row's minimum heat rate over its fitted load range
//! 3. aggregate minima per unit (per `cc_id` for combined-cycle groups)
//! 4. build the acceptance band from the population of defined minima
//! 5. invalidate every fitted row whose unit falls outside the band
//!
//! Rejected rows keep their recorded minimum, so a rejected table judged
//! again with the same options yields the same band and no further changes.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{Span, debug, info, warn};

use crate::domain::{CurveFit, FitStatus, FitTable, RejectConfig, cc_id};
use crate::error::AppError;
use crate::math::{linspace, polyval};
use crate::reject::stats::{Band, PopulationStats};

/// Outcome of rejecting one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectionSummary {
    pub group: String,
    /// Rows counted towards `min_units`.
    pub fitted_units: usize,
    /// `true` when the population was too small and the group passed through.
    pub skipped: bool,
    pub stats: Option<PopulationStats>,
    pub band: Option<Band>,
    /// Aggregation keys (fit ids, or CC ids) that failed.
    pub failed: Vec<String>,
}

/// Minimum of the fitted curve over `[load_min, load_max]`.
///
/// `None` when the row has missing coefficients or bounds.
pub fn min_heat_rate(fit: &CurveFit, points: usize) -> Option<f64> {
    if !fit.has_coefficients() || !(fit.load_min.is_finite() && fit.load_max.is_finite()) {
        return None;
    }
    let min = linspace(fit.load_min, fit.load_max, points)
        .into_iter()
        .map(|x| polyval(&fit.coefficients, x))
        .fold(f64::INFINITY, f64::min);
    min.is_finite().then_some(min)
}

/// Rejects population outliers within each group.
#[derive(Debug, Clone)]
pub struct OutlierRejector {
    config: RejectConfig,
    span: Span,
}

impl OutlierRejector {
    pub fn new(config: RejectConfig) -> Result<Self, AppError> {
        config.validate()?;
        Ok(Self {
            config,
            span: tracing::info_span!("outlier_rejector"),
        })
    }

    /// Replace the span events are recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &RejectConfig {
        &self.config
    }

    /// Produce a new table with outlier rows invalidated.
    pub fn reject_group(&self, table: &FitTable) -> (FitTable, RejectionSummary) {
        let _guard = self.span.enter();
        let group = table.group_type.name().to_string();
        let combined_cycle = table.group_type.is_combined_cycle();

        let fitted_units = table
            .rows
            .iter()
            .filter(|r| matches!(r.status, FitStatus::Fitted | FitStatus::Rejected))
            .count();

        if fitted_units < self.config.min_units {
            warn!(
                group = %group,
                fitted_units,
                min_units = self.config.min_units,
                "skipping group: too few fitted units for outlier rejection"
            );
            let summary = RejectionSummary {
                group,
                fitted_units,
                skipped: true,
                stats: None,
                band: None,
                failed: Vec::new(),
            };
            return (table.clone(), summary);
        }

        info!(group = %group, combined_cycle, "filtering the most and least efficient fits");

        // Record each row's minimum; fitted rows are (re)computed.
        let rows: Vec<CurveFit> = table
            .rows
            .iter()
            .map(|row| CurveFit {
                min_heat_rate: self.row_minimum(row).unwrap_or(f64::NAN),
                ..row.clone()
            })
            .collect();

        let key = |row: &CurveFit| -> String {
            if combined_cycle {
                cc_id(&row.fit_id).to_string()
            } else {
                row.fit_id.clone()
            }
        };

        let mut minima: BTreeMap<String, f64> = BTreeMap::new();
        for row in rows.iter().filter(|r| r.min_heat_rate.is_finite()) {
            minima
                .entry(key(row))
                .and_modify(|m| *m = m.min(row.min_heat_rate))
                .or_insert(row.min_heat_rate);
        }

        let values: Vec<f64> = minima.values().copied().collect();
        let stats = PopulationStats::from_values(&values);
        let band = stats.map(|s| {
            if combined_cycle {
                Band::upper_only(self.config.cc_cutoff)
            } else {
                s.band(self.config.stdev_multiplier)
                    .with_overrides(self.config.lower_threshold, self.config.upper_threshold)
            }
        });

        let failed: BTreeSet<String> = match band {
            Some(band) => minima
                .iter()
                .filter(|&(_, &v)| band.rejects(v))
                .map(|(k, _)| k.clone())
                .collect(),
            None => BTreeSet::new(),
        };

        if let (Some(s), Some(b)) = (stats, band) {
            debug!(
                group = %group,
                population = s.n,
                mean = s.mean,
                stdev = s.stdev,
                lower = b.lower,
                upper = b.upper,
                "acceptance band"
            );
        }
        debug!(group = %group, failed = failed.len(), "units being filtered");

        let rows = rows
            .into_iter()
            .map(|row| {
                if row.status == FitStatus::Fitted && failed.contains(&key(&row)) {
                    row.invalidated()
                } else {
                    row
                }
            })
            .collect();

        let out = FitTable::new(table.group_type.clone(), table.order, table.points, rows);
        let summary = RejectionSummary {
            group,
            fitted_units,
            skipped: false,
            stats,
            band,
            failed: failed.into_iter().collect(),
        };
        (out, summary)
    }

    fn row_minimum(&self, row: &CurveFit) -> Option<f64> {
        let min = match row.status {
            FitStatus::Fitted => min_heat_rate(row, self.config.hr_min_points)?,
            FitStatus::Rejected => Some(row.min_heat_rate).filter(|v| v.is_finite())?,
            FitStatus::NoFit => return None,
        };
        if min < self.config.hr_floor {
            warn!(
                fit_id = %row.fit_id,
                min_heat_rate = min,
                floor = self.config.hr_floor,
                "minimum heat rate below physical floor, ignoring"
            );
            return None;
        }
        Some(min)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand_distr::{Distribution, Normal};

    use super::*;
    use crate::domain::{GroupType, UnitMeta};

    /// A row whose curve is the parabola `(x - 50)^2 / 1000 + floor_hr`,
    /// minimum `floor_hr` at load 50.
    fn row(fit_id: &str, floor_hr: f64) -> CurveFit {
        let coefficients = vec![0.001, -0.1, 2.5 + floor_hr];
        let loads = linspace(20.0, 80.0, 5);
        let hrs = loads.iter().map(|&x| polyval(&coefficients, x)).collect();
        CurveFit {
            fit_id: fit_id.to_string(),
            coefficients,
            load_min: 20.0,
            load_max: 80.0,
            load_samples: loads,
            heat_rate_samples: hrs,
            total_load: 5000.0,
            min_gen_perc: 0.25,
            min_heat_rate: f64::NAN,
            status: FitStatus::Fitted,
            meta: UnitMeta::default(),
        }
    }

    fn no_fit(fit_id: &str) -> CurveFit {
        CurveFit {
            coefficients: vec![f64::NAN; 3],
            heat_rate_samples: vec![f64::NAN; 5],
            status: FitStatus::NoFit,
            ..row(fit_id, 10.0)
        }
    }

    fn table(group: &str, rows: Vec<CurveFit>) -> FitTable {
        FitTable::new(GroupType::parse(group).unwrap(), 2, 5, rows)
    }

    fn rejector(min_units: usize) -> OutlierRejector {
        OutlierRejector::new(RejectConfig {
            min_units,
            ..RejectConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn minimum_is_found_inside_the_domain() {
        let min = min_heat_rate(&row("1", 9.0), 101).unwrap();
        assert!((min - 9.0).abs() < 1e-9);
        assert!(min_heat_rate(&no_fit("2"), 100).is_none());
    }

    #[test]
    fn units_outside_the_band_are_invalidated() {
        // Population {8, 9, 9, 9, 9, 9, 9, 9, 9, 14}: mean 9.4, stdev ~1.56.
        let mut rows: Vec<CurveFit> = (0..8).map(|i| row(&format!("u{i}"), 9.0)).collect();
        rows.push(row("low", 8.0));
        rows.push(row("high", 14.0));
        let input = table("CT (NG)", rows);
        let (out, summary) = rejector(5).reject_group(&input);

        assert_eq!(summary.failed, vec!["high".to_string()]);
        let stats = summary.stats.unwrap();
        assert!((stats.mean - 9.4).abs() < 1e-3);

        for before in input.rows.iter().filter(|r| r.fit_id != "high") {
            let after = out.row(&before.fit_id).unwrap();
            assert_eq!(after.status, FitStatus::Fitted, "{}", before.fit_id);
            assert_eq!(after.coefficients, before.coefficients);
            assert_eq!(after.load_samples, before.load_samples);
            assert_eq!(after.heat_rate_samples, before.heat_rate_samples);
        }

        let high = out.row("high").unwrap();
        assert_eq!(high.status, FitStatus::Rejected);
        assert!(high.coefficients.iter().all(|c| c.is_nan()));
        assert_eq!(high.load_min, 20.0);
        assert_eq!(high.load_max, 80.0);
        assert!((high.min_heat_rate - 14.0).abs() < 1e-3);

        let low = out.row("low").unwrap();
        assert_eq!(low.status, FitStatus::Fitted);
        assert!((low.min_heat_rate - 8.0).abs() < 1e-3);
    }

    #[test]
    fn hard_threshold_replaces_one_edge() {
        let mut rows: Vec<CurveFit> = (0..8).map(|i| row(&format!("u{i}"), 9.0)).collect();
        rows.push(row("low", 8.0));
        rows.push(row("high", 14.0));
        let rejector = OutlierRejector::new(RejectConfig {
            min_units: 5,
            lower_threshold: Some(8.5),
            ..RejectConfig::default()
        })
        .unwrap();
        let (_, summary) = rejector.reject_group(&table("CT (NG)", rows));

        let band = summary.band.unwrap();
        let stats = summary.stats.unwrap();
        assert_eq!(band.lower, 8.5);
        assert!((band.upper - (stats.mean + 2.0 * stats.stdev)).abs() < 1e-12);
        assert_eq!(summary.failed, vec!["high".to_string(), "low".to_string()]);
    }

    #[test]
    fn combined_cycle_uses_min_of_members_and_only_the_cutoff() {
        let rows = vec![row("7_0", 7.2), row("7_1", 8.9), row("8-0", 9.5), row("8-1", 10.0), row("9", 3.0)];
        let (out, summary) = rejector(1).reject_group(&table("CC (NG)", rows));

        // "9" sits below the physical floor and drops out of the population.
        let stats = summary.stats.unwrap();
        assert_eq!(stats.n, 2);
        // "7" is represented by 7.2 and "8" by 9.5.
        assert!((stats.mean - (7.2 + 9.5) / 2.0).abs() < 1e-3);
        assert_eq!(summary.band.unwrap().lower, f64::NEG_INFINITY);
        assert_eq!(summary.band.unwrap().upper, 9.0);
        assert_eq!(summary.failed, vec!["8".to_string()]);

        assert_eq!(out.row("7_0").unwrap().status, FitStatus::Fitted);
        assert_eq!(out.row("7_1").unwrap().status, FitStatus::Fitted);
        assert_eq!(out.row("8-0").unwrap().status, FitStatus::Rejected);
        assert_eq!(out.row("8-1").unwrap().status, FitStatus::Rejected);
        assert_eq!(out.row("9").unwrap().status, FitStatus::Fitted);
        assert!(out.row("9").unwrap().min_heat_rate.is_nan());
    }

    #[test]
    fn cc_unit_with_one_member_below_the_cutoff_is_kept() {
        let rows = vec![row("5_0", 8.0), row("5_1", 12.0), row("6_0", 8.5), row("6_1", 8.7)];
        let input = table("CC (NG)", rows);
        let (out, summary) = rejector(1).reject_group(&input);

        assert!(summary.failed.is_empty());
        let stats = summary.stats.unwrap();
        assert!((stats.mean - (8.0 + 8.5) / 2.0).abs() < 1e-3);
        for id in ["5_0", "5_1", "6_0", "6_1"] {
            let row = out.row(id).unwrap();
            assert_eq!(row.status, FitStatus::Fitted);
            assert_eq!(row.coefficients, input.row(id).unwrap().coefficients);
        }
    }

    #[test]
    fn efficient_cc_units_are_never_rejected() {
        let mut rows: Vec<CurveFit> = (0..9).map(|i| row(&format!("{i}_1"), 8.5)).collect();
        rows.push(row("99_1", 5.0));
        let (out, summary) = rejector(1).reject_group(&table("CC (NG)", rows));
        assert!(summary.failed.is_empty());
        assert_eq!(out.row("99_1").unwrap().status, FitStatus::Fitted);
    }

    #[test]
    fn small_groups_pass_through() {
        let rows = vec![row("a", 9.0), row("b", 30.0), no_fit("c")];
        let input = table("Boiler (Coal)", rows);
        let (out, summary) = rejector(3).reject_group(&input);

        assert!(summary.skipped);
        assert_eq!(summary.fitted_units, 2);
        assert!(out.same_values(&input));
    }

    #[test]
    fn rejection_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(10.0, 0.8).unwrap();
        let rows: Vec<CurveFit> = (0..120)
            .map(|i| row(&format!("{i:03}"), noise.sample(&mut rng)))
            .chain([row("hot", 16.0), row("cold", 5.5)])
            .collect();

        let rejector = rejector(100);
        let (once, first) = rejector.reject_group(&table("CT (NG)", rows));
        assert!(first.failed.contains(&"hot".to_string()));

        let (twice, second) = rejector.reject_group(&once);
        assert!(twice.same_values(&once));
        assert_eq!(first.failed, second.failed);
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn population_excludes_missing_fits() {
        let mut rng = StdRng::seed_from_u64(11);
        let noise = Normal::new(10.5, 0.5).unwrap();
        let mut rows: Vec<CurveFit> = (0..100)
            .map(|i| row(&format!("f{i:03}"), noise.sample(&mut rng)))
            .collect();
        rows.extend((0..50).map(|i| no_fit(&format!("n{i:03}"))));

        let (out, summary) = rejector(100).reject_group(&table("CT (NG)", rows));
        assert!(!summary.skipped);
        assert_eq!(summary.fitted_units, 100);
        assert_eq!(summary.stats.unwrap().n, 100);
        assert_eq!(out.rows.len(), 150);
        assert!(
            out.rows
                .iter()
                .filter(|r| r.fit_id.starts_with('n'))
                .all(|r| r.status == FitStatus::NoFit)
        );
    }
}
