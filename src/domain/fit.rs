//! Fit-table rows.
//!
//! A `CurveFit` is created once by the curve fitter and afterwards only ever
//! invalidated by the outlier rejector. Missing values are `NaN`.

use serde::{Deserialize, Serialize};

use crate::domain::{GroupType, RegimeLabel, UnitMeta};

/// Lifecycle state of a fit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitStatus {
    /// Coefficients and curve samples are defined.
    Fitted,
    /// Too few points, degenerate design, or a numeric failure.
    NoFit,
    /// Invalidated as a population outlier.
    Rejected,
}

impl FitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FitStatus::Fitted => "fitted",
            FitStatus::NoFit => "nofit",
            FitStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "fitted" => Some(FitStatus::Fitted),
            "nofit" => Some(FitStatus::NoFit),
            "rejected" => Some(FitStatus::Rejected),
            _ => None,
        }
    }
}

/// One fitted efficiency curve for a unit or for one regime of a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveFit {
    pub fit_id: String,
    /// Polynomial coefficients, highest order first (`a_n .. a_0`).
    pub coefficients: Vec<f64>,
    pub load_min: f64,
    pub load_max: f64,
    /// Evenly spaced loads; first is `load_min`, last is `load_max`.
    pub load_samples: Vec<f64>,
    /// Fitted heat rate at each load sample.
    pub heat_rate_samples: Vec<f64>,
    pub total_load: f64,
    pub min_gen_perc: f64,
    /// Minimum of the fitted curve over its domain, once computed.
    pub min_heat_rate: f64,
    pub status: FitStatus,
    pub meta: UnitMeta,
}

impl CurveFit {
    pub fn order(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn has_coefficients(&self) -> bool {
        !self.coefficients.is_empty() && self.coefficients.iter().all(|c| c.is_finite())
    }

    /// Copy of this row with the curve cleared.
    ///
    /// Domain bounds, totals, metadata and the recorded minimum survive.
    pub fn invalidated(&self) -> Self {
        let n = self.load_samples.len();
        let load_samples = self
            .load_samples
            .iter()
            .enumerate()
            .map(|(i, &v)| if i == 0 || i + 1 == n { v } else { f64::NAN })
            .collect();

        Self {
            coefficients: vec![f64::NAN; self.coefficients.len()],
            load_samples,
            heat_rate_samples: vec![f64::NAN; self.heat_rate_samples.len()],
            status: FitStatus::Rejected,
            ..self.clone()
        }
    }

    /// Structural equality that treats `NaN == NaN`.
    pub fn same_values(&self, other: &Self) -> bool {
        fn eq(a: f64, b: f64) -> bool {
            (a.is_nan() && b.is_nan()) || a == b
        }
        fn eq_all(a: &[f64], b: &[f64]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| eq(*x, *y))
        }

        self.fit_id == other.fit_id
            && self.status == other.status
            && self.meta == other.meta
            && eq_all(&self.coefficients, &other.coefficients)
            && eq(self.load_min, other.load_min)
            && eq(self.load_max, other.load_max)
            && eq_all(&self.load_samples, &other.load_samples)
            && eq_all(&self.heat_rate_samples, &other.heat_rate_samples)
            && eq(self.total_load, other.total_load)
            && eq(self.min_gen_perc, other.min_gen_perc)
            && eq(self.min_heat_rate, other.min_heat_rate)
    }
}

/// All fit rows of one group, ordered by fit id.
#[derive(Debug, Clone, PartialEq)]
pub struct FitTable {
    pub group_type: GroupType,
    /// Polynomial order shared by every row.
    pub order: usize,
    /// Number of load / heat-rate samples per row.
    pub points: usize,
    pub rows: Vec<CurveFit>,
}

impl FitTable {
    pub fn new(group_type: GroupType, order: usize, points: usize, mut rows: Vec<CurveFit>) -> Self {
        rows.sort_by(|a, b| a.fit_id.cmp(&b.fit_id));
        Self {
            group_type,
            order,
            points,
            rows,
        }
    }

    /// Rows whose coefficients are all defined.
    pub fn fitted_count(&self) -> usize {
        self.rows.iter().filter(|r| r.has_coefficients()).count()
    }

    pub fn row(&self, fit_id: &str) -> Option<&CurveFit> {
        self.rows.iter().find(|r| r.fit_id == fit_id)
    }

    pub fn same_values(&self, other: &Self) -> bool {
        self.group_type == other.group_type
            && self.order == other.order
            && self.points == other.points
            && self.rows.len() == other.rows.len()
            && self.rows.iter().zip(&other.rows).all(|(a, b)| a.same_values(b))
    }
}

/// Fit id for one regime of a multi-regime unit: `<unit_id>-<label>`.
pub fn regime_fit_id(unit_id: &str, label: RegimeLabel) -> String {
    format!("{unit_id}-{label}")
}

/// Combined-cycle aggregate id: the prefix before the first `-` or `_`.
pub fn cc_id(fit_id: &str) -> &str {
    match fit_id.find(['-', '_']) {
        Some(idx) => &fit_id[..idx],
        None => fit_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fit() -> CurveFit {
        CurveFit {
            fit_id: "10".to_string(),
            coefficients: vec![0.1, 0.2, 9.0],
            load_min: 10.0,
            load_max: 30.0,
            load_samples: vec![10.0, 20.0, 30.0],
            heat_rate_samples: vec![11.0, 12.0, 13.0],
            total_load: 600.0,
            min_gen_perc: 1.0 / 3.0,
            min_heat_rate: 11.0,
            status: FitStatus::Fitted,
            meta: UnitMeta::default(),
        }
    }

    #[test]
    fn invalidation_keeps_domain_bounds() {
        let fit = sample_fit().invalidated();
        assert_eq!(fit.status, FitStatus::Rejected);
        assert!(!fit.has_coefficients());
        assert_eq!(fit.load_samples[0], 10.0);
        assert_eq!(fit.load_samples[2], 30.0);
        assert!(fit.load_samples[1].is_nan());
        assert!(fit.heat_rate_samples.iter().all(|v| v.is_nan()));
        assert_eq!(fit.total_load, 600.0);
        assert_eq!(fit.min_heat_rate, 11.0);
    }

    #[test]
    fn cc_ids_strip_regime_and_sub_unit_suffixes() {
        assert_eq!(cc_id("7_0"), "7");
        assert_eq!(cc_id("7-1"), "7");
        assert_eq!(cc_id("7"), "7");
        assert_eq!(regime_fit_id("7", 2), "7-2");
    }

    #[test]
    fn same_values_treats_nan_as_equal() {
        let a = sample_fit().invalidated();
        let b = a.clone();
        assert!(a.same_values(&b));
        assert_ne!(a, b);
    }
}
