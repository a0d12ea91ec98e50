//! Low-level polynomial fit of one (load, heat rate) series.
//!
//! Given:
//! - loads `x_i` (already sorted by the caller)
//! - heat rates `y_i`
//! - the polynomial order and the number of curve samples to keep
//!
//! we produce the coefficients, domain bounds, the sampled curve and a few
//! aggregate scalars. Any failure degrades to a "no fit" result with `NaN`
//! coefficients; nothing here returns an error.

use tracing::warn;

use crate::domain::{CurveFit, FitStatus, UnitMeta};
use crate::math::{linspace, polyfit, polyval};

/// Result of fitting a single series.
#[derive(Debug, Clone)]
pub struct ExtractedFit {
    /// Highest power first; all `NaN` when no fit was accepted.
    pub coefficients: Vec<f64>,
    pub load_min: f64,
    pub load_max: f64,
    pub load_samples: Vec<f64>,
    pub heat_rate_samples: Vec<f64>,
    pub total_load: f64,
    pub min_gen_perc: f64,
}

impl ExtractedFit {
    pub fn is_fitted(&self) -> bool {
        self.coefficients.iter().all(|c| c.is_finite())
    }

    pub fn into_row(self, fit_id: impl Into<String>, meta: UnitMeta) -> CurveFit {
        let status = if self.is_fitted() {
            FitStatus::Fitted
        } else {
            FitStatus::NoFit
        };
        CurveFit {
            fit_id: fit_id.into(),
            coefficients: self.coefficients,
            load_min: self.load_min,
            load_max: self.load_max,
            load_samples: self.load_samples,
            heat_rate_samples: self.heat_rate_samples,
            total_load: self.total_load,
            min_gen_perc: self.min_gen_perc,
            min_heat_rate: f64::NAN,
            status,
            meta,
        }
    }
}

/// Fit `heat_rate` against `load` with a polynomial of degree `order` and
/// sample the curve at `points` evenly spaced loads.
///
/// The fit is accepted only when the number of distinct loads exceeds the
/// order by more than one; fewer than `order + 2` distinct loads never
/// produce coefficients.
pub fn extract_fit(load: &[f64], heat_rate: &[f64], order: usize, points: usize) -> ExtractedFit {
    let n_coef = order + 1;
    let total_load: f64 = load.iter().sum();

    if load.is_empty() {
        return ExtractedFit {
            coefficients: vec![f64::NAN; n_coef],
            load_min: f64::NAN,
            load_max: f64::NAN,
            load_samples: vec![f64::NAN; points],
            heat_rate_samples: vec![f64::NAN; points],
            total_load,
            min_gen_perc: f64::NAN,
        };
    }

    let load_min = load.iter().copied().fold(f64::INFINITY, f64::min);
    let load_max = load.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_gen_perc = load_min / load_max;

    let coefficients = accepted_coefficients(load, heat_rate, order);

    let (coefficients, load_samples, heat_rate_samples) = match coefficients {
        Some(coefs) => {
            let loads = linspace(load_min, load_max, points);
            let hrs = loads.iter().map(|&x| polyval(&coefs, x)).collect();
            (coefs, loads, hrs)
        }
        None => {
            let mut loads = vec![f64::NAN; points];
            if let Some(first) = loads.first_mut() {
                *first = load_min;
            }
            if let Some(last) = loads.last_mut() {
                *last = load_max;
            }
            (vec![f64::NAN; n_coef], loads, vec![f64::NAN; points])
        }
    };

    ExtractedFit {
        coefficients,
        load_min,
        load_max,
        load_samples,
        heat_rate_samples,
        total_load,
        min_gen_perc,
    }
}

fn accepted_coefficients(load: &[f64], heat_rate: &[f64], order: usize) -> Option<Vec<f64>> {
    if load.len() != heat_rate.len() {
        warn!(loads = load.len(), heat_rates = heat_rate.len(), "Cannot fit unit: length mismatch");
        return None;
    }
    if load.iter().chain(heat_rate).any(|v| !v.is_finite()) {
        warn!("Cannot fit unit: non-finite load or heat rate");
        return None;
    }

    let degrees_of_freedom = distinct_count(load).saturating_sub(order);
    if degrees_of_freedom <= 1 {
        warn!(points = load.len(), degrees_of_freedom, "Cannot fit unit: insufficient degrees of freedom");
        return None;
    }

    let Some(fit) = polyfit(load, heat_rate, order) else {
        warn!(points = load.len(), "Cannot fit unit: least squares solve failed");
        return None;
    };
    if fit.rank < order + 1 {
        warn!(rank = fit.rank, order, "Cannot fit unit: rank-deficient design");
        return None;
    }

    Some(fit.coefficients)
}

fn distinct_count(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}
