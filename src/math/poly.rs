//! Polynomial helpers.
//!
//! Coefficient vectors are ordered highest power first (`a_n .. a_0`), the
//! order they are stored in fit tables.
//!
//! Numerical notes:
//! - Raw loads span hundreds of MW, so `x^4` columns of a plain Vandermonde
//!   matrix differ by ~10 orders of magnitude. We fit in `u = (x - c) / s`
//!   with `u ∈ [-1, 1]` and expand back to the raw basis afterwards.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_least_squares;

/// Least squares polynomial in the raw `x` basis.
#[derive(Debug, Clone)]
pub struct PolyFit {
    /// Highest power first.
    pub coefficients: Vec<f64>,
    /// Numerical rank of the scaled design matrix.
    pub rank: usize,
    pub sse: f64,
}

/// `n` evenly spaced values over `[start, end]`, endpoints exact.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut out: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            out[0] = start;
            out[n - 1] = end;
            out
        }
    }
}

/// Evaluate a polynomial (highest power first) with Horner's rule.
pub fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, &c| acc * x + c)
}

/// Fit a polynomial of the given order through `(x, y)`.
///
/// Returns `None` when the inputs are empty, mismatched, non-finite, span a
/// single `x` value, or the solver fails.
pub fn polyfit(x: &[f64], y: &[f64], order: usize) -> Option<PolyFit> {
    if x.is_empty() || x.len() != y.len() {
        return None;
    }

    let (lo, hi) = x
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let center = 0.5 * (lo + hi);
    let scale = 0.5 * (hi - lo);
    if !(scale.is_finite() && scale > 0.0) {
        return None;
    }

    let p = order + 1;
    let mut design = DMatrix::<f64>::zeros(x.len(), p);
    for (i, &xi) in x.iter().enumerate() {
        let u = (xi - center) / scale;
        let mut pow = 1.0;
        for j in 0..p {
            design[(i, j)] = pow;
            pow *= u;
        }
    }
    let rhs = DVector::from_column_slice(y);

    let solution = solve_least_squares(&design, &rhs)?;
    let scaled: Vec<f64> = solution.beta.iter().copied().collect();
    let coefficients = unscale(&scaled, center, scale);
    if !coefficients.iter().all(|c| c.is_finite()) {
        return None;
    }

    Some(PolyFit {
        coefficients,
        rank: solution.rank,
        sse: solution.sse,
    })
}

/// Expand `Σ b_k ((x - c) / s)^k` (lowest power first) into raw-basis
/// coefficients, highest power first.
fn unscale(scaled: &[f64], center: f64, scale: f64) -> Vec<f64> {
    let p = scaled.len();
    let mut raw = vec![0.0; p];
    for (k, &b) in scaled.iter().enumerate() {
        let factor = b / scale.powi(k as i32);
        let mut binom = 1.0;
        for j in 0..=k {
            // C(k, j) * (-c)^(k - j)
            raw[j] += factor * binom * (-center).powi((k - j) as i32);
            binom = binom * (k - j) as f64 / (j + 1) as f64;
        }
    }
    raw.reverse();
    raw
}
