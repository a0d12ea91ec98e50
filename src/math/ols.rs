//! Least squares solver.
//!
//! Polynomial regression reduces to a small, tall linear system
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - SVD rather than normal equations, so nearly collinear Vandermonde
//!   columns degrade gracefully instead of blowing up.
//! - Singular values below `max_sv * max(n, p) * ε` are treated as zero, the
//!   same relative cutoff used to report the numerical rank.

use nalgebra::{DMatrix, DVector};

/// Solution of a least squares problem.
#[derive(Debug, Clone)]
pub struct LeastSquares {
    pub beta: DVector<f64>,
    /// Numerical rank of the design matrix.
    pub rank: usize,
    /// Residual sum of squares.
    pub sse: f64,
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` for empty / mismatched inputs, non-finite design matrices,
/// or a non-finite solution.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<LeastSquares> {
    if x.is_empty() || x.nrows() != y.len() {
        return None;
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return None;
    }

    let svd = x.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    if !(max_sv.is_finite() && max_sv > 0.0) {
        return None;
    }

    let tol = max_sv * x.nrows().max(x.ncols()) as f64 * f64::EPSILON;
    let rank = svd.rank(tol);
    let beta = svd.solve(y, tol).ok()?;
    if !beta.iter().all(|v| v.is_finite()) {
        return None;
    }

    let sse = (x * &beta - y).norm_squared();
    Some(LeastSquares { beta, rank, sse })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let fit = solve_least_squares(&x, &y).unwrap();
        assert!((fit.beta[0] - 2.0).abs() < 1e-10);
        assert!((fit.beta[1] - 3.0).abs() < 1e-10);
        assert_eq!(fit.rank, 2);
        assert!(fit.sse < 1e-20);
    }

    #[test]
    fn collinear_columns_report_reduced_rank() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[1.0, 1.0, 1.0]);

        let fit = solve_least_squares(&x, &y).unwrap();
        assert_eq!(fit.rank, 1);
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        let x = DMatrix::from_row_slice(2, 1, &[1.0, f64::NAN]);
        let y = DVector::from_row_slice(&[1.0, 2.0]);
        assert!(solve_least_squares(&x, &y).is_none());
    }
}
