//! Linear least squares.
//!
//! Two places need a small linear solve:
//!
//! ```text
//! minimize ‖y - X β‖²
//! ```
//!
//! - the log-linear / logit regressions behind the starting-value heuristics
//! - every damped Levenberg–Marquardt step, posed as an augmented least-squares
//!   problem `[J; √λ D] δ = [r; 0]`
//!
//! SVD is used throughout: the design matrices are tall, and nalgebra's
//! `QR::solve` is intended for square systems.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Ordinary least squares of `y` on `x` with an intercept.
///
/// Returns `(intercept, slope)`, or `None` for fewer than two points or a
/// constant `x`.
pub fn simple_regression(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let x_min = x.iter().copied().fold(f64::INFINITY, f64::min);
    let x_max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(x_max > x_min) {
        return None;
    }

    let design = DMatrix::from_fn(n, 2, |i, j| if j == 0 { 1.0 } else { x[i] });
    let rhs = DVector::from_row_slice(&y[..n]);
    let beta = solve_least_squares(&design, &rhs)?;
    Some((beta[0], beta[1]))
}
