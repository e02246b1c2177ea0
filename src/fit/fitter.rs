//! Nonlinear least squares for a single model kind.
//!
//! Given:
//! - day offsets `x_i`
//! - observed cumulative counts `y_i`
//! - a starting θ
//!
//! we run Levenberg–Marquardt until the relative-offset convergence criterion
//! drops below the tolerance, then derive standard errors from the linearised
//! covariance `σ² (JᵀJ)⁻¹` and the Gaussian log-likelihood.
//!
//! Each damped step is solved as the augmented least-squares problem
//! `[J; √λ D] δ = [r; 0]`, with `D` the Marquardt column scaling.

use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::domain::{FittedModel, ModelKind};
use crate::math::solve_least_squares;
use crate::models::{fill_gradient, predict_all};

/// An SSE below `ZERO_SSE_REL * Σy²` counts as an exact fit.
///
/// The relative-offset criterion is undefined for zero-residual data, so exact
/// fits are detected separately.
const ZERO_SSE_REL: f64 = 1e-20;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// Iteration controls for a single fit.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    pub max_iter: usize,
    /// Relative-offset convergence tolerance.
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tolerance: 1e-5,
        }
    }
}

/// Failures of the numerical core.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// Data that cannot be fitted (too short, non-positive values under a log, ...).
    InvalidInput(String),
    /// No step could reduce the residual sum of squares, or the model produced
    /// non-finite values.
    NonConvergence { reason: String },
    /// The iteration cap was hit before the tolerance was met.
    IterationLimit { iterations: usize, criterion: f64 },
    /// Settings that cannot work for the given data.
    Config(String),
}

impl std::fmt::Display for FitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            FitError::NonConvergence { reason } => write!(f, "fit did not converge: {reason}"),
            FitError::IterationLimit {
                iterations,
                criterion,
            } => write!(
                f,
                "iteration limit of {iterations} reached (convergence criterion {criterion:.3e})"
            ),
            FitError::Config(msg) => write!(f, "configuration error: {msg}"),
        }
    }
}

impl std::error::Error for FitError {}

/// Fit `model` to `(x, y)` starting from `theta0`.
pub fn fit_model(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    theta0: &[f64],
    opts: &FitOptions,
) -> Result<FittedModel, FitError> {
    let n = x.len();
    let p = model.param_count();
    if y.len() != n {
        return Err(FitError::InvalidInput(format!(
            "x has {n} values but y has {}",
            y.len()
        )));
    }
    if n <= p {
        return Err(FitError::InvalidInput(format!(
            "{} needs more than {p} observations, got {n}",
            model.display_name()
        )));
    }
    if theta0.len() != p {
        return Err(FitError::InvalidInput(format!(
            "{} expects {p} starting values, got {}",
            model.display_name(),
            theta0.len()
        )));
    }
    if x.iter().chain(y).chain(theta0).any(|v| !v.is_finite()) {
        return Err(FitError::InvalidInput("non-finite data or starting values".into()));
    }

    let y_vec = DVector::from_row_slice(y);
    let zero_sse = ZERO_SSE_REL * y.iter().map(|v| v * v).sum::<f64>().max(1.0);

    let mut theta = DVector::from_row_slice(theta0);
    let mut mu = evaluate(model, x, theta.as_slice())
        .ok_or_else(|| non_convergence("non-finite model values at the starting point"))?;
    let mut sse = (&y_vec - &mu).norm_squared();
    let mut lambda = LAMBDA_INIT;

    for iter in 0..=opts.max_iter {
        let r = &y_vec - &mu;

        if sse <= zero_sse {
            return Ok(finish(model, x, y, &theta, &mu, sse, iter, 0.0));
        }

        let jac = jacobian(model, x, theta.as_slice())
            .ok_or_else(|| non_convergence("non-finite gradient"))?;
        let criterion = relative_offset(&jac, &r)
            .ok_or_else(|| non_convergence("singular gradient matrix"))?;

        trace!(
            model = model.display_name(),
            iter,
            sse,
            lambda,
            criterion,
            "levenberg-marquardt iteration"
        );

        if criterion < opts.tolerance {
            return Ok(finish(model, x, y, &theta, &mu, sse, iter, criterion));
        }
        if iter == opts.max_iter {
            return Err(FitError::IterationLimit {
                iterations: opts.max_iter,
                criterion,
            });
        }

        let scale = column_scale(&jac);
        loop {
            if let Some(delta) = damped_step(&jac, &r, &scale, lambda) {
                let candidate = &theta + &delta;
                if let Some(mu_c) = evaluate(model, x, candidate.as_slice()) {
                    let sse_c = (&y_vec - &mu_c).norm_squared();
                    if sse_c.is_finite() && sse_c < sse {
                        theta = candidate;
                        mu = mu_c;
                        sse = sse_c;
                        lambda = (lambda / 10.0).max(LAMBDA_MIN);
                        break;
                    }
                }
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Err(non_convergence(&format!(
                    "step size could not reduce the residual sum of squares (criterion {criterion:.3e})"
                )));
            }
        }
    }

    // The loop always returns; `iter == max_iter` is handled inside.
    Err(FitError::IterationLimit {
        iterations: opts.max_iter,
        criterion: f64::NAN,
    })
}

fn non_convergence(reason: &str) -> FitError {
    FitError::NonConvergence {
        reason: reason.to_string(),
    }
}

fn evaluate(model: ModelKind, x: &[f64], theta: &[f64]) -> Option<DVector<f64>> {
    let mu = predict_all(model, x, theta);
    mu.iter()
        .all(|v| v.is_finite())
        .then(|| DVector::from_vec(mu))
}

fn jacobian(model: ModelKind, x: &[f64], theta: &[f64]) -> Option<DMatrix<f64>> {
    let p = model.param_count();
    let mut jac = DMatrix::<f64>::zeros(x.len(), p);
    let mut row = vec![0.0; p];
    for (i, &xi) in x.iter().enumerate() {
        fill_gradient(model, xi, theta, &mut row);
        for j in 0..p {
            jac[(i, j)] = row[j];
        }
    }
    jac.iter().all(|v| v.is_finite()).then_some(jac)
}

/// Relative-offset criterion: size of the residual component lying in the
/// tangent plane relative to the orthogonal component.
fn relative_offset(jac: &DMatrix<f64>, r: &DVector<f64>) -> Option<f64> {
    let delta = solve_least_squares(jac, r)?;
    let tangent = jac * delta;
    let projected = tangent.norm_squared();
    let orthogonal = (r - &tangent).norm_squared();
    if orthogonal > 0.0 {
        Some((projected / orthogonal).sqrt())
    } else if projected == 0.0 {
        Some(0.0)
    } else {
        Some(f64::INFINITY)
    }
}

fn column_scale(jac: &DMatrix<f64>) -> Vec<f64> {
    let norms: Vec<f64> = jac.column_iter().map(|c| c.norm()).collect();
    let floor = norms.iter().copied().fold(0.0, f64::max) * 1e-8;
    norms.into_iter().map(|v| v.max(floor).max(f64::MIN_POSITIVE)).collect()
}

fn damped_step(
    jac: &DMatrix<f64>,
    r: &DVector<f64>,
    scale: &[f64],
    lambda: f64,
) -> Option<DVector<f64>> {
    let n = jac.nrows();
    let p = jac.ncols();
    let sqrt_lambda = lambda.sqrt();

    let mut a = DMatrix::<f64>::zeros(n + p, p);
    a.view_mut((0, 0), (n, p)).copy_from(jac);
    for j in 0..p {
        a[(n + j, j)] = sqrt_lambda * scale[j];
    }
    let mut b = DVector::<f64>::zeros(n + p);
    b.rows_mut(0, n).copy_from(r);

    solve_least_squares(&a, &b)
}

#[allow(clippy::too_many_arguments)]
fn finish(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    theta: &DVector<f64>,
    mu: &DVector<f64>,
    sse: f64,
    iterations: usize,
    criterion: f64,
) -> FittedModel {
    let n = y.len();
    let p = model.param_count();
    let df_residual = n - p;
    let sigma2 = sse / df_residual as f64;

    let std_errors = match jacobian(model, x, theta.as_slice())
        .and_then(|j| (j.transpose() * &j).pseudo_inverse(1e-14).ok())
    {
        Some(inv) => (0..p).map(|j| (sigma2 * inv[(j, j)]).max(0.0).sqrt()).collect(),
        None => vec![f64::NAN; p],
    };

    let fitted: Vec<f64> = mu.iter().copied().collect();
    let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(yi, fi)| yi - fi).collect();

    FittedModel {
        kind: model,
        theta: theta.iter().copied().collect(),
        std_errors,
        fitted,
        residuals,
        sse,
        df_residual,
        log_lik: gaussian_log_lik(sse, n),
        iterations,
        criterion,
    }
}

/// Gaussian log-likelihood with the ML variance estimate `SSE / n`.
///
/// The variance is floored at the smallest positive double so exact fits
/// produce a large finite value instead of `+∞`.
pub fn gaussian_log_lik(sse: f64, n: usize) -> f64 {
    let n_f = n as f64;
    let var = (sse / n_f).max(f64::MIN_POSITIVE);
    -0.5 * n_f * ((2.0 * std::f64::consts::PI).ln() + var.ln() + 1.0)
}
