//! Starting values for the nonlinear fits.
//!
//! - exponential: log-linear regression
//! - logistic / Gompertz: self-starting linearisations around an asymptote
//!   guess of `1.05 · max(y)`
//! - Richards: Nelder–Mead on the raw SSE, seeded from the logistic asymptote

use crate::domain::ModelKind;
use crate::fit::fitter::FitError;
use crate::math::{NelderMeadConfig, nelder_mead, simple_regression};
use crate::models::predict;

/// Headroom applied to `max(y)` when guessing an asymptote.
const ASYMPTOTE_HEADROOM: f64 = 1.05;

/// Richards seed for `(rate, shape)`; the asymptote comes from the logistic model.
const RICHARDS_SEED_RATE: f64 = 0.001;
const RICHARDS_SEED_SHAPE: f64 = 1.0;

/// Information from earlier fits of the same series.
#[derive(Debug, Clone, Default)]
pub struct StartContext {
    /// Fitted logistic asymptote, when the logistic fit succeeded.
    pub logistic_asymptote: Option<f64>,
}

/// Initial θ for `model`.
pub fn starting_values(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    ctx: &StartContext,
) -> Result<Vec<f64>, FitError> {
    match model {
        ModelKind::Exponential => exponential_start(x, y),
        ModelKind::Logistic => logistic_start(x, y),
        ModelKind::Gompertz => gompertz_start(x, y),
        ModelKind::Richards => richards_start(x, y, ctx),
    }
}

fn exponential_start(x: &[f64], y: &[f64]) -> Result<Vec<f64>, FitError> {
    if let Some((i, v)) = y.iter().enumerate().find(|(_, v)| **v <= 0.0) {
        return Err(FitError::InvalidInput(format!(
            "log-linear start needs positive counts, found {v} on day {}",
            i + 1
        )));
    }
    let log_y: Vec<f64> = y.iter().map(|v| v.ln()).collect();
    let (intercept, slope) = simple_regression(x, &log_y)
        .ok_or_else(|| FitError::InvalidInput("log-linear regression is degenerate".into()))?;
    Ok(vec![intercept.exp(), slope])
}

/// Points with positive counts, scaled by the asymptote guess into `(0, 1)`.
fn scaled_positive(x: &[f64], y: &[f64]) -> Result<(f64, Vec<f64>, Vec<f64>), FitError> {
    let y_max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(y_max.is_finite() && y_max > 0.0) {
        return Err(FitError::InvalidInput("series has no positive counts".into()));
    }
    let asym = ASYMPTOTE_HEADROOM * y_max;

    let (xs, zs): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(_, v)| **v > 0.0)
        .map(|(&xi, &yi)| (xi, yi / asym))
        .unzip();
    if xs.len() < 2 {
        return Err(FitError::InvalidInput(
            "self-start needs at least two positive counts".into(),
        ));
    }
    Ok((asym, xs, zs))
}

fn logistic_start(x: &[f64], y: &[f64]) -> Result<Vec<f64>, FitError> {
    let (asym, xs, zs) = scaled_positive(x, y)?;
    let logits: Vec<f64> = zs.iter().map(|z| (z / (1.0 - z)).ln()).collect();
    let (intercept, slope) = simple_regression(&xs, &logits)
        .ok_or_else(|| FitError::InvalidInput("logit regression is degenerate".into()))?;
    if !(slope.is_finite() && slope > 0.0) {
        return Err(FitError::InvalidInput(
            "counts are not increasing; logistic self-start failed".into(),
        ));
    }
    Ok(vec![asym, -intercept / slope, 1.0 / slope])
}

fn gompertz_start(x: &[f64], y: &[f64]) -> Result<Vec<f64>, FitError> {
    let (asym, xs, zs) = scaled_positive(x, y)?;
    let loglogs: Vec<f64> = zs.iter().map(|z| (-z.ln()).ln()).collect();
    let (intercept, slope) = simple_regression(&xs, &loglogs)
        .ok_or_else(|| FitError::InvalidInput("log-log regression is degenerate".into()))?;
    if !(slope.is_finite() && slope < 0.0) {
        return Err(FitError::InvalidInput(
            "counts are not increasing; Gompertz self-start failed".into(),
        ));
    }
    Ok(vec![asym, intercept.exp(), slope.exp()])
}

fn richards_start(x: &[f64], y: &[f64], ctx: &StartContext) -> Result<Vec<f64>, FitError> {
    let asym = match ctx.logistic_asymptote {
        Some(a) if a.is_finite() && a > 0.0 => a,
        _ => logistic_start(x, y)?[0],
    };

    let sse = |theta: &[f64]| -> f64 {
        x.iter()
            .zip(y)
            .map(|(&xi, &yi)| {
                let r = yi - predict(ModelKind::Richards, xi, theta);
                r * r
            })
            .sum()
    };
    let seed = [asym, RICHARDS_SEED_RATE, RICHARDS_SEED_SHAPE];
    let result = nelder_mead(sse, &seed, NelderMeadConfig::default());
    if !result.optimal_value.is_finite() {
        return Err(FitError::NonConvergence {
            reason: "Richards starting-value search found no finite SSE".into(),
        });
    }
    Ok(result.optimal_point)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days(n: usize) -> Vec<f64> {
        (1..=n).map(|i| i as f64).collect()
    }

    #[test]
    fn exponential_start_is_exact_on_exponential_data() {
        let x = days(8);
        let y: Vec<f64> = x.iter().map(|t| 3.0 * (0.4 * t).exp()).collect();
        let theta = starting_values(ModelKind::Exponential, &x, &y, &StartContext::default()).unwrap();
        assert!((theta[0] - 3.0).abs() < 1e-9);
        assert!((theta[1] - 0.4).abs() < 1e-12);
    }

    #[test]
    fn exponential_start_rejects_zero_counts() {
        let x = days(4);
        let err = starting_values(
            ModelKind::Exponential,
            &x,
            &[0.0, 1.0, 2.0, 4.0],
            &StartContext::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(msg) if msg.contains("day 1")));
    }

    #[test]
    fn logistic_start_lands_near_truth() {
        let truth = [1000.0, 30.0, 5.0];
        let x = days(60);
        let y: Vec<f64> = x.iter().map(|&t| predict(ModelKind::Logistic, t, &truth)).collect();
        let theta = starting_values(ModelKind::Logistic, &x, &y, &StartContext::default()).unwrap();
        assert!(theta[0] > 990.0 && theta[0] < 1100.0);
        assert!((theta[1] - 30.0).abs() < 5.0, "xmid0 = {}", theta[1]);
        assert!(theta[2] > 0.0);
    }

    #[test]
    fn gompertz_start_has_decay_base_below_one() {
        let truth = [2000.0, 10.0, 0.9];
        let x = days(50);
        let y: Vec<f64> = x.iter().map(|&t| predict(ModelKind::Gompertz, t, &truth)).collect();
        let theta = starting_values(ModelKind::Gompertz, &x, &y, &StartContext::default()).unwrap();
        assert!(theta[2] > 0.0 && theta[2] < 1.0);
        assert!(theta[1] > 0.0);
    }

    #[test]
    fn richards_start_reduces_sse_from_seed() {
        let truth = [1000.0, 0.08, 6.0];
        let x = days(70);
        let y: Vec<f64> = x.iter().map(|&t| predict(ModelKind::Richards, t, &truth)).collect();
        let ctx = StartContext {
            logistic_asymptote: Some(1000.0),
        };
        let theta = starting_values(ModelKind::Richards, &x, &y, &ctx).unwrap();

        let sse = |th: &[f64]| -> f64 {
            x.iter()
                .zip(&y)
                .map(|(&t, &v)| (v - predict(ModelKind::Richards, t, th)).powi(2))
                .sum()
        };
        let seed_sse = sse(&[1000.0, RICHARDS_SEED_RATE, RICHARDS_SEED_SHAPE]);
        assert!(sse(&theta) < 1e-3 * seed_sse);
    }
}
