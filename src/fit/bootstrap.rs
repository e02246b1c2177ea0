//! Moving Block Bootstrap prediction intervals.
//!
//! Delta-method intervals for these growth curves are unreliable when
//! extrapolating, so forecast bands come from resampling residual blocks:
//!
//! 1. residuals of the fitted model are centred and rescaled by `sqrt(n / (n - p))`
//! 2. each replicate concatenates randomly chosen blocks of `ℓ` contiguous
//!    residuals into a path of length `n + h`
//! 3. the first `n` values perturb the fitted curve and θ is refitted from θ̂
//! 4. the forecast at future step `f` is `μ(x_f, θ*) + r*[n + f]`
//! 5. the band is the empirical `[α/2, 1 - α/2]` quantile range per future x
//!
//! Replicates are independent and run on the rayon pool; each one seeds its own
//! RNG, so results do not depend on scheduling.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::domain::{BootstrapConfig, FittedModel};
use crate::fit::fitter::{FitError, FitOptions, fit_model};
use crate::math::{mean, quantile};
use crate::models::predict;

/// Spreads replicate indices across the seed space.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Bootstrap bands at the requested future x values.
#[derive(Debug, Clone)]
pub struct BootstrapBands {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub block_len: usize,
    pub replicates: usize,
    pub failed: usize,
}

/// Default block length `ceil(n^(1/3))`.
pub fn default_block_len(n: usize) -> usize {
    ((n as f64).cbrt().ceil() as usize).max(1)
}

/// Concatenate randomly started blocks of `block_len` contiguous residuals
/// until `len` values are collected.
///
/// # Panics
/// Panics if `block_len` is zero or exceeds `residuals.len()`; callers validate
/// this first.
pub fn resample_blocks<R: Rng + ?Sized>(
    residuals: &[f64],
    block_len: usize,
    len: usize,
    rng: &mut R,
) -> Vec<f64> {
    let max_start = residuals.len() - block_len;
    let mut out = Vec::with_capacity(len + block_len);
    while out.len() < len {
        let start = rng.gen_range(0..=max_start);
        out.extend_from_slice(&residuals[start..start + block_len]);
    }
    out.truncate(len);
    out
}

/// Prediction bands for `fit` at `future_x`, refitting on every replicate.
pub fn bootstrap_bands(
    fit: &FittedModel,
    x: &[f64],
    future_x: &[f64],
    config: &BootstrapConfig,
    opts: &FitOptions,
) -> Result<BootstrapBands, FitError> {
    let n = fit.n();
    let p = fit.kind.param_count();
    if x.len() != n {
        return Err(FitError::InvalidInput(format!(
            "bootstrap got {} x values for {n} residuals",
            x.len()
        )));
    }
    if config.replicates == 0 {
        return Err(FitError::Config("bootstrap needs at least one replicate".into()));
    }
    if !(config.alpha > 0.0 && config.alpha < 1.0) {
        return Err(FitError::Config(format!(
            "alpha must be in (0, 1), got {}",
            config.alpha
        )));
    }
    let block_len = config.block_len.unwrap_or_else(|| default_block_len(n));
    if block_len == 0 {
        return Err(FitError::Config("block length must be positive".into()));
    }
    if n < block_len {
        return Err(FitError::Config(format!(
            "series has {n} observations, fewer than the block length {block_len}"
        )));
    }
    if n <= p {
        return Err(FitError::InvalidInput(format!(
            "{n} observations leave no residual degrees of freedom"
        )));
    }

    let residuals = scaled_residuals(&fit.residuals, p);
    let h = future_x.len();

    let forecasts: Vec<Option<Vec<f64>>> = (0..config.replicates)
        .into_par_iter()
        .map(|b| {
            let seed = config.seed.wrapping_add((b as u64 + 1).wrapping_mul(SEED_STRIDE));
            let mut rng = StdRng::seed_from_u64(seed);
            let path = resample_blocks(&residuals, block_len, n + h, &mut rng);

            let y_star: Vec<f64> = fit.fitted.iter().zip(&path).map(|(m, r)| m + r).collect();
            match fit_model(fit.kind, x, &y_star, &fit.theta, opts) {
                Ok(refit) => Some(
                    future_x
                        .iter()
                        .zip(&path[n..])
                        .map(|(&xf, r)| predict(fit.kind, xf, &refit.theta) + r)
                        .collect(),
                ),
                Err(err) => {
                    debug!(model = fit.kind.display_name(), replicate = b, %err, "bootstrap refit failed");
                    None
                }
            }
        })
        .collect();

    let ok: Vec<Vec<f64>> = forecasts
        .into_iter()
        .flatten()
        .filter(|f| f.iter().all(|v| v.is_finite()))
        .collect();
    let failed = config.replicates - ok.len();
    if failed > 0 {
        warn!(
            model = fit.kind.display_name(),
            failed,
            replicates = config.replicates,
            "some bootstrap refits failed"
        );
    }
    if ok.len() * 2 < config.replicates {
        return Err(FitError::NonConvergence {
            reason: format!(
                "only {} of {} bootstrap refits converged",
                ok.len(),
                config.replicates
            ),
        });
    }

    let lo_p = config.alpha / 2.0;
    let hi_p = 1.0 - config.alpha / 2.0;
    let mut lower = Vec::with_capacity(h);
    let mut upper = Vec::with_capacity(h);
    for f in 0..h {
        let values: Vec<f64> = ok.iter().map(|row| row[f]).collect();
        lower.push(quantile(&values, lo_p));
        upper.push(quantile(&values, hi_p));
    }

    Ok(BootstrapBands {
        lower,
        upper,
        block_len,
        replicates: config.replicates,
        failed,
    })
}

/// Centre residuals and inflate them for the degrees of freedom used by the fit.
fn scaled_residuals(residuals: &[f64], p: usize) -> Vec<f64> {
    let n = residuals.len();
    let centre = mean(residuals).unwrap_or(0.0);
    let inflate = (n as f64 / (n - p) as f64).sqrt();
    residuals.iter().map(|r| (r - centre) * inflate).collect()
}
