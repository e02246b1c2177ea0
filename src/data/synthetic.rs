//! Synthetic cumulative series drawn from a known growth curve plus Gaussian noise.
//!
//! Used by `growth demo` and by tests that need data with a known generating θ.

use chrono::NaiveDate;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{ModelKind, Observation, Outcome, Series, date_at};
use crate::error::AppError;
use crate::models::predict;

/// `μ(x, θ) + ε` with `ε ~ N(0, noise_sd²)` i.i.d., one draw per x.
pub fn noisy_curve(
    model: ModelKind,
    theta: &[f64],
    x: &[f64],
    noise_sd: f64,
    seed: u64,
) -> Result<Vec<f64>, AppError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, noise_sd)
        .map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))?;
    Ok(x.iter()
        .map(|&xi| predict(model, xi, theta) + normal.sample(&mut rng))
        .collect())
}

/// A daily cumulative series of `n_days` starting at `start`.
///
/// Noise is relative (`noise_rel · μ`), values are rounded to whole counts and
/// forced non-decreasing, like a real cumulative register.
pub fn synthetic_series(
    outcome: Outcome,
    model: ModelKind,
    theta: &[f64],
    n_days: usize,
    noise_rel: f64,
    seed: u64,
    start: NaiveDate,
) -> Result<Series, AppError> {
    if !(noise_rel.is_finite() && noise_rel >= 0.0) {
        return Err(AppError::new(2, "Relative noise must be finite and >= 0."));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut running = 0.0_f64;
    let mut observations = Vec::with_capacity(n_days);
    for day in 1..=n_days {
        let mu = predict(model, day as f64, theta);
        if !mu.is_finite() {
            return Err(AppError::new(4, "Non-finite value while generating synthetic series."));
        }
        let noisy = (mu * (1.0 + noise_rel * normal.sample(&mut rng))).round().max(0.0);
        running = running.max(noisy);
        observations.push(Observation {
            date: date_at(start, day),
            value: running,
        });
    }

    Ok(Series {
        outcome,
        observations,
    })
}

/// Three outcome series shaped like a first epidemic wave.
pub fn demo_dataset(n_days: usize, seed: u64) -> Result<Vec<Series>, AppError> {
    let start = NaiveDate::from_ymd_opt(2020, 2, 24)
        .ok_or_else(|| AppError::new(4, "Invalid demo start date."))?;

    let specs: [(Outcome, ModelKind, [f64; 3]); 3] = [
        (Outcome::TotalCases, ModelKind::Logistic, [240_000.0, 42.0, 9.0]),
        (Outcome::Deaths, ModelKind::Gompertz, [34_000.0, 28.0, 0.94]),
        (Outcome::Recovered, ModelKind::Richards, [190_000.0, 0.03, 9.0]),
    ];

    specs
        .iter()
        .enumerate()
        .map(|(i, (outcome, model, theta))| {
            synthetic_series(*outcome, *model, theta, n_days, 0.01, seed.wrapping_add(i as u64), start)
        })
        .collect()
}
