//! Shared "fit pipeline" logic used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> per-series fits -> comparison -> predictions + bootstrap bands -> summaries
//!
//! The subcommands can then focus on presentation (which tables to print).

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::{
    BootstrapConfig, BootstrapSummary, CurveSummary, FitConfig, FittedModel, ModelKind, Outcome,
    PredictionFrame, PredictionRow, Series, date_at,
};
use crate::error::AppError;
use crate::fit::{
    ComparisonTable, FitError, FitOptions, StartContext, bootstrap_bands, compare_models, fit_model,
    starting_values,
};
use crate::models::{derivative, peak_x};

/// Stage at which a model failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Fit,
    Bootstrap,
}

/// A (series, model) failure that did not abort the series.
#[derive(Debug, Clone, Serialize)]
pub struct ModelFailure {
    pub model: ModelKind,
    pub stage: FailureStage,
    pub message: String,
}

/// Everything computed for one outcome series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesAnalysis {
    pub outcome: Outcome,
    pub n_obs: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub fits: Vec<FittedModel>,
    pub comparison: ComparisonTable,
    pub predictions: Vec<PredictionFrame>,
    pub summaries: Vec<CurveSummary>,
    pub failures: Vec<ModelFailure>,
}

/// A series on which no model could be fitted.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesFailure {
    pub outcome: Outcome,
    pub message: String,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    /// CSV path, or `demo` for synthetic data.
    pub source: String,
    pub horizon: usize,
    pub analyses: Vec<SeriesAnalysis>,
    pub failed: Vec<SeriesFailure>,
}

/// Ingest the configured CSV and run the pipeline on the requested outcomes.
pub fn run_from_csv(config: &FitConfig) -> Result<RunOutput, AppError> {
    let path = config.csv_path.as_ref().ok_or_else(|| {
        AppError::new(2, "No CSV given: pass --csv <path> or set GROWTH_CSV.")
    })?;
    let ingest = crate::io::ingest::load_series(path, &config.outcomes)?;
    info!(
        path = %path.display(),
        days = ingest.stats.n_days,
        first = %ingest.stats.first_date,
        last = %ingest.stats.last_date,
        "loaded series"
    );
    run_pipeline(&ingest.series, path.display().to_string(), config)
}

/// Analyse each series independently.
///
/// A series on which nothing could be fitted is recorded in `failed`; the run
/// only errors when every series failed.
pub fn run_pipeline(series: &[Series], source: String, config: &FitConfig) -> Result<RunOutput, AppError> {
    let mut analyses = Vec::with_capacity(series.len());
    let mut failed = Vec::new();
    let mut first_error: Option<AppError> = None;

    for s in series {
        match analyze_series(s, config) {
            Ok(analysis) => analyses.push(analysis),
            Err(err) => {
                warn!(outcome = s.outcome.display_name(), error = %err, "series failed");
                failed.push(SeriesFailure {
                    outcome: s.outcome,
                    message: err.message().to_string(),
                });
                first_error.get_or_insert(err);
            }
        }
    }

    if analyses.is_empty() {
        return Err(first_error.unwrap_or_else(|| AppError::new(3, "No series to analyse.")));
    }

    Ok(RunOutput {
        source,
        horizon: config.horizon,
        analyses,
        failed,
    })
}

/// Fit, compare and forecast every requested family on one series.
pub fn analyze_series(series: &Series, config: &FitConfig) -> Result<SeriesAnalysis, AppError> {
    let (Some(first_date), Some(last_date)) = (series.first_date(), series.last_date()) else {
        return Err(AppError::new(3, format!("{} series is empty.", series.outcome.display_name())));
    };
    let x = series.x();
    let y = series.y();
    let n = x.len();
    info!(outcome = series.outcome.display_name(), n, "analysing series");

    let mut ctx = StartContext::default();
    let mut fits = Vec::new();
    let mut failures = Vec::new();
    let mut last_error: Option<FitError> = None;

    for kind in config.model_spec.kinds() {
        let opts = fit_options(config, kind);
        let result = starting_values(kind, &x, &y, &ctx).and_then(|theta0| fit_model(kind, &x, &y, &theta0, &opts));
        match result {
            Ok(fit) => {
                debug!(
                    model = kind.display_name(),
                    iterations = fit.iterations,
                    sse = fit.sse,
                    "fit converged"
                );
                if kind == ModelKind::Logistic {
                    ctx.logistic_asymptote = fit.theta.first().copied();
                }
                fits.push(fit);
            }
            Err(err) => {
                warn!(
                    outcome = series.outcome.display_name(),
                    model = kind.display_name(),
                    error = %err,
                    "fit failed"
                );
                failures.push(ModelFailure {
                    model: kind,
                    stage: FailureStage::Fit,
                    message: err.to_string(),
                });
                last_error = Some(err);
            }
        }
    }

    if fits.is_empty() {
        let err = last_error
            .map(AppError::from)
            .unwrap_or_else(|| AppError::new(2, "No model families selected."));
        return Err(AppError::new(
            err.exit_code(),
            format!("No model could be fitted to {}: {err}", series.outcome.display_name()),
        ));
    }

    let comparison = compare_models(&fits, &y);

    let mut predictions = Vec::with_capacity(fits.len());
    for fit in &fits {
        let frame = predict_frame(series, fit, &x, config, &mut failures);
        predictions.push(frame);
    }

    let summaries = fits.iter().map(|fit| summarize(fit, first_date)).collect();

    Ok(SeriesAnalysis {
        outcome: series.outcome,
        n_obs: n,
        first_date,
        last_date,
        fits,
        comparison,
        predictions,
        summaries,
        failures,
    })
}

fn fit_options(config: &FitConfig, kind: ModelKind) -> FitOptions {
    FitOptions {
        max_iter: config.max_iter,
        tolerance: config.tolerance_for(kind),
    }
}

/// Point predictions for days `1..=n+horizon`, with bounds beyond day `n`.
///
/// A failed bootstrap is recorded and leaves the frame without bounds.
fn predict_frame(
    series: &Series,
    fit: &FittedModel,
    x: &[f64],
    config: &FitConfig,
    failures: &mut Vec<ModelFailure>,
) -> PredictionFrame {
    let n = x.len();
    let first = series.observations[0].date;
    let future_x: Vec<f64> = (n + 1..=n + config.horizon).map(|d| d as f64).collect();

    let bands = if future_x.is_empty() || config.bootstrap.replicates == 0 {
        None
    } else {
        let boot = BootstrapConfig {
            seed: stream_seed(config.bootstrap.seed, series.outcome, fit.kind),
            ..config.bootstrap.clone()
        };
        match bootstrap_bands(fit, x, &future_x, &boot, &fit_options(config, fit.kind)) {
            Ok(bands) => Some(bands),
            Err(err) => {
                warn!(
                    outcome = series.outcome.display_name(),
                    model = fit.kind.display_name(),
                    error = %err,
                    "bootstrap failed"
                );
                failures.push(ModelFailure {
                    model: fit.kind,
                    stage: FailureStage::Bootstrap,
                    message: err.to_string(),
                });
                None
            }
        }
    };

    let rows = (1..=n + config.horizon)
        .map(|day| {
            let (lower, upper) = match &bands {
                Some(b) if day > n => (Some(b.lower[day - n - 1]), Some(b.upper[day - n - 1])),
                _ => (None, None),
            };
            PredictionRow {
                x: day,
                date: date_at(first, day),
                fitted: fit.predict(day as f64),
                lower,
                upper,
            }
        })
        .collect();

    PredictionFrame {
        model: fit.kind,
        level: 1.0 - config.bootstrap.alpha,
        bootstrap: bands.map(|b| BootstrapSummary {
            block_len: b.block_len,
            replicates: b.replicates,
            failed: b.failed,
        }),
        rows,
    }
}

/// Distinct bootstrap seed per (outcome, model) so bands are not correlated
/// across tables.
fn stream_seed(base: u64, outcome: Outcome, kind: ModelKind) -> u64 {
    let o = Outcome::ALL.iter().position(|&v| v == outcome).unwrap_or(0) as u64;
    let k = ModelKind::ALL.iter().position(|&v| v == kind).unwrap_or(0) as u64;
    base.wrapping_add((o * ModelKind::ALL.len() as u64 + k) * 1_000_003)
}

/// Final size, peak day and peak daily increment of a fitted curve.
pub fn summarize(fit: &FittedModel, first_date: NaiveDate) -> CurveSummary {
    let peak = peak_x(fit.kind, &fit.theta);
    CurveSummary {
        model: fit.kind,
        final_size: if fit.kind.is_saturating() {
            fit.theta.first().copied()
        } else {
            None
        },
        peak_x: peak,
        peak_date: peak.and_then(|p| date_near(first_date, p)),
        peak_increment: peak.map(|p| derivative(fit.kind, p, &fit.theta)),
    }
}

/// Calendar date of a fractional day offset, rounded to the nearest day.
///
/// Offsets before day 1 map to dates before `first`.
fn date_near(first: NaiveDate, x: f64) -> Option<NaiveDate> {
    if !x.is_finite() || x.abs() > 1e6 {
        return None;
    }
    let offset = x.round() as i64 - 1;
    if offset >= 0 {
        first.checked_add_days(Days::new(offset as u64))
    } else {
        first.checked_sub_days(Days::new(offset.unsigned_abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::synthetic_series;
    use crate::domain::{ModelSpec, Observation};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 2, 24).unwrap()
    }

    fn quick_config() -> FitConfig {
        FitConfig {
            horizon: 7,
            bootstrap: BootstrapConfig {
                replicates: 60,
                ..BootstrapConfig::default()
            },
            ..FitConfig::default()
        }
    }

    #[test]
    fn bounds_only_beyond_last_observation() {
        let series = synthetic_series(
            Outcome::TotalCases,
            ModelKind::Logistic,
            &[5000.0, 25.0, 4.0],
            45,
            0.01,
            7,
            start(),
        )
        .unwrap();
        let analysis = analyze_series(&series, &quick_config()).unwrap();

        let logistic = analysis
            .predictions
            .iter()
            .find(|p| p.model == ModelKind::Logistic)
            .unwrap();
        assert!(logistic.bootstrap.is_some());
        for frame in analysis.predictions.iter().filter(|p| p.bootstrap.is_some()) {
            assert_eq!(frame.rows.len(), 52);
            for row in &frame.rows {
                assert_eq!(row.lower.is_some(), row.x > 45, "{:?} day {}", frame.model, row.x);
            }
            assert_eq!(frame.rows[0].date, start());
        }
        let votes: usize = analysis.comparison.rows.iter().map(|r| r.votes).sum();
        assert_eq!(votes, 3);
    }

    #[test]
    fn exponential_failure_does_not_abort_series() {
        // A zero count breaks the log-linear start but not the self-starts.
        let mut series = synthetic_series(
            Outcome::Deaths,
            ModelKind::Gompertz,
            &[800.0, 12.0, 0.9],
            40,
            0.0,
            1,
            start(),
        )
        .unwrap();
        series.observations[0].value = 0.0;

        let config = FitConfig {
            horizon: 0,
            ..FitConfig::default()
        };
        let analysis = analyze_series(&series, &config).unwrap();
        assert!(analysis.fits.iter().all(|f| f.kind != ModelKind::Exponential));
        assert_eq!(analysis.failures[0].model, ModelKind::Exponential);
        assert_eq!(analysis.failures[0].stage, FailureStage::Fit);
        assert!(analysis.predictions.iter().all(|p| p.bootstrap.is_none()));
    }

    #[test]
    fn oversized_block_is_recorded_per_model() {
        let series = synthetic_series(
            Outcome::TotalCases,
            ModelKind::Logistic,
            &[5000.0, 25.0, 4.0],
            30,
            0.01,
            3,
            start(),
        )
        .unwrap();
        let mut config = quick_config();
        config.model_spec = ModelSpec::Logistic;
        config.bootstrap.block_len = Some(31);

        let analysis = analyze_series(&series, &config).unwrap();
        assert_eq!(analysis.failures.len(), 1);
        assert_eq!(analysis.failures[0].stage, FailureStage::Bootstrap);
        assert!(analysis.predictions[0].rows.iter().all(|r| r.lower.is_none()));
    }

    #[test]
    fn unfittable_series_is_reported_not_fatal() {
        let good = synthetic_series(
            Outcome::TotalCases,
            ModelKind::Logistic,
            &[5000.0, 25.0, 4.0],
            40,
            0.01,
            5,
            start(),
        )
        .unwrap();
        let tiny = Series {
            outcome: Outcome::Recovered,
            observations: vec![Observation {
                date: start(),
                value: 1.0,
            }],
        };
        let config = FitConfig {
            horizon: 0,
            ..FitConfig::default()
        };

        let run = run_pipeline(&[good, tiny.clone()], "test".into(), &config).unwrap();
        assert_eq!(run.analyses.len(), 1);
        assert_eq!(run.failed.len(), 1);
        assert_eq!(run.failed[0].outcome, Outcome::Recovered);

        let err = run_pipeline(&[tiny], "test".into(), &config).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn logistic_summary_peaks_at_midpoint() {
        let series = synthetic_series(
            Outcome::TotalCases,
            ModelKind::Logistic,
            &[5000.0, 25.0, 4.0],
            45,
            0.0,
            1,
            start(),
        )
        .unwrap();
        let config = FitConfig {
            model_spec: ModelSpec::Logistic,
            horizon: 0,
            ..FitConfig::default()
        };
        let analysis = analyze_series(&series, &config).unwrap();
        let summary = &analysis.summaries[0];
        let peak = summary.peak_x.unwrap();
        assert!((peak - 25.0).abs() < 0.5, "peak {peak}");
        assert_eq!(summary.peak_date, Some(date_at(start(), 25)));
        assert!((summary.final_size.unwrap() - 5000.0).abs() < 50.0);
    }

    #[test]
    fn stream_seeds_differ_across_models() {
        let a = stream_seed(42, Outcome::Deaths, ModelKind::Logistic);
        let b = stream_seed(42, Outcome::Deaths, ModelKind::Gompertz);
        let c = stream_seed(42, Outcome::TotalCases, ModelKind::Logistic);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
