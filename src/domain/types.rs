//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV for external report renderers

use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Cumulative outcome series that the pipeline analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Total infected (cumulative confirmed cases).
    TotalCases,
    Deaths,
    Recovered,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::TotalCases, Outcome::Deaths, Outcome::Recovered];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Outcome::TotalCases => "Total infected",
            Outcome::Deaths => "Deceased",
            Outcome::Recovered => "Recovered",
        }
    }

    /// Accepted CSV header names, Italian civil-protection naming first.
    pub fn column_aliases(self) -> &'static [&'static str] {
        match self {
            Outcome::TotalCases => &["totale_casi", "total_cases"],
            Outcome::Deaths => &["deceduti", "deaths"],
            Outcome::Recovered => &["dimessi_guariti", "recovered"],
        }
    }
}

/// Which model(s) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSpec {
    All,
    Exponential,
    Logistic,
    Gompertz,
    Richards,
}

impl ModelSpec {
    /// Concrete families to fit, always in `ModelKind::ALL` order.
    pub fn kinds(self) -> Vec<ModelKind> {
        match self {
            ModelSpec::All => ModelKind::ALL.to_vec(),
            ModelSpec::Exponential => vec![ModelKind::Exponential],
            ModelSpec::Logistic => vec![ModelKind::Logistic],
            ModelSpec::Gompertz => vec![ModelKind::Gompertz],
            ModelSpec::Richards => vec![ModelKind::Richards],
        }
    }
}

/// Concrete growth-curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Exponential,
    Logistic,
    Gompertz,
    Richards,
}

impl ModelKind {
    /// Fitting order. Richards is last because its starting values reuse the
    /// logistic asymptote.
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Exponential,
        ModelKind::Logistic,
        ModelKind::Gompertz,
        ModelKind::Richards,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Exponential => "Exponential",
            ModelKind::Logistic => "Logistic",
            ModelKind::Gompertz => "Gompertz",
            ModelKind::Richards => "Richards",
        }
    }

    /// Number of mean-function parameters (θ length).
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Exponential => 2,
            ModelKind::Logistic | ModelKind::Gompertz | ModelKind::Richards => 3,
        }
    }

    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Exponential => &["a", "b"],
            ModelKind::Logistic => &["asym", "xmid", "scal"],
            ModelKind::Gompertz => &["asym", "b2", "b3"],
            ModelKind::Richards => &["asym", "rate", "shape"],
        }
    }

    /// Whether θ1 is an upper asymptote (final size).
    pub fn is_saturating(self) -> bool {
        !matches!(self, ModelKind::Exponential)
    }
}

/// One reporting day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

/// A daily cumulative series for one outcome.
///
/// Observations are contiguous days in increasing order; `x` is the 1-based
/// day offset from the first observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub outcome: Outcome,
    pub observations: Vec<Observation>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn x(&self) -> Vec<f64> {
        (1..=self.observations.len()).map(|i| i as f64).collect()
    }

    pub fn y(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }
}

/// Calendar date of day `x` (1-based) for a series starting at `first`.
pub fn date_at(first: NaiveDate, x: usize) -> NaiveDate {
    first
        .checked_add_days(Days::new(x.saturating_sub(1) as u64))
        .unwrap_or(first)
}

/// Fitted model parameters and diagnostics for one (series, family) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    pub kind: ModelKind,
    pub theta: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub fitted: Vec<f64>,
    pub residuals: Vec<f64>,
    pub sse: f64,
    /// Residual degrees of freedom `n - |θ|`.
    pub df_residual: usize,
    pub log_lik: f64,
    pub iterations: usize,
    /// Final value of the convergence criterion.
    pub criterion: f64,
}

impl FittedModel {
    pub fn n(&self) -> usize {
        self.residuals.len()
    }

    /// Residual standard error.
    pub fn sigma(&self) -> f64 {
        if self.df_residual == 0 {
            return f64::NAN;
        }
        (self.sse / self.df_residual as f64).sqrt()
    }

    pub fn predict(&self, x: f64) -> f64 {
        crate::models::predict(self.kind, x, &self.theta)
    }
}

/// One row of a prediction frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRow {
    pub x: usize,
    pub date: NaiveDate,
    pub fitted: f64,
    /// Bootstrap bounds; only present beyond the last observed day.
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// Bookkeeping for the bootstrap that produced a frame's bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapSummary {
    pub block_len: usize,
    pub replicates: usize,
    pub failed: usize,
}

/// Point and interval predictions of one fitted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionFrame {
    pub model: ModelKind,
    /// Nominal coverage of the bounds (`1 - alpha`).
    pub level: f64,
    pub rows: Vec<PredictionRow>,
    pub bootstrap: Option<BootstrapSummary>,
}

/// Peak and final-size summary derived from a fitted curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveSummary {
    pub model: ModelKind,
    pub final_size: Option<f64>,
    pub peak_x: Option<f64>,
    pub peak_date: Option<NaiveDate>,
    /// Daily increment at the peak.
    pub peak_increment: Option<f64>,
}

/// Bootstrap settings.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub replicates: usize,
    /// Residual block length; `None` means `ceil(n^(1/3))`.
    pub block_len: Option<usize>,
    pub alpha: f64,
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            replicates: 500,
            block_len: None,
            alpha: 0.05,
            seed: 42,
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub csv_path: Option<PathBuf>,
    pub outcomes: Vec<Outcome>,
    pub model_spec: ModelSpec,
    /// Days forecast past the last observation.
    pub horizon: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    /// Looser tolerance for the Richards family, whose loss surface is flat.
    pub richards_tolerance: f64,
    pub bootstrap: BootstrapConfig,
    pub export_json: Option<PathBuf>,
    pub export_csv: Option<PathBuf>,
}

impl FitConfig {
    pub fn tolerance_for(&self, kind: ModelKind) -> f64 {
        match kind {
            ModelKind::Richards => self.richards_tolerance,
            _ => self.tolerance,
        }
    }
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            outcomes: Outcome::ALL.to_vec(),
            model_spec: ModelSpec::All,
            horizon: 14,
            max_iter: 200,
            tolerance: 1e-5,
            richards_tolerance: 1e-3,
            bootstrap: BootstrapConfig::default(),
            export_json: None,
            export_csv: None,
        }
    }
}
