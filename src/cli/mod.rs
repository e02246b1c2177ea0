//! Command-line parsing for the growth-curve fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{ModelSpec, Outcome};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "growth",
    version,
    about = "Growth-curve fitting and bootstrap forecasts for cumulative epidemic counts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit all families, print comparison tables, peaks and predictions.
    Fit(FitArgs),
    /// Print the model comparison tables only.
    Compare(FitArgs),
    /// Run the full pipeline on synthetic first-wave data.
    Demo(DemoArgs),
}

/// Input options for commands that read a CSV.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Daily CSV with a `data`/`date` column and cumulative outcome columns.
    #[arg(long, env = "GROWTH_CSV", value_name = "PATH")]
    pub csv: Option<PathBuf>,

    #[command(flatten)]
    pub model: ModelArgs,
}

/// Options for the synthetic demo.
#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Number of synthetic days per series.
    #[arg(long, default_value_t = 60)]
    pub days: usize,

    /// Seed for the synthetic noise.
    #[arg(long, default_value_t = 2020)]
    pub data_seed: u64,

    #[command(flatten)]
    pub model: ModelArgs,
}

/// Fitting, bootstrap and export options shared by every command.
#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    /// Outcome(s) to analyse; repeat for several (default: all).
    #[arg(long = "outcome", value_enum)]
    pub outcomes: Vec<Outcome>,

    /// Which model(s) to fit.
    #[arg(long, value_enum, default_value_t = ModelSpec::All)]
    pub model: ModelSpec,

    /// Days to forecast past the last observation.
    #[arg(long, default_value_t = 14)]
    pub horizon: usize,

    /// Bootstrap replicates (0 disables prediction bounds).
    #[arg(long, default_value_t = 500)]
    pub replicates: usize,

    /// Residual block length (default: ceil(n^(1/3))).
    #[arg(long)]
    pub block_len: Option<usize>,

    /// Significance level; bounds cover 1 - alpha.
    #[arg(long, default_value_t = 0.05)]
    pub alpha: f64,

    /// Random seed for the bootstrap.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Maximum Levenberg–Marquardt iterations per fit.
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,

    /// Relative-offset convergence tolerance.
    #[arg(long, default_value_t = 1e-5)]
    pub tolerance: f64,

    /// Convergence tolerance for the Richards family.
    #[arg(long, default_value_t = 1e-3)]
    pub richards_tolerance: f64,

    /// Export the whole run (fits, tables, predictions) to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,

    /// Export all prediction frames to CSV.
    #[arg(long = "export-csv")]
    pub export_csv: Option<PathBuf>,
}
