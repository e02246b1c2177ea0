//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the fit pipeline on a CSV or on synthetic data
//! - prints reports and writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, DemoArgs, FitArgs, ModelArgs};
use crate::domain::{BootstrapConfig, FitConfig, Outcome};
use crate::error::AppError;
use crate::report::ReportMode;

pub mod pipeline;

/// Entry point for the `growth` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is fine; GROWTH_CSV and RUST_LOG may come from the shell.
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args, ReportMode::Full),
        Command::Compare(args) => handle_fit(args, ReportMode::CompareOnly),
        Command::Demo(args) => handle_demo(args),
    }
}

/// Log to stderr so stdout carries only the report.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fit(args: FitArgs, mode: ReportMode) -> Result<(), AppError> {
    let mut config = restrict_to_mode(fit_config_from_args(&args.model)?, mode);
    config.csv_path = args.csv;
    let run = pipeline::run_from_csv(&config)?;
    finish(&run, &config, mode)
}

/// `compare` prints no forecasts, so it skips the horizon and the bootstrap.
fn restrict_to_mode(mut config: FitConfig, mode: ReportMode) -> FitConfig {
    if mode == ReportMode::CompareOnly {
        config.horizon = 0;
        config.bootstrap.replicates = 0;
    }
    config
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args.model)?;
    if args.days == 0 {
        return Err(AppError::new(2, "--days must be positive."));
    }
    let series: Vec<_> = crate::data::demo_dataset(args.days, args.data_seed)?
        .into_iter()
        .filter(|s| config.outcomes.contains(&s.outcome))
        .collect();
    info!(days = args.days, seed = args.data_seed, "generated demo data");
    let run = pipeline::run_pipeline(&series, "demo".to_string(), &config)?;
    finish(&run, &config, ReportMode::Full)
}

fn finish(run: &pipeline::RunOutput, config: &FitConfig, mode: ReportMode) -> Result<(), AppError> {
    println!("{}", crate::report::format_run(run, mode));

    if let Some(path) = &config.export_json {
        crate::io::json::write_run_json(path, run)?;
        info!(path = %path.display(), "wrote run JSON");
    }
    if let Some(path) = &config.export_csv {
        crate::io::export::write_predictions_csv(path, run)?;
        info!(path = %path.display(), "wrote predictions CSV");
    }

    Ok(())
}

/// Validate CLI options and turn them into a pipeline configuration.
pub fn fit_config_from_args(args: &ModelArgs) -> Result<FitConfig, AppError> {
    if !(args.alpha > 0.0 && args.alpha < 1.0) {
        return Err(AppError::new(2, format!("--alpha must be in (0, 1), got {}.", args.alpha)));
    }
    if args.block_len == Some(0) {
        return Err(AppError::new(2, "--block-len must be positive."));
    }
    if !(args.tolerance > 0.0 && args.richards_tolerance > 0.0) {
        return Err(AppError::new(2, "Tolerances must be positive."));
    }
    if args.max_iter == 0 {
        return Err(AppError::new(2, "--max-iter must be positive."));
    }

    let mut outcomes = Vec::new();
    for outcome in &args.outcomes {
        if !outcomes.contains(outcome) {
            outcomes.push(*outcome);
        }
    }
    if outcomes.is_empty() {
        outcomes = Outcome::ALL.to_vec();
    }

    Ok(FitConfig {
        csv_path: None,
        outcomes,
        model_spec: args.model,
        horizon: args.horizon,
        max_iter: args.max_iter,
        tolerance: args.tolerance,
        richards_tolerance: args.richards_tolerance,
        bootstrap: BootstrapConfig {
            replicates: args.replicates,
            block_len: args.block_len,
            alpha: args.alpha,
            seed: args.seed,
        },
        export_json: args.export_json.clone(),
        export_csv: args.export_csv.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn model_args(argv: &[&str]) -> ModelArgs {
        let mut full = vec!["growth", "demo"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Demo(args) => args.model,
            _ => unreachable!(),
        }
    }

    #[test]
    fn config_defaults_to_all_outcomes() {
        let config = fit_config_from_args(&model_args(&[])).unwrap();
        assert_eq!(config.outcomes, Outcome::ALL.to_vec());
        assert_eq!(config.bootstrap.replicates, 500);
        assert_eq!(config.horizon, 14);
    }

    #[test]
    fn repeated_outcomes_are_deduplicated_in_order() {
        let args = model_args(&["--outcome", "recovered", "--outcome", "deaths", "--outcome", "recovered"]);
        let config = fit_config_from_args(&args).unwrap();
        assert_eq!(config.outcomes, vec![Outcome::Recovered, Outcome::Deaths]);
    }

    #[test]
    fn compare_mode_skips_forecasts_and_bootstrap() {
        let config = fit_config_from_args(&model_args(&["--horizon", "10"])).unwrap();

        let compare = restrict_to_mode(config.clone(), ReportMode::CompareOnly);
        assert_eq!(compare.horizon, 0);
        assert_eq!(compare.bootstrap.replicates, 0);

        let full = restrict_to_mode(config, ReportMode::Full);
        assert_eq!(full.horizon, 10);
        assert_eq!(full.bootstrap.replicates, 500);
    }

    #[test]
    fn invalid_settings_are_usage_errors() {
        for argv in [
            &["--alpha", "1.5"][..],
            &["--block-len", "0"][..],
            &["--tolerance", "0"][..],
            &["--max-iter", "0"][..],
        ] {
            let err = fit_config_from_args(&model_args(argv)).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{argv:?}");
        }
    }
}
