use std::io::Write;

use chrono::NaiveDate;
use growth_curves::app::pipeline::{run_from_csv, run_pipeline};
use growth_curves::data::demo_dataset;
use growth_curves::domain::{BootstrapConfig, FitConfig, ModelKind, ModelSpec, Outcome, date_at};
use growth_curves::fit::Criterion;
use growth_curves::models::predict;

fn light_config() -> FitConfig {
    FitConfig {
        horizon: 5,
        bootstrap: BootstrapConfig {
            replicates: 50,
            ..BootstrapConfig::default()
        },
        ..FitConfig::default()
    }
}

#[test]
fn demo_run_covers_every_outcome_with_three_votes() {
    let series = demo_dataset(60, 2020).unwrap();
    let run = run_pipeline(&series, "demo".into(), &light_config()).unwrap();

    assert_eq!(run.analyses.len(), 3);
    assert!(run.failed.is_empty());
    for analysis in &run.analyses {
        let votes: usize = analysis.comparison.rows.iter().map(|r| r.votes).sum();
        assert_eq!(votes, 3, "{:?}", analysis.outcome);
        for criterion in Criterion::ALL {
            assert!(analysis.comparison.best_by(criterion).is_some());
        }
        for frame in &analysis.predictions {
            assert_eq!(frame.rows.len(), 65);
            assert!(frame.rows[..60].iter().all(|r| r.lower.is_none()));
        }
    }
}

#[test]
fn saturating_data_prefers_a_saturating_family() {
    let series = demo_dataset(60, 7).unwrap();
    let config = FitConfig {
        horizon: 0,
        ..FitConfig::default()
    };
    let run = run_pipeline(&series[..1], "demo".into(), &config).unwrap();
    let best = run.analyses[0].comparison.best_by(Criterion::Bic).unwrap();
    assert_ne!(best, ModelKind::Exponential);
}

#[test]
fn csv_to_forecast_end_to_end() {
    let start = NaiveDate::from_ymd_opt(2020, 2, 24).unwrap();
    let theta = [4000.0, 22.0, 4.5];

    let dir = std::env::temp_dir().join(format!("growth-curves-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("dpc.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "data,stato,totale_casi,deceduti").unwrap();
    for day in 1..=40usize {
        let cases = predict(ModelKind::Logistic, day as f64, &theta).round();
        let deaths = (cases * 0.1).round();
        writeln!(file, "{}T18:00:00,ITA,{cases},{deaths}", date_at(start, day)).unwrap();
    }
    drop(file);

    let config = FitConfig {
        csv_path: Some(path.clone()),
        outcomes: vec![Outcome::TotalCases],
        model_spec: ModelSpec::Logistic,
        ..light_config()
    };
    let run = run_from_csv(&config).unwrap();
    std::fs::remove_dir_all(&dir).ok();

    let analysis = &run.analyses[0];
    assert_eq!(analysis.outcome, Outcome::TotalCases);
    assert_eq!(analysis.first_date, start);
    let fit = &analysis.fits[0];
    assert!((fit.theta[0] - 4000.0).abs() < 5.0);
    assert!((fit.theta[1] - 22.0).abs() < 0.05);

    let frame = &analysis.predictions[0];
    let last = frame.rows.last().unwrap();
    assert_eq!(last.x, 45);
    let (lo, hi) = (last.lower.unwrap(), last.upper.unwrap());
    assert!(lo <= last.fitted + 1.0 && last.fitted - 1.0 <= hi);
}

#[test]
fn missing_csv_is_a_usage_error() {
    let config = FitConfig {
        csv_path: None,
        ..FitConfig::default()
    };
    assert_eq!(run_from_csv(&config).unwrap_err().exit_code(), 2);
}
