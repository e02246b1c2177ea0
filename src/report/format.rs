//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::{RunOutput, SeriesAnalysis};
use crate::domain::{CurveSummary, FittedModel, PredictionFrame};
use crate::fit::Criterion;

/// Which sections of each series report to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// Comparison, parameters, peaks and forecasts.
    Full,
    /// Comparison tables only.
    CompareOnly,
}

/// Format a whole run.
pub fn format_run(run: &RunOutput, mode: ReportMode) -> String {
    let mut out = String::new();

    out.push_str("=== growth - cumulative growth-curve fit ===\n");
    out.push_str(&format!("Source: {}\n", run.source));
    if mode == ReportMode::Full {
        out.push_str(&format!("Horizon: {} days\n", run.horizon));
    }
    out.push('\n');

    for analysis in &run.analyses {
        out.push_str(&format_analysis(analysis, mode));
        out.push('\n');
    }
    for failed in &run.failed {
        out.push_str(&format!(
            "(skipped {}) {}\n",
            failed.outcome.display_name(),
            failed.message
        ));
    }

    out
}

/// Format one series report.
pub fn format_analysis(analysis: &SeriesAnalysis, mode: ReportMode) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "## {} | n={} | {} .. {}\n\n",
        analysis.outcome.display_name(),
        analysis.n_obs,
        analysis.first_date,
        analysis.last_date,
    ));
    out.push_str(&format_comparison(analysis));

    if mode == ReportMode::Full {
        out.push_str("\nParameters:\n");
        for fit in &analysis.fits {
            out.push_str(&format_parameters(fit));
        }

        out.push_str("\nPeak and final size:\n");
        for summary in &analysis.summaries {
            out.push_str(&format_summary(summary));
        }

        for frame in &analysis.predictions {
            out.push('\n');
            out.push_str(&format_forecast(frame, analysis.n_obs));
        }
    }

    for failure in &analysis.failures {
        out.push_str(&format!(
            "  ({} failed at {:?}) {}\n",
            failure.model.display_name(),
            failure.stage,
            failure.message
        ));
    }

    out
}

/// Comparison table with vote markers.
pub fn format_comparison(analysis: &SeriesAnalysis) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<12} {:>12} {:>3} {:>8} {:>12} {:>12} {:>12} {:<3}\n",
            "model", "logLik", "df", "R2", "AIC", "AICc", "BIC", ""
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<12} {:-<12} {:-<3} {:-<8} {:-<12} {:-<12} {:-<12}\n",
            "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for row in &analysis.comparison.rows {
        out.push_str(
            format!(
                "{:<12} {:>12.3} {:>3} {:>8.5} {:>12} {:>12} {:>12} {:<3}\n",
                row.model.display_name(),
                row.log_lik,
                row.df,
                row.r_squared,
                fmt_criterion(row.aic),
                fmt_criterion(row.aicc),
                fmt_criterion(row.bic),
                row.marker,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    let best: Vec<String> = Criterion::ALL
        .iter()
        .filter_map(|&c| {
            analysis
                .comparison
                .best_by(c)
                .map(|m| format!("{}={}", c.display_name(), m.display_name()))
        })
        .collect();
    out.push_str(&format!("Best: {}\n", best.join(", ")));

    out
}

fn format_parameters(fit: &FittedModel) -> String {
    let parts: Vec<String> = fit
        .kind
        .param_names()
        .iter()
        .zip(fit.theta.iter().zip(&fit.std_errors))
        .map(|(name, (v, se))| format!("{name}={} (se {})", fmt_num(*v), fmt_num(*se)))
        .collect();
    format!(
        "- {:<12} {} | sigma={} | iter={}\n",
        fit.kind.display_name(),
        parts.join(", "),
        fmt_num(fit.sigma()),
        fit.iterations
    )
}

fn format_summary(summary: &CurveSummary) -> String {
    let final_size = summary
        .final_size
        .map(fmt_num)
        .unwrap_or_else(|| "unbounded".to_string());
    let peak = match (summary.peak_x, summary.peak_date, summary.peak_increment) {
        (Some(x), Some(date), Some(inc)) => format!("day {x:.1} ({date}), {} per day", fmt_num(inc)),
        (Some(x), _, _) => format!("day {x:.1}"),
        _ => "none".to_string(),
    };
    format!(
        "- {:<12} final size {} | peak {}\n",
        summary.model.display_name(),
        final_size,
        peak
    )
}

/// Forecast rows (beyond day `n_obs`) of one prediction frame.
pub fn format_forecast(frame: &PredictionFrame, n_obs: usize) -> String {
    let mut out = String::new();
    let level = frame.level * 100.0;
    match &frame.bootstrap {
        Some(b) => out.push_str(&format!(
            "{} forecast ({level:.0}% MBB, B={}, block={}, failed={}):\n",
            frame.model.display_name(),
            b.replicates,
            b.block_len,
            b.failed
        )),
        None => out.push_str(&format!("{} forecast (no bounds):\n", frame.model.display_name())),
    }

    out.push_str(format!("{:>5} {:<10} {:>14} {:>14} {:>14}\n", "x", "date", "fitted", "lower", "upper").trim_end());
    out.push('\n');
    for row in frame.rows.iter().filter(|r| r.x > n_obs) {
        out.push_str(
            format!(
                "{:>5} {:<10} {:>14} {:>14} {:>14}\n",
                row.x,
                row.date,
                fmt_num(row.fitted),
                row.lower.map(fmt_num).unwrap_or_default(),
                row.upper.map(fmt_num).unwrap_or_default(),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_criterion(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.3}")
    } else {
        "Inf".to_string()
    }
}

/// Plain decimals for counts, scientific notation for tiny or huge values.
fn fmt_num(v: f64) -> String {
    let a = v.abs();
    if !v.is_finite() {
        format!("{v}")
    } else if a != 0.0 && (a < 1e-3 || a >= 1e9) {
        format!("{v:.4e}")
    } else {
        format!("{v:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::analyze_series;
    use crate::data::synthetic::synthetic_series;
    use crate::domain::{FitConfig, ModelKind, Outcome};
    use chrono::NaiveDate;

    fn analysis() -> SeriesAnalysis {
        let start = NaiveDate::from_ymd_opt(2020, 2, 24).unwrap();
        let series = synthetic_series(
            Outcome::TotalCases,
            ModelKind::Logistic,
            &[10_000.0, 25.0, 5.0],
            40,
            0.01,
            8,
            start,
        )
        .unwrap();
        let config = FitConfig {
            horizon: 2,
            bootstrap: crate::domain::BootstrapConfig {
                replicates: 0,
                ..Default::default()
            },
            ..FitConfig::default()
        };
        analyze_series(&series, &config).unwrap()
    }

    #[test]
    fn comparison_lists_every_fit_and_three_winners() {
        let a = analysis();
        let text = format_comparison(&a);
        for fit in &a.fits {
            assert!(text.contains(fit.kind.display_name()));
        }
        assert!(text.contains("Best: AIC="));
        assert!(text.contains("AICc="));
        assert!(text.contains('*'));
    }

    #[test]
    fn compare_mode_omits_forecasts() {
        let a = analysis();
        let compact = format_analysis(&a, ReportMode::CompareOnly);
        let full = format_analysis(&a, ReportMode::Full);
        assert!(!compact.contains("forecast"));
        assert!(full.contains("forecast (no bounds)"));
        assert!(full.contains("2020-04-04"));
    }

    #[test]
    fn numbers_switch_to_scientific_at_extremes() {
        assert_eq!(fmt_num(12.5), "12.5000");
        assert_eq!(fmt_num(0.0), "0.0000");
        assert!(fmt_num(1e-6).contains('e'));
        assert_eq!(fmt_criterion(f64::INFINITY), "Inf");
    }
}
