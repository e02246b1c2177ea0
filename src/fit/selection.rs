//! Model comparison across the families fitted to one series.
//!
//! For every fitted model we compute:
//! - logLik under i.i.d. Gaussian residuals (ML variance)
//! - k = |θ| + 1 (the error variance is counted as a parameter)
//! - R² = squared Pearson correlation between observed and fitted values
//! - AIC  = -2 logLik + 2k
//! - AICc = AIC + 2k(k+1) / (n - k - 1)
//! - BIC  = -2 logLik + k ln(n)
//!
//! Each criterion votes for its minimising model; ties go to the earliest family
//! in fit order, so exactly three votes are cast per table.

use serde::{Deserialize, Serialize};

use crate::domain::{FittedModel, ModelKind};
use crate::math::pearson;

/// Information criterion used for model selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Aic,
    Aicc,
    Bic,
}

impl Criterion {
    pub const ALL: [Criterion; 3] = [Criterion::Aic, Criterion::Aicc, Criterion::Bic];

    pub fn display_name(self) -> &'static str {
        match self {
            Criterion::Aic => "AIC",
            Criterion::Aicc => "AICc",
            Criterion::Bic => "BIC",
        }
    }
}

/// One row of the comparison table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub model: ModelKind,
    pub log_lik: f64,
    /// Parameters counted by the information criteria (θ plus error variance).
    pub df: usize,
    pub r_squared: f64,
    pub aic: f64,
    pub aicc: f64,
    pub bic: f64,
    pub sse: f64,
    /// Residual standard error.
    pub sigma: f64,
    /// Number of criteria (0..=3) selecting this model.
    pub votes: usize,
    pub marker: String,
}

impl ComparisonRow {
    pub fn value(&self, criterion: Criterion) -> f64 {
        match criterion {
            Criterion::Aic => self.aic,
            Criterion::Aicc => self.aicc,
            Criterion::Bic => self.bic,
        }
    }
}

/// Comparison of all fitted models for one series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub rows: Vec<ComparisonRow>,
    /// Winner per criterion, in `Criterion::ALL` order.
    pub best: Vec<(Criterion, ModelKind)>,
}

impl ComparisonTable {
    pub fn best_by(&self, criterion: Criterion) -> Option<ModelKind> {
        self.best
            .iter()
            .find(|(c, _)| *c == criterion)
            .map(|(_, m)| *m)
    }
}

/// Build the comparison table for models fitted to the same observations `y`.
pub fn compare_models(fits: &[FittedModel], y: &[f64]) -> ComparisonTable {
    let mut rows: Vec<ComparisonRow> = fits
        .iter()
        .map(|fit| {
            let n = fit.n();
            let k = fit.kind.param_count() + 1;
            let aic = aic(fit.log_lik, k);
            ComparisonRow {
                model: fit.kind,
                log_lik: fit.log_lik,
                df: k,
                r_squared: pearson(y, &fit.fitted).powi(2),
                aic,
                aicc: aicc(aic, n, k),
                bic: bic(fit.log_lik, n, k),
                sse: fit.sse,
                sigma: fit.sigma(),
                votes: 0,
                marker: String::new(),
            }
        })
        .collect();

    let mut best = Vec::new();
    for criterion in Criterion::ALL {
        if let Some(idx) = argmin(rows.iter().map(|r| r.value(criterion))) {
            rows[idx].votes += 1;
            best.push((criterion, rows[idx].model));
        }
    }
    for row in &mut rows {
        row.marker = marker(row.votes).to_string();
    }

    ComparisonTable { rows, best }
}

pub fn aic(log_lik: f64, k: usize) -> f64 {
    -2.0 * log_lik + 2.0 * k as f64
}

/// Small-sample corrected AIC; `+∞` when `n - k - 1 <= 0`.
pub fn aicc(aic: f64, n: usize, k: usize) -> f64 {
    let denom = n as f64 - k as f64 - 1.0;
    if denom <= 0.0 {
        return f64::INFINITY;
    }
    let k_f = k as f64;
    aic + 2.0 * k_f * (k_f + 1.0) / denom
}

pub fn bic(log_lik: f64, n: usize, k: usize) -> f64 {
    -2.0 * log_lik + k as f64 * (n as f64).ln()
}

/// Tiered marker for the number of criteria agreeing on a model.
pub fn marker(votes: usize) -> &'static str {
    match votes {
        0 => "",
        1 => "*",
        2 => "**",
        _ => "***",
    }
}

/// Index of the smallest value; NaN never wins and ties keep the first index.
fn argmin(values: impl Iterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::fitter::gaussian_log_lik;

    fn fake_fit(kind: ModelKind, y: &[f64], fitted: Vec<f64>) -> FittedModel {
        let residuals: Vec<f64> = y.iter().zip(&fitted).map(|(a, b)| a - b).collect();
        let sse = residuals.iter().map(|r| r * r).sum();
        FittedModel {
            kind,
            theta: vec![0.0; kind.param_count()],
            std_errors: vec![0.0; kind.param_count()],
            fitted,
            residuals,
            sse,
            df_residual: y.len() - kind.param_count(),
            log_lik: gaussian_log_lik(sse, y.len()),
            iterations: 1,
            criterion: 0.0,
        }
    }

    #[test]
    fn irrelevant_extra_parameter_increases_aic_and_bic() {
        // Same log-likelihood, one more parameter.
        let log_lik = -42.0;
        let n = 30;
        assert!(aic(log_lik, 4) > aic(log_lik, 3));
        assert!(bic(log_lik, n, 4) > bic(log_lik, n, 3));
        assert!(aicc(aic(log_lik, 4), n, 4) > aicc(aic(log_lik, 3), n, 3));
    }

    #[test]
    fn identical_fit_quality_prefers_fewer_parameters() {
        let y: Vec<f64> = (0..20).map(|i| (i * i) as f64).collect();
        let fitted: Vec<f64> = y.iter().enumerate().map(|(i, v)| v + (i % 2) as f64 - 0.5).collect();
        let fits = vec![
            fake_fit(ModelKind::Exponential, &y, fitted.clone()),
            fake_fit(ModelKind::Logistic, &y, fitted),
        ];
        let table = compare_models(&fits, &y);
        assert_eq!(table.best_by(Criterion::Aic), Some(ModelKind::Exponential));
        assert_eq!(table.best_by(Criterion::Bic), Some(ModelKind::Exponential));
        assert_eq!(table.rows[0].marker, "***");
        assert_eq!(table.rows[1].marker, "");
        assert_eq!(table.rows[0].df, 3);
        assert_eq!(table.rows[1].df, 4);
    }

    #[test]
    fn votes_total_three_and_stay_in_range() {
        let y: Vec<f64> = (1..=25).map(|i| 10.0 * i as f64).collect();
        let offsets = [3.0, 1.0, 0.5, 0.49];
        let fits: Vec<FittedModel> = ModelKind::ALL
            .iter()
            .zip(offsets)
            .map(|(&kind, off)| {
                let fitted = y
                    .iter()
                    .enumerate()
                    .map(|(i, v)| if i % 2 == 0 { v + off } else { v - off })
                    .collect();
                fake_fit(kind, &y, fitted)
            })
            .collect();

        let table = compare_models(&fits, &y);
        let total: usize = table.rows.iter().map(|r| r.votes).sum();
        assert_eq!(total, 3);
        assert!(table.rows.iter().all(|r| r.votes <= 3));
        assert_eq!(table.best.len(), 3);
        for row in &table.rows {
            assert_eq!(row.marker, marker(row.votes));
        }
    }

    #[test]
    fn exact_fit_has_unit_r_squared() {
        let y = [20.0, 40.0, 80.0, 160.0, 320.0, 640.0];
        let fits = vec![fake_fit(ModelKind::Exponential, &y, y.to_vec())];
        let table = compare_models(&fits, &y);
        assert!((table.rows[0].r_squared - 1.0).abs() < 1e-12);
        assert!(table.rows[0].aic.is_finite());
    }

    #[test]
    fn aicc_is_infinite_when_undefined() {
        assert!(aicc(10.0, 5, 4).is_infinite());
    }
}
