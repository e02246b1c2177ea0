//! Mean functions for the exponential / logistic / Gompertz / Richards families.
//!
//! The fitter relies on two primitive operations:
//! - predict μ(x) given θ (for residuals, forecasts and bootstrap refits)
//! - fill the gradient ∂μ/∂θ at a given x (one Jacobian row)
//!
//! The x-derivative gives the daily-increment curve used for peak detection.

use crate::domain::ModelKind;

/// Predict μ(x) for the given model kind.
pub fn predict(model: ModelKind, x: f64, theta: &[f64]) -> f64 {
    match model {
        ModelKind::Exponential => theta[0] * (theta[1] * x).exp(),
        ModelKind::Logistic => theta[0] / (1.0 + ((theta[1] - x) / theta[2]).exp()),
        ModelKind::Gompertz => theta[0] * (-theta[1] * theta[2].powf(x)).exp(),
        ModelKind::Richards => theta[0] * (-(-theta[1] * x).exp_m1()).powf(theta[2]),
    }
}

/// Elementwise `predict` over a slice of x values.
pub fn predict_all(model: ModelKind, xs: &[f64], theta: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| predict(model, x, theta)).collect()
}

/// Fill `out` with ∂μ/∂θ at `x`.
///
/// # Panics
/// Panics if `out` or `theta` is shorter than `model.param_count()`.
pub fn fill_gradient(model: ModelKind, x: f64, theta: &[f64], out: &mut [f64]) {
    match model {
        ModelKind::Exponential => {
            let e = (theta[1] * x).exp();
            out[0] = e;
            out[1] = theta[0] * x * e;
        }
        ModelKind::Logistic => {
            let (a, m, s) = (theta[0], theta[1], theta[2]);
            let e = ((m - x) / s).exp();
            let d = 1.0 + e;
            out[0] = 1.0 / d;
            out[1] = -a * e / (s * d * d);
            out[2] = a * e * (m - x) / (s * s * d * d);
        }
        ModelKind::Gompertz => {
            let (a, b, c) = (theta[0], theta[1], theta[2]);
            let cx = c.powf(x);
            let g = (-b * cx).exp();
            out[0] = g;
            out[1] = -a * cx * g;
            out[2] = -a * b * x * c.powf(x - 1.0) * g;
        }
        ModelKind::Richards => {
            let (a, b, c) = (theta[0], theta[1], theta[2]);
            let v = (-b * x).exp();
            let w = -(-b * x).exp_m1();
            let wc = w.powf(c);
            out[0] = wc;
            out[1] = a * c * w.powf(c - 1.0) * x * v;
            out[2] = if w > 0.0 { a * wc * w.ln() } else { 0.0 };
        }
    }
}

/// First derivative dμ/dx (the daily-increment curve).
pub fn derivative(model: ModelKind, x: f64, theta: &[f64]) -> f64 {
    match model {
        ModelKind::Exponential => theta[0] * theta[1] * (theta[1] * x).exp(),
        ModelKind::Logistic => {
            let (a, m, s) = (theta[0], theta[1], theta[2]);
            let e = ((m - x) / s).exp();
            a * e / (s * (1.0 + e) * (1.0 + e))
        }
        ModelKind::Gompertz => {
            let (a, b, c) = (theta[0], theta[1], theta[2]);
            let cx = c.powf(x);
            -a * b * cx * c.ln() * (-b * cx).exp()
        }
        ModelKind::Richards => {
            let (a, b, c) = (theta[0], theta[1], theta[2]);
            let v = (-b * x).exp();
            a * c * (1.0 - v).powf(c - 1.0) * b * v
        }
    }
}

/// Location of the maximum of `derivative` (the inflection point of μ).
///
/// Returns `None` for the exponential family and for parameter values where the
/// curve has no interior inflection point.
pub fn peak_x(model: ModelKind, theta: &[f64]) -> Option<f64> {
    let x = match model {
        ModelKind::Exponential => return None,
        ModelKind::Logistic => theta[1],
        ModelKind::Gompertz => {
            let (b, c) = (theta[1], theta[2]);
            if !(b > 0.0 && c > 0.0 && c < 1.0) {
                return None;
            }
            b.ln() / -c.ln()
        }
        ModelKind::Richards => {
            let (b, c) = (theta[1], theta[2]);
            if !(b > 0.0 && c > 1.0) {
                return None;
            }
            c.ln() / b
        }
    };
    x.is_finite().then_some(x)
}
