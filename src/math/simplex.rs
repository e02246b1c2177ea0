//! Derivative-free minimisation (Nelder–Mead downhill simplex).
//!
//! Used to polish Richards starting values: the Richards SSE surface is flat
//! enough that Levenberg–Marquardt started from a crude guess often stalls.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    /// Stop when the spread of objective values across the simplex falls
    /// below `tolerance * (|f_best| + 1)`.
    pub tolerance: f64,
    /// Relative size of the initial simplex along each axis.
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 5000,
            tolerance: 1e-10,
            initial_step: 0.05,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    pub optimal_point: Vec<f64>,
    pub optimal_value: f64,
    pub iterations: usize,
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimise `f` starting from `initial`.
///
/// Non-finite objective values are treated as `+∞`, so the simplex simply
/// walks away from invalid regions of parameter space.
pub fn nelder_mead<F>(f: F, initial: &[f64], config: NelderMeadConfig) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |p: &[f64]| {
        let v = f(p);
        if v.is_finite() { v } else { f64::INFINITY }
    };

    let dim = initial.len();
    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(dim + 1);
    simplex.push(initial.to_vec());
    for j in 0..dim {
        let mut p = initial.to_vec();
        p[j] = if p[j] != 0.0 {
            p[j] * (1.0 + config.initial_step)
        } else {
            0.00025
        };
        simplex.push(p);
    }
    let mut values: Vec<f64> = simplex.iter().map(|p| eval(p.as_slice())).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=dim).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(Ordering::Equal));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        let worst = values[dim];
        if best.is_finite() && (worst - best).abs() <= config.tolerance * (best.abs() + 1.0) {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..dim)
            .map(|j| simplex[..dim].iter().map(|p| p[j]).sum::<f64>() / dim as f64)
            .collect();
        let along = |t: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[dim])
                .map(|(c, w)| c + t * (c - w))
                .collect()
        };

        let reflected = along(REFLECT);
        let f_reflected = eval(&reflected);

        if f_reflected < values[0] {
            let expanded = along(EXPAND);
            let f_expanded = eval(&expanded);
            if f_expanded < f_reflected {
                simplex[dim] = expanded;
                values[dim] = f_expanded;
            } else {
                simplex[dim] = reflected;
                values[dim] = f_reflected;
            }
            continue;
        }

        if f_reflected < values[dim - 1] {
            simplex[dim] = reflected;
            values[dim] = f_reflected;
            continue;
        }

        // Contract towards the better of the reflected and worst points.
        let (contracted, threshold) = if f_reflected < values[dim] {
            (along(CONTRACT), f_reflected)
        } else {
            (along(-CONTRACT), values[dim])
        };
        let f_contracted = eval(&contracted);
        if f_contracted < threshold {
            simplex[dim] = contracted;
            values[dim] = f_contracted;
            continue;
        }

        let anchor = simplex[0].clone();
        for i in 1..=dim {
            for j in 0..dim {
                simplex[i][j] = anchor[j] + SHRINK * (simplex[i][j] - anchor[j]);
            }
            values[i] = eval(simplex[i].as_slice());
        }
    }

    let (best_idx, _) = values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
        .unwrap_or((0, &f64::INFINITY));

    NelderMeadResult {
        optimal_point: simplex[best_idx].clone(),
        optimal_value: values[best_idx],
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimises_rosenbrock() {
        let rosen = |p: &[f64]| (1.0 - p[0]).powi(2) + 100.0 * (p[1] - p[0] * p[0]).powi(2);
        let result = nelder_mead(rosen, &[-1.2, 1.0], NelderMeadConfig::default());
        assert!(result.converged);
        assert!((result.optimal_point[0] - 1.0).abs() < 1e-3);
        assert!((result.optimal_point[1] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn walks_away_from_nan_region() {
        // sqrt is NaN for negative arguments.
        let f = |p: &[f64]| (p[0].sqrt() - 2.0).powi(2);
        let result = nelder_mead(f, &[0.5], NelderMeadConfig::default());
        assert!((result.optimal_point[0] - 4.0).abs() < 1e-3);
    }
}
