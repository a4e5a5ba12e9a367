//! Derivative-based minimiser used by both model fits.
//!
//! BFGS with an inverse-Hessian approximation, central-difference gradients
//! and a backtracking Armijo line search. Callers hand in objectives over
//! log-parameters, so the search space is unconstrained while the natural
//! parameters stay strictly positive.

use crate::{
    config::OptimizerConfig,
    error::{CltvError, CltvResult},
};

/// Largest move allowed along any coordinate in one line search (log space).
const MAX_STEP: f64 = 5.0;
const ARMIJO_C1: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;

#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub gradient_norm: f64,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm_inf(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

fn identity(n: usize) -> Vec<f64> {
    let mut h = vec![0.0; n * n];
    for i in 0..n {
        h[i * n + i] = 1.0;
    }
    h
}

/// Central-difference gradient.
pub fn numerical_gradient<F>(objective: &F, x: &[f64]) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut shifted = x.to_vec();
    (0..x.len())
        .map(|i| {
            let h = 1e-5 * x[i].abs().max(1.0);
            shifted[i] = x[i] + h;
            let up = objective(&shifted);
            shifted[i] = x[i] - h;
            let down = objective(&shifted);
            shifted[i] = x[i];
            (up - down) / (2.0 * h)
        })
        .collect()
}

/// Minimise `objective` starting at `x0`.
///
/// `model` names the caller in error messages and logs.
pub fn minimize<F>(
    model: &'static str,
    objective: F,
    x0: Vec<f64>,
    config: &OptimizerConfig,
) -> CltvResult<Minimum>
where
    F: Fn(&[f64]) -> f64,
{
    let fail = |reason: String| CltvError::Convergence { model, reason };
    let n = x0.len();

    let mut x = x0;
    let mut f = objective(&x);
    if !f.is_finite() {
        return Err(fail(format!("objective is not finite at the starting point ({f})")));
    }
    let mut g = numerical_gradient(&objective, &x);
    let mut h = identity(n);
    let mut h_is_identity = true;

    for iteration in 0..config.max_iterations {
        let gradient_norm = norm_inf(&g);
        if gradient_norm <= config.gradient_tolerance {
            log::debug!("{model}: gradient converged after {iteration} iterations (f = {f})");
            return Ok(Minimum { x, value: f, iterations: iteration, gradient_norm });
        }

        let mut direction: Vec<f64> = (0..n)
            .map(|i| -(0..n).map(|j| h[i * n + j] * g[j]).sum::<f64>())
            .collect();
        let mut slope = dot(&g, &direction);
        if !(slope < 0.0) {
            h = identity(n);
            h_is_identity = true;
            direction = g.iter().map(|v| -v).collect();
            slope = dot(&g, &direction);
        }

        let longest = norm_inf(&direction);
        let mut step = if longest > MAX_STEP { MAX_STEP / longest } else { 1.0 };

        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let candidate: Vec<f64> = x.iter().zip(&direction).map(|(xi, di)| xi + step * di).collect();
            let value = objective(&candidate);
            if value.is_finite() && value <= f + ARMIJO_C1 * step * slope {
                accepted = Some((candidate, value));
                break;
            }
            step *= 0.5;
        }

        let Some((x_new, f_new)) = accepted else {
            if h_is_identity {
                return Err(fail(format!(
                    "line search failed at iteration {iteration} (gradient norm {gradient_norm:.3e})"
                )));
            }
            log::debug!("{model}: line search failed, resetting curvature at iteration {iteration}");
            h = identity(n);
            h_is_identity = true;
            continue;
        };

        let g_new = numerical_gradient(&objective, &x_new);
        let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
        let improvement = f - f_new;

        x = x_new;
        f = f_new;
        g = g_new;

        if improvement.abs() <= config.function_tolerance * f.abs().max(1.0) {
            log::debug!("{model}: objective settled after {} iterations (f = {f})", iteration + 1);
            let gradient_norm = norm_inf(&g);
            return Ok(Minimum { x, value: f, iterations: iteration + 1, gradient_norm });
        }

        let sy = dot(&s, &y);
        if sy > 1e-12 {
            if h_is_identity {
                let scale = sy / dot(&y, &y);
                h.iter_mut().for_each(|v| *v *= scale);
            }
            let rho = 1.0 / sy;
            let hy: Vec<f64> = (0..n).map(|i| (0..n).map(|j| h[i * n + j] * y[j]).sum()).collect();
            let yhy = dot(&y, &hy);
            for i in 0..n {
                for j in 0..n {
                    h[i * n + j] += -rho * (s[i] * hy[j] + hy[i] * s[j]) + (rho * rho * yhy + rho) * s[i] * s[j];
                }
            }
            h_is_identity = false;
        }
    }

    Err(fail(format!(
        "iteration budget of {} exhausted (gradient norm {:.3e})",
        config.max_iterations,
        norm_inf(&g)
    )))
}
