//! Box-constrained limited-memory BFGS.
//!
//! A projected variant of L-BFGS: the two-loop recursion gives a
//! quasi-Newton direction, components that would push an active bound
//! outward are dropped, and a backtracking Armijo search runs along the
//! projected path. Used to fit GP hyperparameters and to refine acquisition
//! candidates.

use std::collections::VecDeque;

/// Options for [`minimize`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct LbfgsConfig {
    /// Maximum number of iterations.
    pub(crate) max_iter: usize,
    /// Number of correction pairs kept.
    pub(crate) memory: usize,
    /// Stop when the projected gradient's Euclidean norm falls below this.
    pub(crate) pgtol: f64,
    /// Stop when the relative decrease of `f` falls below this.
    pub(crate) ftol: f64,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        Self {
            max_iter: 200,
            memory: 10,
            pgtol: 1e-5,
            ftol: 1e-9,
        }
    }
}

/// Why [`minimize`] stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Termination {
    /// Gradient or relative decrease below tolerance.
    Converged,
    /// Iteration cap reached with a finite objective.
    MaxIter,
    /// No step along the search direction decreased `f`.
    LineSearchFailed,
    /// `f` or its gradient was not finite at the starting point.
    NonFiniteStart,
}

/// Result of [`minimize`].
#[derive(Clone, Debug)]
pub(crate) struct LbfgsOutcome {
    /// Best point found (inside the bounds).
    pub(crate) x: Vec<f64>,
    /// Objective at `x`.
    pub(crate) fval: f64,
    pub(crate) iterations: usize,
    pub(crate) termination: Termination,
}

impl LbfgsOutcome {
    /// Returns `true` if `x`/`fval` are usable.
    pub(crate) fn is_finite(&self) -> bool {
        self.termination != Termination::NonFiniteStart && self.fval.is_finite()
    }
}

/// Maximum number of step halvings per line search.
const MAX_BACKTRACK: usize = 40;
/// Armijo sufficient-decrease constant.
const ARMIJO_C1: f64 = 1e-4;

/// Minimize `f` over the box `bounds` starting from `x0`.
///
/// `f` returns the objective and its gradient at a point.
pub(crate) fn minimize<F>(
    mut f: F,
    x0: &[f64],
    bounds: &[(f64, f64)],
    config: &LbfgsConfig,
) -> LbfgsOutcome
where
    F: FnMut(&[f64]) -> (f64, Vec<f64>),
{
    let mut x = clamp_to_bounds(x0, bounds);
    let (mut fx, mut g) = f(&x);
    if !fx.is_finite() || g.iter().any(|v| !v.is_finite()) {
        return LbfgsOutcome {
            x,
            fval: fx,
            iterations: 0,
            termination: Termination::NonFiniteStart,
        };
    }

    let mut memory: VecDeque<(Vec<f64>, Vec<f64>, f64)> = VecDeque::with_capacity(config.memory);

    for iter in 0..config.max_iter {
        if projected_gradient_norm(&x, &g, bounds) < config.pgtol {
            return done(x, fx, iter, Termination::Converged);
        }

        let mut direction = two_loop(&g, &memory);
        project_direction(&x, &mut direction, bounds);
        let mut slope = dot(&g, &direction);
        if slope >= 0.0 {
            // Curvature pairs went stale; restart from steepest descent.
            memory.clear();
            direction = g.iter().map(|v| -v).collect();
            project_direction(&x, &mut direction, bounds);
            slope = dot(&g, &direction);
            if slope >= 0.0 {
                return done(x, fx, iter, Termination::Converged);
            }
        }

        let mut step = if memory.is_empty() {
            (1.0 / inf_norm(&direction)).min(1.0)
        } else {
            1.0
        };

        let mut accepted = None;
        for _ in 0..MAX_BACKTRACK {
            let trial: Vec<f64> = x
                .iter()
                .zip(&direction)
                .map(|(xi, di)| xi + step * di)
                .collect();
            let trial = clamp_to_bounds(&trial, bounds);
            let (ft, gt) = f(&trial);
            let decrease: f64 = g
                .iter()
                .zip(trial.iter().zip(&x))
                .map(|(gi, (ti, xi))| gi * (ti - xi))
                .sum();
            if ft.is_finite()
                && gt.iter().all(|v| v.is_finite())
                && ft <= fx + ARMIJO_C1 * decrease
            {
                accepted = Some((trial, ft, gt));
                break;
            }
            step *= 0.5;
        }

        let Some((x_new, f_new, g_new)) = accepted else {
            return done(x, fx, iter, Termination::LineSearchFailed);
        };

        let s: Vec<f64> = x_new.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = g_new.iter().zip(&g).map(|(a, b)| a - b).collect();
        let sy = dot(&s, &y);
        if sy > 1e-10 {
            if memory.len() == config.memory {
                memory.pop_front();
            }
            memory.push_back((s, y, 1.0 / sy));
        }

        let rel = (fx - f_new) / fx.abs().max(f_new.abs()).max(1.0);
        x = x_new;
        fx = f_new;
        g = g_new;
        if rel <= config.ftol {
            return done(x, fx, iter + 1, Termination::Converged);
        }
    }

    done(x, fx, config.max_iter, Termination::MaxIter)
}

fn done(x: Vec<f64>, fval: f64, iterations: usize, termination: Termination) -> LbfgsOutcome {
    LbfgsOutcome {
        x,
        fval,
        iterations,
        termination,
    }
}

/// L-BFGS two-loop recursion; returns the descent direction `-H g`.
fn two_loop(grad: &[f64], memory: &VecDeque<(Vec<f64>, Vec<f64>, f64)>) -> Vec<f64> {
    let mut q = grad.to_vec();
    let mut alpha = vec![0.0; memory.len()];

    for (i, (s, y, rho)) in memory.iter().enumerate().rev() {
        alpha[i] = rho * dot(s, &q);
        for (qj, yj) in q.iter_mut().zip(y) {
            *qj -= alpha[i] * yj;
        }
    }

    // Initial Hessian approximation: gamma * I
    let gamma = memory.back().map_or(1.0, |(s, y, _)| {
        let yy = dot(y, y);
        if yy > 1e-30 { dot(s, y) / yy } else { 1.0 }
    });
    for qj in &mut q {
        *qj *= gamma;
    }

    for (i, (s, y, rho)) in memory.iter().enumerate() {
        let beta = rho * dot(y, &q);
        for (qj, sj) in q.iter_mut().zip(s) {
            *qj += (alpha[i] - beta) * sj;
        }
    }

    q.iter().map(|v| -v).collect()
}

/// Zero direction components that would leave the box at an active bound.
fn project_direction(x: &[f64], direction: &mut [f64], bounds: &[(f64, f64)]) {
    for ((d, &xi), &(lo, hi)) in direction.iter_mut().zip(x).zip(bounds) {
        if (xi <= lo && *d < 0.0) || (xi >= hi && *d > 0.0) {
            *d = 0.0;
        }
    }
}

/// Projected gradient norm (gradient clamped at bounds).
fn projected_gradient_norm(x: &[f64], grad: &[f64], bounds: &[(f64, f64)]) -> f64 {
    x.iter()
        .zip(grad)
        .zip(bounds)
        .map(|((&xi, &g), &(lo, hi))| {
            if (xi <= lo && g > 0.0) || (xi >= hi && g < 0.0) {
                0.0
            } else {
                g * g
            }
        })
        .sum::<f64>()
        .sqrt()
}

fn clamp_to_bounds(x: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    x.iter()
        .zip(bounds)
        .map(|(&v, &(lo, hi))| v.clamp(lo, hi))
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0_f64, |m, x| m.max(x.abs())).max(1e-12)
}
