//! Multi-start maximization of the batch acquisition over `[0, 1]^{q·d}`.

use super::qei::QExpectedImprovement;
use super::sampler::sobol_points;
use crate::error::{Error, Result};
use crate::optim::lbfgs::{LbfgsConfig, minimize};
use crate::surrogate::Posterior;
use crate::types::Precision;

/// L-BFGS iterations per restart.
const REFINE_MAX_ITER: usize = 100;

/// A batch picked by [`AcquisitionOptimizer::select_batch`].
#[derive(Clone, Debug, PartialEq)]
pub struct BatchSelection {
    /// Unit-cube points, one per batch position.
    pub points: Vec<Vec<f64>>,
    /// Acquisition value of the batch.
    pub value: f64,
}

/// Raw-sample screening followed by bounded L-BFGS refinement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquisitionOptimizer {
    num_restarts: usize,
    raw_samples: usize,
    mc_samples: usize,
    precision: Precision,
}

impl AcquisitionOptimizer {
    /// Create an optimizer.
    ///
    /// `raw_samples` candidate batches are screened, the best
    /// `num_restarts` are refined, and qEI uses `mc_samples` base samples.
    #[must_use]
    pub fn new(
        num_restarts: usize,
        raw_samples: usize,
        mc_samples: usize,
        precision: Precision,
    ) -> Self {
        Self {
            num_restarts,
            raw_samples,
            mc_samples,
            precision,
        }
    }

    /// Pick `batch_size` unit-cube points maximizing qEI over `model`
    /// relative to `best_f`.
    ///
    /// `seed` fixes both the base samples and the raw candidates, so equal
    /// seeds give equal batches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OptimizationFailure`] if the model has no
    /// dimensions, `batch_size` is zero, or no raw candidate yields a
    /// finite acquisition value.
    pub fn select_batch<P: Posterior>(
        &self,
        model: P,
        best_f: f64,
        batch_size: usize,
        seed: u64,
    ) -> Result<BatchSelection> {
        let d = model.dim();
        if d == 0 || batch_size == 0 {
            return Err(Error::OptimizationFailure(format!(
                "empty search domain (dim = {d}, batch size = {batch_size})"
            )));
        }
        let acq = QExpectedImprovement::new(
            model,
            best_f,
            batch_size,
            self.mc_samples,
            seed,
            self.precision,
        );
        let joint_dim = batch_size * d;

        let mut screened: Vec<(Vec<f64>, f64)> =
            sobol_points(self.raw_samples, joint_dim, seed.wrapping_add(1))
                .into_iter()
                .filter_map(|x| {
                    let v = acq.evaluate_flat(&x);
                    v.is_finite().then_some((x, v))
                })
                .collect();
        if screened.is_empty() {
            return Err(Error::OptimizationFailure(format!(
                "none of {} raw samples gave a finite acquisition value",
                self.raw_samples
            )));
        }
        // Stable: equal values keep their raw-sample order.
        screened.sort_by(|a, b| b.1.total_cmp(&a.1));
        screened.truncate(self.num_restarts.max(1));

        let bounds = vec![(0.0, 1.0); joint_dim];
        let lbfgs = LbfgsConfig {
            max_iter: REFINE_MAX_ITER,
            ..LbfgsConfig::default()
        };
        let step = self.precision.epsilon().sqrt();
        // Refine qEI relative to the best screened value so the stopping
        // tolerances do not depend on the score scale.
        let scale = match screened[0].1 {
            v if v > 0.0 => v,
            _ => 1.0,
        };

        let mut best: Option<(Vec<f64>, f64)> = None;
        for (start, start_value) in screened {
            let outcome = minimize(
                |x| negated_with_gradient(&acq, x, step, scale),
                &start,
                &bounds,
                &lbfgs,
            );
            let refined = if outcome.is_finite() {
                acq.evaluate_flat(&outcome.x)
            } else {
                f64::NAN
            };
            let (x, value) = if refined.is_finite() && refined >= start_value {
                (outcome.x, refined)
            } else {
                (start, start_value)
            };
            if best.as_ref().is_none_or(|(_, b)| value > *b) {
                best = Some((x, value));
            }
        }

        let Some((x, value)) = best else {
            return Err(Error::OptimizationFailure("no restart survived".into()));
        };
        trace_debug!(value, batch_size, "acquisition maximized");
        Ok(BatchSelection {
            points: x
                .chunks(d)
                .map(|p| p.iter().map(|v| v.clamp(0.0, 1.0)).collect())
                .collect(),
            value,
        })
    }
}

/// `-qEI(x) / scale` and its forward-difference gradient.
fn negated_with_gradient<P: Posterior>(
    acq: &QExpectedImprovement<P>,
    x: &[f64],
    step: f64,
    scale: f64,
) -> (f64, Vec<f64>) {
    let value = |x: &[f64]| -acq.evaluate_flat(x) / scale;
    let f0 = value(x);
    if !f0.is_finite() {
        return (f64::INFINITY, vec![0.0; x.len()]);
    }
    let mut probe = x.to_vec();
    let grad = (0..x.len())
        .map(|i| {
            let h = step * x[i].abs().max(1.0);
            probe[i] = x[i] + h;
            let fi = value(&probe);
            probe[i] = x[i];
            if fi.is_finite() { (fi - f0) / h } else { 0.0 }
        })
        .collect();
    (f0, grad)
}
