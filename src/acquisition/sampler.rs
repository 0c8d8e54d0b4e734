//! Quasi-random points for the acquisition optimizer.
//!
//! Scrambled Sobol points serve both as raw candidate batches over the
//! joint `q·d` unit cube and, pushed through the inverse normal CDF, as the
//! fixed standard-normal base samples of the Monte Carlo acquisition.

use nalgebra::DMatrix;
use sobol_burley::{NUM_DIMENSIONS, sample};

use crate::rng_util::unit_cube;

/// Uniforms are kept this far from 0 and 1 before the inverse CDF.
const U_EPS: f64 = 1e-10;

/// Fold a 64-bit seed into the 32-bit seed the Sobol scrambler takes.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn fold_seed(seed: u64) -> u32 {
    (seed ^ (seed >> 32)) as u32
}

/// `n` points in `[0, 1)^dim`.
///
/// Owen-scrambled Sobol when the dimension fits the sequence's table,
/// seeded uniform noise otherwise.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn sobol_points(n: usize, dim: usize, seed: u64) -> Vec<Vec<f64>> {
    if dim > NUM_DIMENSIONS as usize || u32::try_from(n).is_err() {
        trace_debug!(dim, "dimension exceeds the Sobol table, using pseudo-random points");
        let mut rng = fastrand::Rng::with_seed(seed);
        return unit_cube(&mut rng, n, dim);
    }
    let scramble = fold_seed(seed);
    (0..n as u32)
        .map(|i| {
            (0..dim as u32)
                .map(|j| f64::from(sample(i, j, scramble)))
                .collect()
        })
        .collect()
}

/// Standard-normal base samples, one column per Monte Carlo sample and one
/// row per batch position (`q x n_samples`).
pub(crate) fn normal_base_samples(n_samples: usize, q: usize, seed: u64) -> DMatrix<f64> {
    let points = sobol_points(n_samples, q, seed);
    DMatrix::from_fn(q, n_samples, |j, s| {
        inverse_normal_cdf(points[s][j].clamp(U_EPS, 1.0 - U_EPS))
    })
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
pub(crate) fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p <= 0.0 {
        f64::NEG_INFINITY
    } else if p >= 1.0 {
        f64::INFINITY
    } else if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p > 1.0 - P_LOW {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    } else {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_cdf_known_quantiles() {
        assert!(inverse_normal_cdf(0.5).abs() < 1e-9);
        assert!((inverse_normal_cdf(0.975) - 1.959_963_984_540_054).abs() < 1e-8);
        assert!((inverse_normal_cdf(0.01) + 2.326_347_874_040_841).abs() < 1e-8);
        assert!((inverse_normal_cdf(0.2) + inverse_normal_cdf(0.8)).abs() < 1e-12);
        assert_eq!(inverse_normal_cdf(0.0), f64::NEG_INFINITY);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn base_samples_are_standard_normal() {
        let z = normal_base_samples(1024, 3, 7);
        assert_eq!(z.shape(), (3, 1024));
        for row in z.row_iter() {
            let mean = row.sum() / 1024.0;
            let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 1023.0;
            assert!(mean.abs() < 0.05, "mean {mean}");
            assert!((var - 1.0).abs() < 0.1, "var {var}");
        }
        assert!(z.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn same_seed_same_points() {
        assert_eq!(sobol_points(16, 4, 3), sobol_points(16, 4, 3));
        assert_ne!(sobol_points(16, 4, 3), sobol_points(16, 4, 4));
    }

    #[test]
    fn high_dimension_falls_back_to_pseudo_random() {
        let pts = sobol_points(4, 300, 1);
        assert_eq!(pts.len(), 4);
        assert!(pts.iter().all(|p| p.len() == 300));
        assert!(pts.iter().flatten().all(|v| (0.0..1.0).contains(v)));
    }
}
