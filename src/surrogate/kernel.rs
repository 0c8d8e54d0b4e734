//! Matérn 5/2 kernel with ARD lengthscales.
//!
//! `k(x1, x2) = s (1 + √5 r + 5/3 r²) exp(-√5 r)`
//! where `r = sqrt(Σ ((x1_i - x2_i) / l_i)²)` and `s` is the outputscale.

use nalgebra::DMatrix;

/// Precomputed √5 constant.
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Scaled squared distance `r²`.
fn scaled_sq_dist(x1: &[f64], x2: &[f64], lengthscales: &[f64]) -> f64 {
    x1.iter()
        .zip(x2)
        .zip(lengthscales)
        .map(|((a, b), l)| {
            let d = (a - b) / l;
            d * d
        })
        .sum()
}

/// Kernel value for one pair.
pub(crate) fn matern52(x1: &[f64], x2: &[f64], lengthscales: &[f64], outputscale: f64) -> f64 {
    let r_sq = scaled_sq_dist(x1, x2, lengthscales);
    let sqrt5_r = SQRT_5 * r_sq.sqrt();
    outputscale * (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
}

/// Cross-covariance matrix `k(a_i, b_j)`.
pub(crate) fn cross(
    a: &[Vec<f64>],
    b: &[Vec<f64>],
    lengthscales: &[f64],
    outputscale: f64,
) -> DMatrix<f64> {
    DMatrix::from_fn(a.len(), b.len(), |i, j| {
        matern52(&a[i], &b[j], lengthscales, outputscale)
    })
}

/// Symmetric kernel matrix over `x`, without noise.
pub(crate) fn gram(x: &[Vec<f64>], lengthscales: &[f64], outputscale: f64) -> DMatrix<f64> {
    let n = x.len();
    let mut k = DMatrix::zeros(n, n);
    for i in 0..n {
        k[(i, i)] = outputscale;
        for j in 0..i {
            let v = matern52(&x[i], &x[j], lengthscales, outputscale);
            k[(i, j)] = v;
            k[(j, i)] = v;
        }
    }
    k
}

/// Contract `Σ_ij w_ij ∂K_ij/∂log l_k` for every lengthscale `k`.
///
/// With `r` the scaled distance,
/// `∂k/∂log l_k = s · 5/3 · (1 + √5 r) · exp(-√5 r) · (Δ_k / l_k)²`.
/// Only the lower triangle of the symmetric `w` is read.
pub(crate) fn lengthscale_grad(
    x: &[Vec<f64>],
    lengthscales: &[f64],
    outputscale: f64,
    w: &DMatrix<f64>,
) -> Vec<f64> {
    let d = lengthscales.len();
    let mut grad = vec![0.0; d];
    for i in 0..x.len() {
        for j in 0..i {
            let r = scaled_sq_dist(&x[i], &x[j], lengthscales).sqrt();
            let sqrt5_r = SQRT_5 * r;
            let common = outputscale * 5.0 / 3.0 * (1.0 + sqrt5_r) * (-sqrt5_r).exp();
            // Off-diagonal pairs appear twice in the symmetric contraction.
            let weight = 2.0 * w[(i, j)] * common;
            for (k, g) in grad.iter_mut().enumerate() {
                let dk = (x[i][k] - x[j][k]) / lengthscales[k];
                *g += weight * dk * dk;
            }
        }
    }
    grad
}
