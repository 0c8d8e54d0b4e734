/// Generate a random `f64` in the range `[low, high)`.
#[inline]
pub(crate) fn f64_range(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// Draw `n` points uniformly from the unit cube `[0, 1)^d`.
pub(crate) fn unit_cube(rng: &mut fastrand::Rng, n: usize, d: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|_| (0..d).map(|_| f64_range(rng, 0.0, 1.0)).collect())
        .collect()
}
