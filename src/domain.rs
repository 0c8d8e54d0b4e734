//! The search box and its affine map to the unit cube.
//!
//! The acquisition optimizer works in `[0, 1]^d`; the objective lives in
//! `[low, high]^d`. [`Bounds`] is the only place where the two meet, so a
//! candidate can never reach the objective without passing through
//! [`Bounds::unnormalize`] and [`Bounds::check_contains`].

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tolerance for containment checks after an unnormalize round trip.
const CONTAINS_TOL: f64 = 1e-9;

/// A per-dimension box `[low_i, high_i]`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    low: Vec<f64>,
    high: Vec<f64>,
}

impl Bounds {
    /// Creates a box from per-dimension lower and upper bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the two vectors differ in
    /// length, and [`Error::InvalidBounds`] if any `low > high` or a bound
    /// is not finite.
    pub fn new(low: Vec<f64>, high: Vec<f64>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(Error::DimensionMismatch {
                expected: low.len(),
                got: high.len(),
            });
        }
        for (&lo, &hi) in low.iter().zip(&high) {
            if !(lo.is_finite() && hi.is_finite()) || lo > hi {
                return Err(Error::InvalidBounds { low: lo, high: hi });
            }
        }
        Ok(Self { low, high })
    }

    /// Creates the box `[low, high]^d`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high` or either is not finite.
    pub fn uniform(d: usize, low: f64, high: f64) -> Result<Self> {
        Self::new(vec![low; d], vec![high; d])
    }

    /// The unit cube `[0, 1]^d`.
    #[must_use]
    pub fn unit(d: usize) -> Self {
        Self {
            low: vec![0.0; d],
            high: vec![1.0; d],
        }
    }

    /// Number of dimensions.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    /// Lower bounds.
    #[must_use]
    pub fn low(&self) -> &[f64] {
        &self.low
    }

    /// Upper bounds.
    #[must_use]
    pub fn high(&self) -> &[f64] {
        &self.high
    }

    /// Map a point of the box into the unit cube.
    ///
    /// Degenerate dimensions (`low == high`) map to `0.5`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `x` has the wrong length.
    pub fn normalize(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.check_dim(x)?;
        Ok(x.iter()
            .zip(self.low.iter().zip(&self.high))
            .map(|(&v, (&lo, &hi))| to_normalized(v, lo, hi))
            .collect())
    }

    /// Map a point of the unit cube into the box.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `u` has the wrong length.
    pub fn unnormalize(&self, u: &[f64]) -> Result<Vec<f64>> {
        self.check_dim(u)?;
        Ok(u.iter()
            .zip(self.low.iter().zip(&self.high))
            .map(|(&v, (&lo, &hi))| from_normalized(v, lo, hi))
            .collect())
    }

    /// Returns `true` if `x` lies in the box (inclusive, with a small
    /// tolerance for rounding).
    #[must_use]
    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dim()
            && x.iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(&v, (&lo, &hi))| in_range(v, lo, hi))
    }

    /// Check that every point of a batch lies in the box.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for a point of the wrong length
    /// and [`Error::DomainViolation`] naming the first coordinate outside
    /// the box.
    pub fn check_contains(&self, batch: &[Vec<f64>]) -> Result<()> {
        for (index, x) in batch.iter().enumerate() {
            self.check_dim(x)?;
            for (dim, (&value, (&low, &high))) in
                x.iter().zip(self.low.iter().zip(&self.high)).enumerate()
            {
                if !in_range(value, low, high) {
                    return Err(Error::DomainViolation {
                        index,
                        dim,
                        value,
                        low,
                        high,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_dim(&self, x: &[f64]) -> Result<()> {
        if x.len() == self.dim() {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.dim(),
                got: x.len(),
            })
        }
    }
}

fn in_range(v: f64, lo: f64, hi: f64) -> bool {
    let tol = CONTAINS_TOL * (hi - lo).abs().max(1.0);
    v.is_finite() && v >= lo - tol && v <= hi + tol
}

/// Convert a value in `[lo, hi]` to normalized `[0, 1]`.
fn to_normalized(value: f64, lo: f64, hi: f64) -> f64 {
    if (hi - lo).abs() < 1e-15 {
        0.5
    } else {
        (value - lo) / (hi - lo)
    }
}

/// Convert a normalized `[0, 1]` value back to `[lo, hi]`.
fn from_normalized(value: f64, lo: f64, hi: f64) -> f64 {
    lo + value * (hi - lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnormalize_maps_corners() {
        let b = Bounds::uniform(3, -6.0, 6.0).unwrap();
        assert_eq!(b.unnormalize(&[0.0, 0.5, 1.0]).unwrap(), vec![-6.0, 0.0, 6.0]);
    }

    #[test]
    fn normalize_inverts_unnormalize() {
        let b = Bounds::new(vec![-6.0, 0.0, 10.0], vec![6.0, 1.0, 20.0]).unwrap();
        let u = vec![0.1, 0.73, 0.999];
        let back = b.normalize(&b.unnormalize(&u).unwrap()).unwrap();
        for (a, e) in back.iter().zip(&u) {
            assert!((a - e).abs() < 1e-12);
        }
    }

    #[test]
    fn degenerate_dimension_normalizes_to_half() {
        let b = Bounds::new(vec![2.0], vec![2.0]).unwrap();
        assert_eq!(b.normalize(&[2.0]).unwrap(), vec![0.5]);
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert!(matches!(
            Bounds::uniform(2, 1.0, -1.0),
            Err(Error::InvalidBounds { .. })
        ));
        assert!(matches!(
            Bounds::new(vec![0.0], vec![1.0, 2.0]),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn check_contains_reports_first_violation() {
        let b = Bounds::uniform(2, -1.0, 1.0).unwrap();
        let batch = vec![vec![0.0, 0.0], vec![0.5, 1.5]];
        match b.check_contains(&batch) {
            Err(Error::DomainViolation { index, dim, .. }) => {
                assert_eq!((index, dim), (1, 1));
            }
            other => panic!("expected domain violation, got {other:?}"),
        }
        assert!(b.check_contains(&batch[..1]).is_ok());
    }

    #[test]
    fn contains_rejects_nan_and_wrong_length() {
        let b = Bounds::unit(2);
        assert!(!b.contains(&[f64::NAN, 0.5]));
        assert!(!b.contains(&[0.5]));
        assert!(b.contains(&[0.0, 1.0]));
    }
}
