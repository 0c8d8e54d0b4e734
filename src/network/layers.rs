//! Inference-only building blocks for the frozen networks.

use nalgebra::{DMatrix, DVector};

use super::weights::WeightStore;
use crate::error::Result;
use crate::types::Precision;

/// Fully connected layer `y = W x + b`.
#[derive(Clone, Debug)]
pub(crate) struct Linear {
    weight: DMatrix<f64>,
    bias: DVector<f64>,
}

impl Linear {
    /// Load `{prefix}.weight` (`[out, in]`) and `{prefix}.bias` (`[out]`).
    pub(crate) fn load(store: &WeightStore, prefix: &str, n_in: usize, n_out: usize) -> Result<Self> {
        let w = store.take(&format!("{prefix}.weight"), &[n_out, n_in])?;
        let b = store.take(&format!("{prefix}.bias"), &[n_out])?;
        Ok(Self {
            weight: DMatrix::from_row_slice(n_out, n_in, &w),
            bias: DVector::from_vec(b),
        })
    }

    pub(crate) fn n_in(&self) -> usize {
        self.weight.ncols()
    }

    pub(crate) fn forward(&self, x: &[f64], precision: Precision) -> Vec<f64> {
        let x = DVector::from_column_slice(x);
        let y = &self.weight * x + &self.bias;
        y.iter().map(|&v| precision.round(v)).collect()
    }
}

/// A `channels × height × width` activation, stored channel-major.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FeatureMap {
    pub(crate) channels: usize,
    pub(crate) height: usize,
    pub(crate) width: usize,
    pub(crate) data: Vec<f64>,
}

impl FeatureMap {
    #[inline]
    fn at(&self, c: usize, y: usize, x: usize) -> f64 {
        self.data[(c * self.height + y) * self.width + x]
    }
}

/// 2-D convolution, stride 1, no padding.
#[derive(Clone, Debug)]
pub(crate) struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    /// Row-major `[out, in, k, k]`.
    weight: Vec<f64>,
    bias: Vec<f64>,
}

impl Conv2d {
    pub(crate) fn load(
        store: &WeightStore,
        prefix: &str,
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
    ) -> Result<Self> {
        let weight = store.take(
            &format!("{prefix}.weight"),
            &[out_channels, in_channels, kernel, kernel],
        )?;
        let bias = store.take(&format!("{prefix}.bias"), &[out_channels])?;
        Ok(Self {
            in_channels,
            out_channels,
            kernel,
            weight,
            bias,
        })
    }

    pub(crate) fn forward(&self, input: &FeatureMap, precision: Precision) -> FeatureMap {
        debug_assert_eq!(input.channels, self.in_channels);
        let k = self.kernel;
        let out_h = input.height + 1 - k;
        let out_w = input.width + 1 - k;
        let mut data = Vec::with_capacity(self.out_channels * out_h * out_w);

        for o in 0..self.out_channels {
            for y in 0..out_h {
                for x in 0..out_w {
                    let mut acc = self.bias[o];
                    for c in 0..self.in_channels {
                        let base = (o * self.in_channels + c) * k * k;
                        for ky in 0..k {
                            for kx in 0..k {
                                acc += self.weight[base + ky * k + kx] * input.at(c, y + ky, x + kx);
                            }
                        }
                    }
                    data.push(precision.round(acc));
                }
            }
        }

        FeatureMap {
            channels: self.out_channels,
            height: out_h,
            width: out_w,
            data,
        }
    }
}

/// Non-overlapping max pooling with a square window.
pub(crate) fn max_pool2d(input: &FeatureMap, window: usize) -> FeatureMap {
    let out_h = input.height / window;
    let out_w = input.width / window;
    let mut data = Vec::with_capacity(input.channels * out_h * out_w);
    for c in 0..input.channels {
        for y in 0..out_h {
            for x in 0..out_w {
                let mut m = f64::NEG_INFINITY;
                for dy in 0..window {
                    for dx in 0..window {
                        m = m.max(input.at(c, y * window + dy, x * window + dx));
                    }
                }
                data.push(m);
            }
        }
    }
    FeatureMap {
        channels: input.channels,
        height: out_h,
        width: out_w,
        data,
    }
}

pub(crate) fn relu_inplace(xs: &mut [f64]) {
    for v in xs {
        *v = v.max(0.0);
    }
}

pub(crate) fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Numerically stable log-softmax.
pub(crate) fn log_softmax(xs: &[f64]) -> Vec<f64> {
    let m = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let lse = m + xs.iter().map(|&v| (v - m).exp()).sum::<f64>().ln();
    xs.iter().map(|&v| v - lse).collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::network::weights::testing::encode;

    #[test]
    fn linear_uses_row_major_weight() {
        let bytes = encode(&[
            ("l.weight", vec![2, 3], vec![1.0, 0.0, 0.0, 0.0, 1.0, 1.0]),
            ("l.bias", vec![2], vec![0.5, -1.0]),
        ]);
        let store = WeightStore::from_bytes(&bytes, Path::new("mem"), Precision::Double).unwrap();
        let lin = Linear::load(&store, "l", 3, 2).unwrap();
        assert_eq!(lin.n_in(), 3);
        assert_eq!(lin.forward(&[2.0, 3.0, 4.0], Precision::Double), vec![2.5, 6.0]);
    }

    #[test]
    fn conv_then_pool_shapes() {
        let bytes = encode(&[
            ("c.weight", vec![2, 1, 3, 3], vec![1.0; 18]),
            ("c.bias", vec![2], vec![0.0, 1.0]),
        ]);
        let store = WeightStore::from_bytes(&bytes, Path::new("mem"), Precision::Double).unwrap();
        let conv = Conv2d::load(&store, "c", 1, 2, 3).unwrap();
        let input = FeatureMap {
            channels: 1,
            height: 6,
            width: 6,
            data: vec![1.0; 36],
        };
        let out = conv.forward(&input, Precision::Double);
        assert_eq!((out.channels, out.height, out.width), (2, 4, 4));
        assert!(out.data[..16].iter().all(|&v| (v - 9.0).abs() < 1e-12));
        assert!(out.data[16..].iter().all(|&v| (v - 10.0).abs() < 1e-12));

        let pooled = max_pool2d(&out, 2);
        assert_eq!((pooled.channels, pooled.height, pooled.width), (2, 2, 2));
    }

    #[test]
    fn log_softmax_normalizes() {
        let lp = log_softmax(&[1.0, 2.0, 3.0, 1000.0]);
        let total: f64 = lp.iter().map(|v| v.exp()).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(lp.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn max_pool_picks_maximum() {
        let input = FeatureMap {
            channels: 1,
            height: 2,
            width: 2,
            data: vec![0.1, 0.7, -3.0, 0.2],
        };
        assert_eq!(max_pool2d(&input, 2).data, vec![0.7]);
    }
}
