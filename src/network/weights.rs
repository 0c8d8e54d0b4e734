//! Frozen parameter sets read from safetensors files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use safetensors::SafeTensors;
use safetensors::tensor::Dtype;

use crate::error::{Error, Result};
use crate::types::Precision;

/// A named tensor: row-major values and shape.
#[derive(Clone, Debug)]
struct Tensor {
    shape: Vec<usize>,
    values: Vec<f64>,
}

/// All tensors of one safetensors file, converted to `f64`.
///
/// Tensors are stored `F32` or `F64`; values are rounded to the requested
/// [`Precision`] on load. Names and shapes follow the PyTorch state-dict
/// layout (`fc1.weight` is `[out, in]`, `conv1.weight` is
/// `[out, in, kh, kw]`).
#[derive(Clone, Debug)]
pub struct WeightStore {
    path: PathBuf,
    tensors: HashMap<String, Tensor>,
}

impl WeightStore {
    /// Read and decode a safetensors file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file cannot be read, is not a
    /// valid safetensors buffer, or holds a tensor with an unsupported dtype.
    pub fn open(path: impl AsRef<Path>, precision: Precision) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| Error::config(format!("cannot read weights {}: {e}", path.display())))?;
        Self::from_bytes(&bytes, path, precision)
    }

    /// Decode an in-memory safetensors buffer. `origin` is only used in
    /// error messages.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), minus the I/O failure.
    pub fn from_bytes(bytes: &[u8], origin: &Path, precision: Precision) -> Result<Self> {
        let parsed = SafeTensors::deserialize(bytes).map_err(|e| {
            Error::config(format!("malformed weights {}: {e}", origin.display()))
        })?;

        let mut tensors = HashMap::new();
        for (name, view) in parsed.tensors() {
            let values = decode_values(view.dtype(), view.data()).ok_or_else(|| {
                Error::config(format!(
                    "tensor '{name}' in {} has unsupported dtype {:?}",
                    origin.display(),
                    view.dtype()
                ))
            })?;
            let values = values.into_iter().map(|v| precision.round(v)).collect();
            tensors.insert(
                name,
                Tensor {
                    shape: view.shape().to_vec(),
                    values,
                },
            );
        }

        trace_debug!(path = %origin.display(), n_tensors = tensors.len(), "weights loaded");

        Ok(Self {
            path: origin.to_path_buf(),
            tensors,
        })
    }

    /// Returns `true` if a tensor with this name exists.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// Fetch a tensor's values, checking its shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the tensor is missing or its
    /// shape differs from `shape`.
    pub fn take(&self, name: &str, shape: &[usize]) -> Result<Vec<f64>> {
        let tensor = self.tensors.get(name).ok_or_else(|| {
            Error::config(format!("tensor '{name}' missing from {}", self.path.display()))
        })?;
        if tensor.shape != shape {
            return Err(Error::config(format!(
                "tensor '{name}' in {} has shape {:?}, expected {shape:?}",
                self.path.display(),
                tensor.shape
            )));
        }
        Ok(tensor.values.clone())
    }
}

fn decode_values(dtype: Dtype, data: &[u8]) -> Option<Vec<f64>> {
    match dtype {
        Dtype::F32 => Some(
            data.chunks_exact(4)
                .map(|c| {
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(c);
                    f64::from(f32::from_le_bytes(raw))
                })
                .collect(),
        ),
        Dtype::F64 => Some(
            data.chunks_exact(8)
                .map(|c| {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(c);
                    f64::from_le_bytes(raw)
                })
                .collect(),
        ),
        _ => None,
    }
}
