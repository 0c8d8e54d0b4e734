//! Resolves the directory holding the pretrained weights.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable that overrides the pretrained-model directory.
pub const PRETRAINED_ENV: &str = "PRETRAINED_LOCATION";

const DIR_NAME: &str = "pretrained_models";

/// Resolve the pretrained-model directory from the process environment and
/// the current working directory.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the working directory is unavailable
/// or no rule of [`locate_pretrained`] applies.
pub fn pretrained_dir() -> Result<PathBuf> {
    let cwd = std::env::current_dir()
        .map_err(|e| Error::config(format!("cannot read working directory: {e}")))?;
    locate_pretrained(std::env::var_os(PRETRAINED_ENV), &cwd)
}

/// Resolve the pretrained-model directory.
///
/// Rules, in order:
/// 1. `env` (the value of [`PRETRAINED_ENV`]) if set and non-empty;
/// 2. `<cwd>/pretrained_models` if it is a directory;
/// 3. `<cwd>/../pretrained_models` when `cwd` is a `demos` directory.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if none of the rules applies.
pub fn locate_pretrained(env: Option<OsString>, cwd: &Path) -> Result<PathBuf> {
    if let Some(dir) = env.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let local = cwd.join(DIR_NAME);
    if local.is_dir() {
        return Ok(local);
    }

    if cwd.file_name().is_some_and(|n| n == "demos")
        && let Some(parent) = cwd.parent()
    {
        return Ok(parent.join(DIR_NAME));
    }

    Err(Error::config(format!(
        "could not figure out location of pretrained models: set {PRETRAINED_ENV} \
         or run from a directory containing {DIR_NAME}/"
    )))
}
