//! Persisted form of the risk network.
//!
//! The blob is a MessagePack-encoded [`RiskModelCheckpoint`]. Floats are
//! stored as raw 64-bit values so a save/load round-trip is bit-exact.
//! Writes go to `<path>.tmp` first and are renamed into place, so a reader
//! never observes a half-written model.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{OracleError, Result};

/// Current checkpoint schema version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Learned parameters of a single-hidden-layer risk network.
///
/// Matrices are flattened row-major: `w1[i * hidden_size + j]` is the
/// weight from input `i` to hidden unit `j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskModelCheckpoint {
    /// Schema version for forward compatibility
    pub version: u32,
    pub input_size: usize,
    pub hidden_size: usize,
    /// Input → hidden weights (input_size × hidden_size)
    pub w1: Vec<f64>,
    /// Hidden biases (hidden_size)
    pub b1: Vec<f64>,
    /// Hidden → output weights (hidden_size)
    pub w2: Vec<f64>,
    /// Output bias
    pub b2: f64,
    /// Number of SGD updates applied so far
    pub updates: u64,
}

impl RiskModelCheckpoint {
    /// Check internal consistency and agreement with the expected shape.
    pub fn validate(
        &self,
        input_size: usize,
        hidden_size: usize,
    ) -> std::result::Result<(), String> {
        if self.version != CHECKPOINT_VERSION {
            return Err(format!(
                "unsupported checkpoint version {} (expected {CHECKPOINT_VERSION})",
                self.version
            ));
        }
        if self.input_size != input_size || self.hidden_size != hidden_size {
            return Err(format!(
                "shape mismatch: checkpoint is {}x{}, model is {input_size}x{hidden_size}",
                self.input_size, self.hidden_size
            ));
        }
        if self.w1.len() != input_size * hidden_size
            || self.b1.len() != hidden_size
            || self.w2.len() != hidden_size
        {
            return Err("truncated parameter arrays".to_string());
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(self)
            .map_err(|e| OracleError::model_io("<memory>", format!("MessagePack encode: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        rmp_serde::from_slice(bytes)
            .map_err(|e| OracleError::model_io("<memory>", format!("MessagePack decode: {e}")))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `bytes` to `path` via a temporary file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| OracleError::model_io(path, e))?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(|e| OracleError::model_io(path, e))?;
    fs::rename(&tmp, path).map_err(|e| OracleError::model_io(path, e))?;

    info!(bytes = bytes.len(), "Model saved to {}", path.display());
    Ok(())
}

/// Read a whole model file.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path).map_err(|e| OracleError::model_io(path, e))?;
    debug!(bytes = bytes.len(), "Read model from {}", path.display());
    Ok(bytes)
}
