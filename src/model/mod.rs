//! Learned deadlock-risk estimation.
//!
//! The oracle only depends on the [`RiskEstimator`] trait: a scalar
//! regressor from a fixed-length feature vector to a risk in (0, 1), with
//! online training and an opaque persisted form. [`RiskNetwork`] is the
//! default implementation; a richer model can be dropped in without touching
//! the decision policy.

pub mod checkpoint;
pub mod network;

use std::path::Path;

pub use checkpoint::RiskModelCheckpoint;
pub use network::RiskNetwork;

use crate::errors::{OracleError, Result};

/// Scalar deadlock-risk regressor.
pub trait RiskEstimator {
    /// Feature-vector length this model accepts.
    fn input_size(&self) -> usize;

    /// Risk score for `features`, strictly inside (0, 1). Pure.
    ///
    /// Callers must pass exactly `input_size()` features.
    fn predict(&self, features: &[f64]) -> f64;

    /// One in-order pass over `(inputs[i], targets[i])`, one update per example.
    fn train(&mut self, inputs: &[Vec<f64>], targets: &[f64]);

    /// Serialize the learned parameters into an opaque blob.
    fn encode(&self) -> Result<Vec<u8>>;

    /// Replace the learned parameters with those in `bytes`.
    fn decode(&mut self, bytes: &[u8]) -> Result<()>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "risk"
    }

    /// Persist the parameters to `path` atomically.
    fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.encode().map_err(|e| relabel(e, path))?;
        checkpoint::write_atomic(path, &bytes)
    }

    /// Restore parameters previously written by [`save`](Self::save).
    fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = checkpoint::read_file(path)?;
        self.decode(&bytes).map_err(|e| relabel(e, path))
    }
}

fn relabel(err: OracleError, path: &Path) -> OracleError {
    match err {
        OracleError::ModelIo { message, .. } => OracleError::model_io(path, message),
        other => other,
    }
}
