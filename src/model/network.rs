//! Single-hidden-layer feed-forward risk regressor.
//!
//! ```text
//! x ∈ ℝⁿ ──W1ᵀ,b1──▶ σ ──▶ h ∈ ℝʰ ──w2,b2──▶ σ ──▶ risk ∈ (0, 1)
//! ```
//!
//! Trained with plain per-example SGD on squared error: no shuffling, no
//! epochs, no momentum. Given a seeded generator, construction and training
//! are fully deterministic.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use super::checkpoint::{RiskModelCheckpoint, CHECKPOINT_VERSION};
use super::RiskEstimator;
use crate::errors::{OracleError, Result};

/// Keeps saturated outputs strictly inside (0, 1).
const PROB_FLOOR: f64 = 1e-12;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Feed-forward network with logistic activations on both layers.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskNetwork {
    /// input_size × hidden_size
    w1: DMatrix<f64>,
    b1: DVector<f64>,
    /// hidden_size × 1
    w2: DVector<f64>,
    b2: f64,
    learning_rate: f64,
    updates: u64,
}

impl RiskNetwork {
    /// Sample every parameter from N(0, 1) · `init_scale`.
    ///
    /// Draw order: W1 row by row, then (w2[j], b1[j]) per hidden unit, then b2.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_size: usize,
        learning_rate: f64,
        init_scale: f64,
        rng: &mut R,
    ) -> Self {
        let mut draw = || {
            let z: f64 = StandardNormal.sample(&mut *rng);
            z * init_scale
        };

        let mut w1 = DMatrix::zeros(input_size, hidden_size);
        for i in 0..input_size {
            for j in 0..hidden_size {
                w1[(i, j)] = draw();
            }
        }

        let mut w2 = DVector::zeros(hidden_size);
        let mut b1 = DVector::zeros(hidden_size);
        for j in 0..hidden_size {
            w2[j] = draw();
            b1[j] = draw();
        }
        let b2 = draw();

        Self {
            w1,
            b1,
            w2,
            b2,
            learning_rate,
            updates: 0,
        }
    }

    pub fn hidden_size(&self) -> usize {
        self.b1.len()
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Total SGD updates applied over the model's lifetime.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    fn hidden(&self, x: &DVector<f64>) -> DVector<f64> {
        (self.w1.tr_mul(x) + &self.b1).map(sigmoid)
    }

    fn forward(&self, x: &DVector<f64>) -> (DVector<f64>, f64) {
        let hidden = self.hidden(x);
        let output = sigmoid(self.w2.dot(&hidden) + self.b2);
        (hidden, output)
    }

    fn step(&mut self, x: &DVector<f64>, target: f64) {
        let (hidden, output) = self.forward(x);

        let output_delta = (output - target) * output * (1.0 - output);

        // Hidden deltas use the pre-update output weights.
        let hidden_delta = DVector::from_fn(hidden.len(), |j, _| {
            self.w2[j] * output_delta * hidden[j] * (1.0 - hidden[j])
        });

        let lr = self.learning_rate;
        self.b2 -= lr * output_delta;
        self.w2.axpy(-lr * output_delta, &hidden, 1.0);
        self.b1.axpy(-lr, &hidden_delta, 1.0);
        self.w1.ger(-lr, x, &hidden_delta, 1.0);

        self.updates += 1;
    }

    pub fn to_checkpoint(&self) -> RiskModelCheckpoint {
        let (input_size, hidden_size) = self.w1.shape();
        let mut w1 = Vec::with_capacity(input_size * hidden_size);
        for i in 0..input_size {
            for j in 0..hidden_size {
                w1.push(self.w1[(i, j)]);
            }
        }
        RiskModelCheckpoint {
            version: CHECKPOINT_VERSION,
            input_size,
            hidden_size,
            w1,
            b1: self.b1.iter().copied().collect(),
            w2: self.w2.iter().copied().collect(),
            b2: self.b2,
            updates: self.updates,
        }
    }

    /// Overwrite parameters from a checkpoint of the same shape.
    pub fn restore_from_checkpoint(&mut self, checkpoint: &RiskModelCheckpoint) -> Result<()> {
        let (input_size, hidden_size) = self.w1.shape();
        checkpoint
            .validate(input_size, hidden_size)
            .map_err(|msg| OracleError::model_io("<memory>", msg))?;

        self.w1 = DMatrix::from_row_slice(input_size, hidden_size, &checkpoint.w1);
        self.b1 = DVector::from_column_slice(&checkpoint.b1);
        self.w2 = DVector::from_column_slice(&checkpoint.w2);
        self.b2 = checkpoint.b2;
        self.updates = checkpoint.updates;
        Ok(())
    }
}

impl RiskEstimator for RiskNetwork {
    fn input_size(&self) -> usize {
        self.w1.nrows()
    }

    fn predict(&self, features: &[f64]) -> f64 {
        debug_assert_eq!(features.len(), self.input_size());
        let x = DVector::from_column_slice(features);
        let (_, output) = self.forward(&x);
        output.clamp(PROB_FLOOR, 1.0 - PROB_FLOOR)
    }

    fn train(&mut self, inputs: &[Vec<f64>], targets: &[f64]) {
        debug_assert_eq!(inputs.len(), targets.len());
        for (features, &target) in inputs.iter().zip(targets) {
            let x = DVector::from_column_slice(features);
            self.step(&x, target);
        }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        self.to_checkpoint().to_bytes()
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<()> {
        let checkpoint = RiskModelCheckpoint::from_bytes(bytes)?;
        self.restore_from_checkpoint(&checkpoint)
    }

    fn name(&self) -> &str {
        "feed_forward"
    }
}
