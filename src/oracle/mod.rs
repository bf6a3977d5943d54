//! Deadlock-safety oracle.
//!
//! [`DeadlockOracle`] owns the allocation state, the wait-for graph, the risk
//! model and the training history, and answers one question: may this
//! request be granted without risking deadlock?
//!
//! ## Architecture
//!
//! ```text
//! AllocationState ──┬──▶ safety::is_safe ──┐
//!                   │                      ├──▶ DecisionPolicy ──▶ allocate / deny
//!                   └──▶ feature_vector ──▶ RiskEstimator::predict
//!                                          │
//! timestamps ─────────▶ safety::wait_die ──┴──▶ DecisionPolicy ──▶ wait / abort
//!
//! WaitForGraph ───────▶ detect_cycles ──▶ "deadlocked?"
//! ```
//!
//! Everything is synchronous and single-threaded. Embedders calling from
//! several threads must provide their own mutual exclusion.

pub mod graph;
pub mod history;
pub mod policy;
pub mod safety;
pub mod state;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

pub use graph::WaitForGraph;
pub use history::{TrainingExample, TrainingHistory};
pub use policy::{ConflictDecision, DecisionPolicy, DenyReason, RequestDecision};
pub use state::AllocationState;

use crate::config::{OracleConfig, SystemConfig};
use crate::errors::{OracleError, Result};
use crate::model::{RiskEstimator, RiskNetwork};

/// Resource-allocation safety oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadlockOracle<M: RiskEstimator = RiskNetwork> {
    state: AllocationState,
    wait_graph: WaitForGraph,
    model: M,
    history: TrainingHistory,
    policy: DecisionPolicy,
    config: OracleConfig,
}

impl DeadlockOracle<RiskNetwork> {
    /// Oracle with default config and a risk network seeded from OS entropy.
    pub fn new(num_resources: usize, num_processes: usize) -> Self {
        let mut rng = StdRng::from_entropy();
        Self::with_rng(num_resources, num_processes, OracleConfig::default(), &mut rng)
    }

    /// Oracle whose risk network is initialized deterministically from `seed`.
    pub fn seeded(num_resources: usize, num_processes: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::with_rng(num_resources, num_processes, OracleConfig::default(), &mut rng)
    }

    /// Oracle with an explicit config, drawing initial weights from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        num_resources: usize,
        num_processes: usize,
        config: OracleConfig,
        rng: &mut R,
    ) -> Self {
        let model = RiskNetwork::new(
            state::feature_len(num_resources, num_processes),
            config.hidden_size,
            config.learning_rate,
            config.init_scale,
            rng,
        );
        Self::assemble(num_resources, num_processes, config, model)
    }

    /// Oracle sized and initialized from a system description: inventory as
    /// `available`, claims as `max_need`, nothing held.
    pub fn from_system<R: Rng + ?Sized>(
        system: &SystemConfig,
        config: OracleConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let mut oracle =
            Self::with_rng(system.num_resources(), system.num_processes(), config, rng);
        oracle.set_available(system.available.clone())?;
        oracle.set_max_need(system.max_need.clone())?;
        Ok(oracle)
    }
}

impl<M: RiskEstimator> DeadlockOracle<M> {
    /// Oracle around a caller-supplied risk model.
    ///
    /// Fails if the model does not accept `R·P + R` features.
    pub fn with_model(
        num_resources: usize,
        num_processes: usize,
        config: OracleConfig,
        model: M,
    ) -> Result<Self> {
        let expected = state::feature_len(num_resources, num_processes);
        if model.input_size() != expected {
            return Err(OracleError::InvalidDimensions {
                what: "risk model input",
                expected,
                actual: model.input_size(),
            });
        }
        Ok(Self::assemble(num_resources, num_processes, config, model))
    }

    fn assemble(
        num_resources: usize,
        num_processes: usize,
        config: OracleConfig,
        model: M,
    ) -> Self {
        Self {
            state: AllocationState::new(num_resources, num_processes),
            wait_graph: WaitForGraph::new(),
            model,
            history: TrainingHistory::new(config.history_capacity),
            policy: DecisionPolicy::from_config(&config),
            config,
        }
    }

    // ------------------------------------------------------------------
    // State accessors
    // ------------------------------------------------------------------

    pub fn num_resources(&self) -> usize {
        self.state.num_resources()
    }

    pub fn num_processes(&self) -> usize {
        self.state.num_processes()
    }

    pub fn state(&self) -> &AllocationState {
        &self.state
    }

    pub fn available(&self) -> &[i64] {
        self.state.available()
    }

    pub fn allocated(&self) -> &[Vec<i64>] {
        self.state.allocated()
    }

    pub fn max_need(&self) -> &[Vec<i64>] {
        self.state.max_need()
    }

    pub fn set_available(&mut self, available: Vec<i64>) -> Result<()> {
        self.state.set_available(available)
    }

    pub fn set_max_need(&mut self, max_need: Vec<Vec<i64>>) -> Result<()> {
        self.state.set_max_need(max_need)
    }

    pub fn set_allocated(&mut self, allocated: Vec<Vec<i64>>) -> Result<()> {
        self.state.set_allocated(allocated)
    }

    pub fn allocate(&mut self, process: usize, request: &[i64]) -> Result<()> {
        self.state.allocate(process, request)
    }

    pub fn release(&mut self, process: usize, release: &[i64]) -> Result<()> {
        self.state.release(process, release)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Wait-for graph
    // ------------------------------------------------------------------

    /// Record that `process` waits on `holder`. Idempotent.
    pub fn update_wait_edge(&mut self, process: usize, holder: usize) -> Result<()> {
        self.state.check_process(process)?;
        self.state.check_process(holder)?;
        if self.wait_graph.insert_edge(process, holder) {
            trace!(from = process, to = holder, "Wait edge added");
        }
        Ok(())
    }

    pub fn clear_wait_graph(&mut self) {
        self.wait_graph.clear();
    }

    pub fn wait_graph(&self) -> &WaitForGraph {
        &self.wait_graph
    }

    /// Current `(waiter, holder)` edges in ascending order.
    pub fn wait_edges(&self) -> Vec<(usize, usize)> {
        self.wait_graph.edges().collect()
    }

    /// Cycles in the wait-for graph; non-empty means deadlocked.
    pub fn detect_cycles(&self) -> Vec<Vec<usize>> {
        self.wait_graph.detect_cycles()
    }

    // ------------------------------------------------------------------
    // Classical predicates
    // ------------------------------------------------------------------

    fn check_request(&self, process: usize, request: &[i64]) -> Result<()> {
        self.state.check_target(process)?;
        self.state.check_vector("request", request)
    }

    /// Banker's safe-state test for granting `request` to `process`.
    ///
    /// Trivially true when the system has no processes.
    pub fn is_safe(&self, process: usize, request: &[i64]) -> Result<bool> {
        self.check_request(process, request)?;
        Ok(safety::is_safe(&self.state, process, request))
    }

    /// The finish order proving the simulated grant safe, if any.
    pub fn safe_sequence(&self, process: usize, request: &[i64]) -> Result<Option<Vec<usize>>> {
        self.check_request(process, request)?;
        Ok(safety::safe_sequence(&self.state, process, request))
    }

    /// Wait-Die: true if `requester` should wait on `holder`.
    pub fn wait_die(
        &self,
        requester: usize,
        holder: usize,
        timestamps: &HashMap<usize, f64>,
    ) -> Result<bool> {
        safety::wait_die(requester, holder, timestamps)
    }

    // ------------------------------------------------------------------
    // Risk and hybrid decisions
    // ------------------------------------------------------------------

    /// Current holdings row-major followed by free inventory.
    pub fn feature_vector(&self) -> Vec<f64> {
        self.state.feature_vector()
    }

    /// Learned deadlock risk for the current state.
    ///
    /// The request is validated but does not enter the features.
    pub fn predict_deadlock_risk(&self, process: usize, request: &[i64]) -> Result<f64> {
        self.check_request(process, request)?;
        let risk = self.model.predict(&self.feature_vector());
        debug!(process, risk, "Deadlock risk prediction");
        Ok(risk)
    }

    pub fn decide_request(&self, process: usize, request: &[i64]) -> Result<RequestDecision> {
        let safe = self.is_safe(process, request)?;
        let risk = self.predict_deadlock_risk(process, request)?;
        Ok(self.policy.decide_request(safe, risk))
    }

    /// Banker's test AND risk below the Banker threshold.
    pub fn ml_augmented_bankers(&self, process: usize, request: &[i64]) -> Result<bool> {
        Ok(self.decide_request(process, request)?.is_allocate())
    }

    pub fn decide_conflict(
        &self,
        requester: usize,
        holder: usize,
        timestamps: &HashMap<usize, f64>,
    ) -> Result<ConflictDecision> {
        self.state.check_process(requester)?;
        self.state.check_process(holder)?;
        let should_wait = self.wait_die(requester, holder, timestamps)?;
        let probe = vec![1; self.num_resources()];
        let risk = self.predict_deadlock_risk(requester, &probe)?;
        Ok(self.policy.decide_conflict(should_wait, risk))
    }

    /// Wait-Die AND risk below the Wait-Die threshold.
    pub fn ml_augmented_wait_die(
        &self,
        requester: usize,
        holder: usize,
        timestamps: &HashMap<usize, f64>,
    ) -> Result<bool> {
        Ok(self.decide_conflict(requester, holder, timestamps)?.is_wait())
    }

    // ------------------------------------------------------------------
    // Training and persistence
    // ------------------------------------------------------------------

    pub fn add_training_example(
        &mut self,
        features: Vec<f64>,
        led_to_deadlock: bool,
    ) -> Result<()> {
        let expected = self.state.feature_len();
        if features.len() != expected {
            return Err(OracleError::InvalidDimensions {
                what: "training features",
                expected,
                actual: features.len(),
            });
        }
        self.history.push(TrainingExample {
            features,
            led_to_deadlock,
        });
        Ok(())
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Replay the whole history through the model once. No-op when empty.
    pub fn train_risk_model(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let (inputs, targets) = self.history.to_batch();
        debug!(
            model = self.model.name(),
            examples = inputs.len(),
            positives = self.history.positives(),
            "Training risk model"
        );
        self.model.train(&inputs, &targets);
    }

    pub fn save_model(&self, path: impl AsRef<Path>) -> Result<()> {
        self.model.save(path.as_ref())
    }

    pub fn load_model(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.model.load(path)?;
        info!(model = self.model.name(), "Loaded risk model from {}", path.display());
        Ok(())
    }
}
