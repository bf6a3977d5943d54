//! Scenario-rollout trainer for the risk model.
//!
//! Each scenario starts from the oracle's current state and plays `P` random
//! steps; the label is whether the wait-for graph ends up with a cycle:
//!
//! ```text
//! features ← feature_vector()
//! repeat P times:
//!     p   ← uniform process
//!     req ← uniform [0, max_request]^R
//!     if policy allows → allocate(p, req)
//!     else             → p waits on every holder of a short resource
//!     with prob. release_probability:
//!         release(p, min(uniform [0, max_release]^R, held[p]))
//! label ← detect_cycles() non-empty
//! history.push(features, label)
//! ```
//!
//! Cadence: the whole history is replayed through the model every
//! `train_interval` scenarios, and a `model_checkpoint_<count>.dat` is written
//! every `checkpoint_interval`. When the [`StopFlag`] is raised the loop
//! finishes the in-flight scenario, trains once more and writes the final
//! model before returning.

pub mod stats;
pub mod stop;

use std::path::PathBuf;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

pub use stats::{ScenarioOutcome, TrainerStats, TrainingSummary};
pub use stop::StopFlag;

use crate::config::TrainerConfig;
use crate::errors::Result;
use crate::model::{RiskEstimator, RiskNetwork};
use crate::oracle::DeadlockOracle;

/// Drives random request/release rollouts against an oracle and trains its
/// risk model on the outcomes.
pub struct ScenarioTrainer<'a, M: RiskEstimator = RiskNetwork> {
    oracle: &'a mut DeadlockOracle<M>,
    config: TrainerConfig,
    rng: StdRng,
    stop: StopFlag,
    stats: TrainerStats,
    started: Instant,
}

impl<'a, M: RiskEstimator> ScenarioTrainer<'a, M> {
    /// Trainer seeded from `config.seed`, or from OS entropy when unset.
    pub fn new(oracle: &'a mut DeadlockOracle<M>, config: TrainerConfig, stop: StopFlag) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(oracle, config, stop, rng)
    }

    /// Trainer drawing every random choice from `rng`.
    pub fn with_rng(
        oracle: &'a mut DeadlockOracle<M>,
        mut config: TrainerConfig,
        stop: StopFlag,
        rng: StdRng,
    ) -> Self {
        config.release_probability = config.release_probability.clamp(0.0, 1.0);
        config.max_request = config.max_request.max(0);
        config.max_release = config.max_release.max(0);
        Self {
            oracle,
            config,
            rng,
            stop,
            stats: TrainerStats::default(),
            started: Instant::now(),
        }
    }

    pub fn oracle(&self) -> &DeadlockOracle<M> {
        &*self.oracle
    }

    pub fn stats(&self) -> &TrainerStats {
        &self.stats
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    fn random_vector(&mut self, max: i64) -> Vec<i64> {
        (0..self.oracle.num_resources())
            .map(|_| self.rng.gen_range(0..=max))
            .collect()
    }

    /// Random release for `process`, clamped so it never exceeds holdings.
    fn random_release(&mut self, process: usize) -> Vec<i64> {
        let draw = self.random_vector(self.config.max_release);
        draw.iter()
            .zip(&self.oracle.allocated()[process])
            .map(|(&units, &held)| units.min(held))
            .collect()
    }

    /// `process` waits on every other holder of a resource it could not get.
    fn record_waits(&mut self, process: usize, request: &[i64]) -> Result<()> {
        let mut holders = Vec::new();
        for (r, &units) in request.iter().enumerate() {
            if units <= self.oracle.available()[r] {
                continue;
            }
            for (q, row) in self.oracle.allocated().iter().enumerate() {
                if q != process && row[r] > 0 {
                    holders.push(q);
                }
            }
        }
        for holder in holders {
            if !self.oracle.wait_graph().contains_edge(process, holder) {
                self.oracle.update_wait_edge(process, holder)?;
                self.stats.wait_edges_recorded += 1;
            }
        }
        Ok(())
    }

    /// Play one rollout without labeling or recording it.
    pub fn simulate_scenario(&mut self) -> Result<ScenarioOutcome> {
        let mut outcome = ScenarioOutcome::default();
        let num_processes = self.oracle.num_processes();

        self.oracle.clear_wait_graph();

        if num_processes > 0 {
            for _ in 0..num_processes {
                let process = self.rng.gen_range(0..num_processes);
                let request = self.random_vector(self.config.max_request);

                let decision = self.oracle.decide_request(process, &request)?;
                if decision.is_allocate() {
                    self.oracle.allocate(process, &request)?;
                    outcome.granted += 1;
                    trace!(process, ?request, "Allocated");
                } else {
                    outcome.denied += 1;
                    trace!(process, ?request, ?decision, "Request denied");
                    if self.config.record_wait_edges {
                        self.record_waits(process, &request)?;
                    }
                }

                if self.rng.gen_bool(self.config.release_probability) {
                    let release = self.random_release(process);
                    self.oracle.release(process, &release)?;
                    outcome.releases += 1;
                    trace!(process, ?release, "Released");
                }
            }
        }

        outcome.cycles = self.oracle.detect_cycles();
        Ok(outcome)
    }

    /// Play, label and record one scenario, then apply the train/checkpoint
    /// cadence. Returns the label.
    pub fn run_scenario(&mut self) -> Result<bool> {
        let features = self.oracle.feature_vector();
        let outcome = self.simulate_scenario()?;
        let deadlocked = outcome.deadlocked();

        self.stats.scenarios += 1;
        self.stats.requests_granted += u64::from(outcome.granted);
        self.stats.requests_denied += u64::from(outcome.denied);
        self.stats.releases += u64::from(outcome.releases);
        if deadlocked {
            self.stats.deadlocks += 1;
            debug!(
                scenario = self.stats.scenarios,
                cycles = ?outcome.cycles,
                "Deadlock detected"
            );
        }

        self.oracle.add_training_example(features, deadlocked)?;

        let count = self.stats.scenarios;
        if is_due(count, self.config.checkpoint_interval) {
            self.save_checkpoint(count)?;
        }
        if is_due(count, self.config.train_interval) {
            self.periodic_train()?;
        }

        Ok(deadlocked)
    }

    /// Run exactly `n` scenarios, ignoring the stop flag. Returns the labels.
    pub fn run_scenarios(&mut self, n: u64) -> Result<Vec<bool>> {
        (0..n).map(|_| self.run_scenario()).collect()
    }

    fn periodic_train(&mut self) -> Result<()> {
        self.oracle.train_risk_model();
        self.stats.trainings += 1;
        let accuracy = self.calculate_accuracy()?;
        self.stats.last_accuracy = Some(accuracy);

        info!(
            scenarios = self.stats.scenarios,
            history = self.oracle.history().len(),
            deadlock_rate = self.stats.deadlock_rate(),
            elapsed_secs = self.started.elapsed().as_secs_f64(),
            accuracy_pct = accuracy,
            available = ?self.oracle.available(),
            allocated = ?self.oracle.allocated(),
            "Periodic training complete"
        );
        Ok(())
    }

    /// Write `model_checkpoint_<count>.dat` into the checkpoint directory.
    pub fn save_checkpoint(&mut self, count: u64) -> Result<PathBuf> {
        let path = self.config.checkpoint_path(count);
        self.oracle.save_model(&path)?;
        self.stats.checkpoints += 1;
        info!(scenarios = count, "Checkpoint saved to {}", path.display());
        Ok(path)
    }

    /// Loop until the stop flag is raised (or `max_scenarios` is reached),
    /// then train once more and write the final model.
    pub fn train_continuously(&mut self) -> Result<TrainingSummary> {
        info!(
            train_interval = self.config.train_interval,
            checkpoint_interval = self.config.checkpoint_interval,
            max_scenarios = ?self.config.max_scenarios,
            "Starting continuous training"
        );
        let start = Instant::now();

        while !self.stop.is_stop_requested() {
            if self
                .config
                .max_scenarios
                .is_some_and(|max| self.stats.scenarios >= max)
            {
                break;
            }
            self.run_scenario()?;
        }

        self.oracle.train_risk_model();
        self.stats.trainings += 1;
        let final_model = self.config.final_model_path();
        self.oracle.save_model(&final_model)?;

        let summary = TrainingSummary {
            stats: self.stats.clone(),
            elapsed_secs: start.elapsed().as_secs_f64(),
            final_model,
            history_len: self.oracle.history().len(),
        };
        info!(
            scenarios = summary.stats.scenarios,
            deadlocks = summary.stats.deadlocks,
            elapsed_secs = summary.elapsed_secs,
            "Training completed, model saved to {}",
            summary.final_model.display()
        );
        Ok(summary)
    }

    /// Agreement (percent) between the Banker predicate and the thresholded
    /// risk score over `accuracy_probes` random requests.
    ///
    /// An instrumentation metric only; it does not feed back into training.
    pub fn calculate_accuracy(&mut self) -> Result<f64> {
        let probes = self.config.accuracy_probes;
        let num_processes = self.oracle.num_processes();
        if probes == 0 || num_processes == 0 {
            return Ok(0.0);
        }

        let mut agreements = 0usize;
        for _ in 0..probes {
            let process = self.rng.gen_range(0..num_processes);
            let request = self.random_vector(self.config.max_request);

            let bankers_safe = self.oracle.is_safe(process, &request)?;
            let risk = self.oracle.predict_deadlock_risk(process, &request)?;
            let ml_safe = self.oracle.policy().risk_says_safe(risk);

            if ml_safe == bankers_safe {
                agreements += 1;
            } else {
                debug!(
                    process,
                    ?request,
                    risk,
                    bankers_safe,
                    "Risk model disagreed with Banker's algorithm"
                );
            }
        }

        Ok(agreements as f64 * 100.0 / probes as f64)
    }
}

fn is_due(count: u64, interval: u64) -> bool {
    interval > 0 && count % interval == 0
}
