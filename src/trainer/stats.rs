//! Counters kept by the scenario trainer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Running totals across all scenarios of one trainer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainerStats {
    /// Scenarios completed
    pub scenarios: u64,
    /// Scenarios labeled as deadlocked
    pub deadlocks: u64,
    /// Requests the decision policy allowed
    pub requests_granted: u64,
    /// Requests the decision policy denied
    pub requests_denied: u64,
    /// Random releases applied
    pub releases: u64,
    /// Wait-for edges recorded on denial
    pub wait_edges_recorded: u64,
    /// Full-history training passes
    pub trainings: u64,
    /// Periodic checkpoints written
    pub checkpoints: u64,
    /// Most recent agreement rate with the Banker predicate (percent)
    pub last_accuracy: Option<f64>,
}

impl TrainerStats {
    /// Fraction of scenarios labeled deadlocked.
    pub fn deadlock_rate(&self) -> f64 {
        if self.scenarios == 0 {
            0.0
        } else {
            self.deadlocks as f64 / self.scenarios as f64
        }
    }
}

/// What one rollout did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScenarioOutcome {
    pub granted: u32,
    pub denied: u32,
    pub releases: u32,
    pub cycles: Vec<Vec<usize>>,
}

impl ScenarioOutcome {
    pub fn deadlocked(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// Returned by `train_continuously` once the loop has stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub stats: TrainerStats,
    pub elapsed_secs: f64,
    pub final_model: PathBuf,
    pub history_len: usize,
}
