#![deny(unreachable_pub)]

//! Deadlock-avoidance oracle with a learned risk model.
//!
//! Classical predicates (Banker's safe-state test, Wait-Die, wait-for graph
//! cycle detection) are combined with a small feed-forward network that scores
//! the current allocation state. A scenario trainer feeds the network labeled
//! rollouts and checkpoints it to disk.

pub mod config;
mod errors;
pub mod model;
pub mod oracle;
pub mod trainer;

// Re-exports
pub use config::{AppConfig, LoggingConfig, OracleConfig, SystemConfig, TrainerConfig};
pub use errors::{OracleError, Result};
pub use model::{RiskEstimator, RiskModelCheckpoint, RiskNetwork};
pub use oracle::{
    AllocationState, ConflictDecision, DeadlockOracle, DecisionPolicy, DenyReason,
    RequestDecision, TrainingExample, TrainingHistory, WaitForGraph,
};
pub use trainer::{ScenarioOutcome, ScenarioTrainer, StopFlag, TrainerStats, TrainingSummary};
