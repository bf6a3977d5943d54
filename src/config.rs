//! Configuration for the oracle, the scenario trainer and the trainer binary.
//!
//! Every field has a serde default so partial TOML files work; missing
//! sections fall back to the values the classical example system uses
//! (3 resources, 5 processes, inventory `(10, 5, 7)`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// Oracle
// ============================================================================

/// Configuration for a [`DeadlockOracle`](crate::DeadlockOracle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Hidden layer width of the risk network
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    /// SGD step size used by `train`
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Scale applied to N(0, 1) draws when initializing parameters
    #[serde(default = "default_init_scale")]
    pub init_scale: f64,
    /// Risk must be strictly below this for the augmented Banker check to pass
    #[serde(default = "default_bankers_risk_threshold")]
    pub bankers_risk_threshold: f64,
    /// Risk must be strictly below this for the augmented Wait-Die to let a requester wait
    #[serde(default = "default_wait_die_risk_threshold")]
    pub wait_die_risk_threshold: f64,
    /// Ring-buffer bound on training history. `None` keeps every example.
    #[serde(default)]
    pub history_capacity: Option<usize>,
}

fn default_hidden_size() -> usize {
    10
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_init_scale() -> f64 {
    0.1
}

fn default_bankers_risk_threshold() -> f64 {
    0.5
}

fn default_wait_die_risk_threshold() -> f64 {
    0.7
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            hidden_size: default_hidden_size(),
            learning_rate: default_learning_rate(),
            init_scale: default_init_scale(),
            bankers_risk_threshold: default_bankers_risk_threshold(),
            wait_die_risk_threshold: default_wait_die_risk_threshold(),
            history_capacity: None,
        }
    }
}

// ============================================================================
// Scenario trainer
// ============================================================================

/// Configuration for the [`ScenarioTrainer`](crate::trainer::ScenarioTrainer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Upper bound (inclusive) of each random request coordinate
    #[serde(default = "default_max_request")]
    pub max_request: i64,
    /// Upper bound (inclusive) of each random release coordinate
    #[serde(default = "default_max_release")]
    pub max_release: i64,
    /// Probability of a random release after each request attempt
    #[serde(default = "default_release_probability")]
    pub release_probability: f64,
    /// Replay the whole history through the model every N scenarios
    #[serde(default = "default_train_interval")]
    pub train_interval: u64,
    /// Write `model_checkpoint_<count>.dat` every N scenarios
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,
    /// Number of probes used by `calculate_accuracy`
    #[serde(default = "default_accuracy_probes")]
    pub accuracy_probes: usize,
    /// Directory receiving periodic checkpoints and the final model
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
    /// File name of the model written when the loop stops
    #[serde(default = "default_final_model_file")]
    pub final_model_file: String,
    /// Record wait-for edges when a request is denied for lack of inventory
    #[serde(default = "default_record_wait_edges")]
    pub record_wait_edges: bool,
    /// Seed for the scenario generator. `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Stop on its own after this many scenarios
    #[serde(default)]
    pub max_scenarios: Option<u64>,
}

fn default_max_request() -> i64 {
    5
}

fn default_max_release() -> i64 {
    3
}

fn default_release_probability() -> f64 {
    0.5
}

fn default_train_interval() -> u64 {
    1_000
}

fn default_checkpoint_interval() -> u64 {
    10_000
}

fn default_accuracy_probes() -> usize {
    100
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_final_model_file() -> String {
    "final_model.dat".to_string()
}

fn default_record_wait_edges() -> bool {
    true
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_request: default_max_request(),
            max_release: default_max_release(),
            release_probability: default_release_probability(),
            train_interval: default_train_interval(),
            checkpoint_interval: default_checkpoint_interval(),
            accuracy_probes: default_accuracy_probes(),
            checkpoint_dir: default_checkpoint_dir(),
            final_model_file: default_final_model_file(),
            record_wait_edges: default_record_wait_edges(),
            seed: None,
            max_scenarios: None,
        }
    }
}

impl TrainerConfig {
    /// Path of the periodic checkpoint written after `count` scenarios.
    pub fn checkpoint_path(&self, count: u64) -> PathBuf {
        self.checkpoint_dir
            .join(format!("model_checkpoint_{count}.dat"))
    }

    /// Path of the model written when training stops.
    pub fn final_model_path(&self) -> PathBuf {
        self.checkpoint_dir.join(&self.final_model_file)
    }
}

// ============================================================================
// Binary configuration
// ============================================================================

/// Initial inventory and claims the trainer binary seeds the oracle with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Free units per resource class; its length fixes R
    #[serde(default = "default_available")]
    pub available: Vec<i64>,
    /// One row of maximum claims per process; its length fixes P
    #[serde(default = "default_max_need")]
    pub max_need: Vec<Vec<i64>>,
}

fn default_available() -> Vec<i64> {
    vec![10, 5, 7]
}

fn default_max_need() -> Vec<Vec<i64>> {
    vec![
        vec![7, 5, 3],
        vec![3, 2, 2],
        vec![9, 0, 2],
        vec![2, 2, 2],
        vec![4, 3, 3],
    ]
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            available: default_available(),
            max_need: default_max_need(),
        }
    }
}

impl SystemConfig {
    pub fn num_resources(&self) -> usize {
        self.available.len()
    }

    pub fn num_processes(&self) -> usize {
        self.max_need.len()
    }
}

/// Log output settings for the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: pretty, compact or json
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Top-level TOML document read by `deadlock_trainer`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub trainer: TrainerConfig,
}
