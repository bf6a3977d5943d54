//! Deadlock-risk trainer.
//!
//! Seeds an oracle from a TOML system description, then plays random
//! request/release scenarios until Ctrl+C (or `--max-scenarios`), training the
//! risk model periodically and checkpointing it to disk.
//!
//! Usage:
//! ```
//! cargo run --release --bin deadlock_trainer -- --seed 42 --checkpoint-dir models
//! cargo run --release --bin deadlock_trainer -- generate-config
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use deadlock_oracle::{AppConfig, DeadlockOracle, ScenarioTrainer, StopFlag};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "deadlock_trainer")]
#[command(
    version,
    about = "Scenario-rollout trainer for the deadlock risk model",
    long_about = None
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "deadlock_trainer.toml")]
    config: String,

    /// Seed for weight init and scenario generation (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for checkpoints and the final model (overrides config)
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Stop after this many scenarios instead of waiting for Ctrl+C
    #[arg(long)]
    max_scenarios: Option<u64>,

    /// Warm-start from a previously saved model
    #[arg(long)]
    load: Option<PathBuf>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a sample config file
    GenerateConfig {
        /// Output file path
        #[arg(short, long, default_value = "deadlock_trainer.toml")]
        output: String,
    },
    /// Validate config without running
    ValidateConfig,
    /// Run the trainer (default)
    Run,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::GenerateConfig { output }) => {
            generate_sample_config(output)?;
            return Ok(());
        }
        Some(Commands::ValidateConfig) => {
            let config = load_config(&cli)?;
            println!("Configuration is valid:\n{:#?}", config);
            return Ok(());
        }
        Some(Commands::Run) | None => {}
    }

    let mut config = load_config(&cli)?;
    apply_overrides(&mut config, &cli);
    setup_logging(&config, &cli);

    let seed = config.trainer.seed;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut oracle = DeadlockOracle::from_system(&config.system, config.oracle.clone(), &mut rng)?;

    if let Some(path) = &cli.load {
        oracle.load_model(path)?;
    }

    info!(
        resources = oracle.num_resources(),
        processes = oracle.num_processes(),
        available = ?oracle.available(),
        seed = ?seed,
        checkpoint_dir = %config.trainer.checkpoint_dir.display(),
        "Deadlock trainer initialized"
    );

    // Ctrl+C handler
    let stop = StopFlag::new();
    let stop_clone = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, finishing current scenario");
            stop_clone.request_stop();
        } else {
            warn!("Could not listen for Ctrl+C; stop with --max-scenarios");
        }
    });

    let trainer_config = config.trainer.clone();
    let summary = tokio::task::spawn_blocking(move || {
        ScenarioTrainer::new(&mut oracle, trainer_config, stop).train_continuously()
    })
    .await??;

    info!(
        scenarios = summary.stats.scenarios,
        deadlocks = summary.stats.deadlocks,
        deadlock_rate = summary.stats.deadlock_rate(),
        granted = summary.stats.requests_granted,
        denied = summary.stats.requests_denied,
        trainings = summary.stats.trainings,
        checkpoints = summary.stats.checkpoints,
        last_accuracy = ?summary.stats.last_accuracy,
        history = summary.history_len,
        elapsed_secs = summary.elapsed_secs,
        "Training finished, final model at {}",
        summary.final_model.display()
    );

    if let Some(path) = &cli.summary {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        info!("Summary written to {}", path.display());
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn load_config(cli: &Cli) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config_path = &cli.config;
    if Path::new(config_path).exists() {
        let content = std::fs::read_to_string(config_path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    } else {
        Ok(AppConfig::default())
    }
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(seed) = cli.seed {
        config.trainer.seed = Some(seed);
    }
    if let Some(dir) = &cli.checkpoint_dir {
        config.trainer.checkpoint_dir = dir.clone();
    }
    if let Some(max) = cli.max_scenarios {
        config.trainer.max_scenarios = Some(max);
    }
}

fn setup_logging(config: &AppConfig, cli: &Cli) {
    let level = cli.log_level.as_ref().unwrap_or(&config.logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let format = cli
        .log_format
        .as_deref()
        .unwrap_or(config.logging.format.as_str());

    match format {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .compact()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
        }
    }
}

fn generate_sample_config(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let sample = AppConfig::default();
    let content = toml::to_string_pretty(&sample)?;

    let with_comments = format!(
        r#"# Deadlock Trainer Configuration
# See: cargo run --bin deadlock_trainer -- --help
#
# [system] fixes the resource count (length of `available`) and the process
# count (rows of `max_need`). Unset `trainer.seed` for an entropy seed.

{}
"#,
        content
    );

    std::fs::write(path, with_comments)?;
    println!("Sample config written to: {}", path);
    Ok(())
}
