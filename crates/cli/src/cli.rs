use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Predictive-maintenance monitor for an EV charging station.
///
/// `generate` writes a synthetic healthy corpus, `train` fits the anomaly
/// model on it, `monitor` runs the live simulation against the model.
/// Paths, station identity and LLM settings come from the environment
/// (`.env` is loaded first); flags here override them.
#[derive(Parser, Debug)]
#[command(name = "chargewatch", version, about = "EV charging station predictive maintenance")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a synthetic healthy-operation corpus.
    Generate(GenerateArgs),
    /// Train the anomaly model on a corpus.
    Train(TrainArgs),
    /// Run the live monitoring simulation.
    Monitor(MonitorArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Number of rows to generate.
    #[arg(long, env = "GENERATE_ROWS", default_value_t = 5000)]
    pub rows: usize,

    /// RNG seed (omit for a fresh random corpus).
    #[arg(long, env = "GENERATE_SEED")]
    pub seed: Option<u64>,

    /// Output CSV (default: CORPUS_PATH).
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Input CSV (default: CORPUS_PATH).
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Output model artifact (default: MODEL_PATH).
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Number of isolation trees.
    #[arg(long, env = "TRAIN_ESTIMATORS", default_value_t = 100)]
    pub trees: usize,

    /// Seed for the forest.
    #[arg(long, env = "TRAIN_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Expected outlier share in (0, 0.5]. Omit for the automatic threshold.
    #[arg(long, env = "TRAIN_CONTAMINATION")]
    pub contamination: Option<f64>,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Model artifact to load (default: MODEL_PATH).
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Pause between cycles in milliseconds (default: MONITOR_INTERVAL_MS).
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Stop after this many cycles (default: MONITOR_MAX_CYCLES, else forever).
    #[arg(long)]
    pub max_cycles: Option<u64>,

    /// Seed for the simulated readings.
    #[arg(long, env = "SIMULATOR_SEED")]
    pub seed: Option<u64>,

    /// Append each frame instead of redrawing the screen.
    #[arg(long)]
    pub no_clear: bool,
}
