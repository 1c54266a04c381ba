use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "qaecal",
    version,
    about = "QAE tail-risk result extraction and calibration history tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the experiment once and record a single-run result artifact.
    Estimate(EstimateArgs),
    /// Run the experiment repeatedly and record per-run plus summary artifacts.
    Ensemble(EnsembleArgs),
    /// Append the freshest available result to the calibration history.
    Calibrate(CalibrateArgs),
    /// Inspect existing artifacts and the calibration history.
    Status(StatusArgs),
}

/// Experiment parameters; merge precedence is CLI override > instance-file
/// value > built-in default.
#[derive(Args, Debug, Clone)]
pub struct ParamArgs {
    #[arg(long)]
    pub instance_file: Option<PathBuf>,

    #[arg(long)]
    pub loss_qubits: Option<u32>,

    #[arg(long)]
    pub threshold: Option<f64>,

    #[arg(long)]
    pub mean: Option<f64>,

    #[arg(long)]
    pub std_dev: Option<f64>,

    #[arg(long)]
    pub phase_bits: Option<u32>,

    #[arg(long)]
    pub repetitions: Option<u32>,

    #[arg(long)]
    pub run_sanity_check: Option<bool>,
}

#[derive(Args, Debug, Clone)]
pub struct EstimateArgs {
    #[arg(long, default_value = "estimates")]
    pub estimates_dir: PathBuf,

    #[arg(long)]
    pub experiment_dir: Option<PathBuf>,

    #[command(flatten)]
    pub params: ParamArgs,

    /// Experiment command line, e.g. `-- dotnet run --configuration Release`.
    #[arg(last = true, required = true)]
    pub experiment_command: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EnsembleArgs {
    #[arg(long, default_value = "estimates")]
    pub estimates_dir: PathBuf,

    #[arg(long)]
    pub experiment_dir: Option<PathBuf>,

    /// Number of runs to execute and aggregate.
    #[arg(long)]
    pub runs: usize,

    #[command(flatten)]
    pub params: ParamArgs,

    /// Experiment command line, e.g. `-- dotnet run --configuration Release`.
    #[arg(last = true, required = true)]
    pub experiment_command: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CalibrateArgs {
    #[arg(long, default_value = "estimates")]
    pub estimates_dir: PathBuf,

    /// Defaults to quantum_calibration_history.json inside the estimates
    /// directory.
    #[arg(long)]
    pub history_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "estimates")]
    pub estimates_dir: PathBuf,

    #[arg(long)]
    pub history_file: Option<PathBuf>,
}
