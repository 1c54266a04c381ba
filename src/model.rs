use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const ALGORITHM_NAME: &str = "QPEAmplitudeEstimation";

/// Numeric fields recovered from experiment console output. Every field is
/// independently optional; `None` means the text did not report the value
/// and no derivation could fill it in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetrics {
    pub quantum_estimate: Option<f64>,
    pub quantum_std_error: Option<f64>,
    pub analytic_probability: Option<f64>,
    pub classical_estimate: Option<f64>,
    pub classical_std_error: Option<f64>,
    pub difference: Option<f64>,
    pub phase_bits: Option<u32>,
    pub repetitions: Option<u32>,
    pub threshold: Option<f64>,
    pub loss_qubits: Option<u32>,
    pub total_qubits: Option<u32>,
}

/// Phase-measurement outcome counts over an implied denominator of
/// `2^phase_bits`. Outcome keys are always below the denominator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseHistogram {
    pub counts: BTreeMap<u64, u64>,
    pub denominator: Option<u64>,
}

impl PhaseHistogram {
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.counts.values().sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceParameters {
    pub shots: Option<u32>,
    pub phase_bits: Option<u32>,
    pub repetitions: Option<u32>,
    pub threshold: Option<f64>,
    pub loss_qubits: Option<u32>,
    pub mean: f64,
    pub std_dev: f64,
    pub run_sanity_check: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub parameters: InstanceParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetrics {
    pub logical_qubits: Option<u32>,
    pub physical_qubits: Option<u32>,
    pub t_count: Option<u64>,
    pub runtime_days: u32,
    pub phase_bits: Option<u32>,
    pub repetitions: Option<u32>,
    pub quantum_estimate: Option<f64>,
    pub quantum_std_error: Option<f64>,
    pub analytic_probability: Option<f64>,
    pub classical_estimate: Option<f64>,
    pub classical_std_error: Option<f64>,
    pub difference: Option<f64>,
    pub circular_phase: Option<f64>,
    pub circular_amplitude: Option<f64>,
}

/// One persisted single-run artifact. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub timestamp: String,
    pub algorithm: String,
    pub estimator_target: String,
    pub instance: Instance,
    pub metrics: ResultMetrics,
    pub raw_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram_counts: Option<BTreeMap<u64, u64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleMetrics {
    pub ensemble_runs: usize,
    pub runs_requested: usize,
    pub quantum_estimate: Option<f64>,
    pub ensemble_std_deviation: Option<f64>,
    pub ensemble_std_error: Option<f64>,
    pub mean_reported_std_error: Option<f64>,
    pub mean_difference: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytic_probability: Option<f64>,
    pub circular_amplitude: Option<f64>,
    pub circular_phase: Option<f64>,
    pub phase_bits: Option<u32>,
    pub repetitions: Option<u32>,
    pub logical_qubits: Option<u32>,
    pub physical_qubits: Option<u32>,
    pub t_count: Option<u64>,
    pub runtime_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleRunEntry {
    pub index: usize,
    pub timestamp: String,
    pub metrics: ResultMetrics,
    pub source_file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnsembleRuns {
    pub runs: Vec<EnsembleRunEntry>,
}

/// Summary artifact over repeated runs of one configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleRecord {
    pub timestamp: String,
    pub algorithm: String,
    pub mode: String,
    pub estimator_target: String,
    pub instance: Instance,
    pub metrics: EnsembleMetrics,
    pub ensemble: EnsembleRuns,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram_counts: Option<BTreeMap<u64, u64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Single,
    Ensemble,
}

impl CandidateSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Ensemble => "ensemble",
        }
    }
}

/// One appended calibration snapshot. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationEntry {
    pub recorded_utc: String,
    pub source: CandidateSource,
    pub timestamp: Option<String>,
    pub phase_bits: Option<u32>,
    pub repetitions: Option<u32>,
    pub runs: u32,
    pub quantum_estimate: Option<f64>,
    pub std_error: Option<f64>,
    pub theoretical: Option<f64>,
    pub mean_difference: Option<f64>,
    pub relative_error_percent: Option<f64>,
}

/// Append-only drift-tracking log. Grows monotonically; rewritten as a
/// whole document on each append, never truncated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrationHistory {
    #[serde(default)]
    pub records: Vec<CalibrationEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_utc: Option<String>,
}
