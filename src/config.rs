use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::cli::ParamArgs;

/// Resolved experiment parameters, built once at the entry point and
/// threaded through every call. Merge precedence is CLI override >
/// instance-file value > built-in default.
#[derive(Debug, Clone, PartialEq)]
pub struct RunParams {
    pub loss_qubits: u32,
    pub threshold: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub phase_bits: u32,
    pub repetitions: u32,
    pub run_sanity_check: bool,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            loss_qubits: 4,
            threshold: 2.5,
            mean: 0.0,
            std_dev: 1.0,
            phase_bits: 6,
            repetitions: 120,
            run_sanity_check: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct InstanceFile {
    #[serde(default)]
    loss_encoding: LossEncoding,
    #[serde(default)]
    risk_threshold: Option<f64>,
    #[serde(default)]
    amplitude_estimation: AmplitudeEstimation,
    #[serde(default)]
    distribution: Distribution,
}

#[derive(Debug, Default, Deserialize)]
struct LossEncoding {
    #[serde(default)]
    num_qubits: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AmplitudeEstimation {
    #[serde(default)]
    precision_qubits: Option<u32>,
    #[serde(default)]
    repetitions: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct Distribution {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    parameters: DistributionParameters,
}

#[derive(Debug, Default, Deserialize)]
struct DistributionParameters {
    #[serde(default)]
    mean: Option<f64>,
    #[serde(default)]
    std_dev: Option<f64>,
}

pub fn resolve_params(args: &ParamArgs) -> Result<RunParams> {
    let mut params = RunParams::default();

    if let Some(path) = &args.instance_file {
        if path.exists() {
            apply_instance_file(&mut params, path)?;
        } else {
            warn!(path = %path.display(), "instance file not found; using built-in defaults");
        }
    }

    if let Some(loss_qubits) = args.loss_qubits {
        params.loss_qubits = loss_qubits;
    }
    if let Some(threshold) = args.threshold {
        params.threshold = threshold;
    }
    if let Some(mean) = args.mean {
        params.mean = mean;
    }
    if let Some(std_dev) = args.std_dev {
        params.std_dev = std_dev;
    }
    if let Some(phase_bits) = args.phase_bits {
        params.phase_bits = phase_bits;
    }
    if let Some(repetitions) = args.repetitions {
        params.repetitions = repetitions;
    }
    if let Some(run_sanity_check) = args.run_sanity_check {
        params.run_sanity_check = run_sanity_check;
    }

    Ok(params)
}

fn apply_instance_file(params: &mut RunParams, path: &Path) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read instance file {}", path.display()))?;
    let instance: InstanceFile = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse instance file {}", path.display()))?;

    if let Some(num_qubits) = instance.loss_encoding.num_qubits {
        params.loss_qubits = num_qubits;
    }
    if let Some(threshold) = instance.risk_threshold {
        params.threshold = threshold;
    }
    if let Some(precision_qubits) = instance.amplitude_estimation.precision_qubits {
        params.phase_bits = precision_qubits;
    }
    if let Some(repetitions) = instance.amplitude_estimation.repetitions {
        params.repetitions = repetitions;
    }

    let kind = instance
        .distribution
        .kind
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();
    if matches!(kind.as_str(), "log_normal" | "" | "none") {
        if let Some(mean) = instance.distribution.parameters.mean {
            params.mean = mean;
        }
        if let Some(std_dev) = instance.distribution.parameters.std_dev {
            params.std_dev = std_dev;
        }
    } else {
        warn!(
            distribution = %kind,
            "instance distribution type is not supported by the experiment model; \
             keeping log-normal mean/std defaults unless explicitly overridden"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn empty_args() -> ParamArgs {
        ParamArgs {
            instance_file: None,
            loss_qubits: None,
            threshold: None,
            mean: None,
            std_dev: None,
            phase_bits: None,
            repetitions: None,
            run_sanity_check: None,
        }
    }

    #[test]
    fn defaults_apply_without_instance_file_or_overrides() {
        let params = resolve_params(&empty_args()).unwrap();
        assert_eq!(params, RunParams::default());
    }

    #[test]
    fn instance_file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "loss_encoding:\n  num_qubits: 5\nrisk_threshold: 3.0\n\
             amplitude_estimation:\n  precision_qubits: 8\n  repetitions: 200\n\
             distribution:\n  type: log_normal\n  parameters:\n    mean: 0.5\n    std_dev: 1.5"
        )
        .unwrap();

        let mut args = empty_args();
        args.instance_file = Some(file.path().to_path_buf());

        let params = resolve_params(&args).unwrap();
        assert_eq!(params.loss_qubits, 5);
        assert_eq!(params.threshold, 3.0);
        assert_eq!(params.phase_bits, 8);
        assert_eq!(params.repetitions, 200);
        assert_eq!(params.mean, 0.5);
        assert_eq!(params.std_dev, 1.5);
    }

    #[test]
    fn cli_overrides_beat_instance_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "risk_threshold: 3.0\namplitude_estimation:\n  repetitions: 200").unwrap();

        let mut args = empty_args();
        args.instance_file = Some(file.path().to_path_buf());
        args.threshold = Some(4.5);
        args.repetitions = Some(64);
        args.run_sanity_check = Some(true);

        let params = resolve_params(&args).unwrap();
        assert_eq!(params.threshold, 4.5);
        assert_eq!(params.repetitions, 64);
        assert!(params.run_sanity_check);
    }

    #[test]
    fn unsupported_distribution_type_keeps_default_moments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "distribution:\n  type: beta\n  parameters:\n    mean: 9.0\n    std_dev: 9.0"
        )
        .unwrap();

        let mut args = empty_args();
        args.instance_file = Some(file.path().to_path_buf());

        let params = resolve_params(&args).unwrap();
        assert_eq!(params.mean, 0.0);
        assert_eq!(params.std_dev, 1.0);
    }

    #[test]
    fn missing_instance_file_falls_back_to_defaults() {
        let mut args = empty_args();
        args.instance_file = Some("does-not-exist.yaml".into());

        let params = resolve_params(&args).unwrap();
        assert_eq!(params, RunParams::default());
    }
}
