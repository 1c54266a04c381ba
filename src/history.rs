use std::path::Path;

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::model::{
    CalibrationEntry, CalibrationHistory, CandidateSource, EnsembleRecord, ResultRecord,
};
use crate::util::{now_utc_string, read_json, write_json_pretty};

pub const SINGLE_RESULT_FILE: &str = "quantum_estimate.json";
pub const ENSEMBLE_RESULT_FILE: &str = "quantum_estimate_ensemble.json";
pub const HISTORY_FILE: &str = "quantum_calibration_history.json";

/// Both artifact shapes normalized into one comparable record before any
/// selection logic runs.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCandidate {
    pub source: CandidateSource,
    pub timestamp: Option<String>,
    pub phase_bits: Option<u32>,
    pub repetitions: Option<u32>,
    pub runs: u32,
    pub quantum_estimate: Option<f64>,
    pub std_error: Option<f64>,
    pub theoretical: Option<f64>,
    pub mean_difference: Option<f64>,
}

pub fn candidate_from_single(record: &ResultRecord) -> CalibrationCandidate {
    let parameters = &record.instance.parameters;
    let metrics = &record.metrics;
    let theoretical = metrics.analytic_probability;
    let estimate = metrics.quantum_estimate;
    let mean_difference = match (estimate, theoretical) {
        (Some(estimate), Some(theoretical)) => Some(estimate - theoretical),
        _ => None,
    };

    CalibrationCandidate {
        source: CandidateSource::Single,
        timestamp: Some(record.timestamp.clone()),
        phase_bits: parameters.phase_bits.or(metrics.phase_bits),
        repetitions: parameters.repetitions.or(metrics.repetitions),
        runs: 1,
        quantum_estimate: estimate,
        std_error: metrics.quantum_std_error,
        theoretical,
        mean_difference,
    }
}

pub fn candidate_from_ensemble(record: &EnsembleRecord) -> CalibrationCandidate {
    let parameters = &record.instance.parameters;
    let metrics = &record.metrics;

    let runs = if metrics.ensemble_runs > 0 {
        metrics.ensemble_runs
    } else {
        metrics.runs_requested
    } as u32;

    // Ensemble summaries usually carry no theoretical value of their own;
    // the first nested run's report stands in for it.
    let theoretical = metrics.analytic_probability.or_else(|| {
        record
            .ensemble
            .runs
            .first()
            .and_then(|run| run.metrics.analytic_probability)
    });

    CalibrationCandidate {
        source: CandidateSource::Ensemble,
        timestamp: Some(record.timestamp.clone()),
        phase_bits: parameters.phase_bits.or(metrics.phase_bits),
        repetitions: parameters.repetitions.or(metrics.repetitions),
        runs,
        quantum_estimate: metrics.quantum_estimate,
        std_error: metrics.ensemble_std_error.or(metrics.mean_reported_std_error),
        theoretical,
        mean_difference: metrics.mean_difference,
    }
}

/// Builds candidates from whichever artifacts exist under `estimates_dir`
/// and selects the one with the later timestamp. Fails when neither a
/// single nor an ensemble artifact is present.
pub fn load_latest(estimates_dir: &Path) -> Result<CalibrationCandidate> {
    let mut candidates = Vec::new();

    let ensemble_path = estimates_dir.join(ENSEMBLE_RESULT_FILE);
    if ensemble_path.exists() {
        let record: EnsembleRecord = read_json(&ensemble_path)?;
        candidates.push(candidate_from_ensemble(&record));
    }

    let single_path = estimates_dir.join(SINGLE_RESULT_FILE);
    if single_path.exists() {
        let record: ResultRecord = read_json(&single_path)?;
        candidates.push(candidate_from_single(&record));
    }

    let Some(latest) = candidates
        .into_iter()
        .max_by_key(|candidate| parse_timestamp(candidate.timestamp.as_deref()))
    else {
        bail!(
            "no quantum estimate artifact available (expected {SINGLE_RESULT_FILE} or \
             {ENSEMBLE_RESULT_FILE} in {})",
            estimates_dir.display()
        );
    };

    Ok(latest)
}

/// ISO-8601 with an optional trailing `Z`. Unparsable or missing values map
/// to the minimum datetime so they always lose to any parseable candidate.
fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = value else {
        return DateTime::<Utc>::MIN_UTC;
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return parsed.and_utc();
    }

    DateTime::<Utc>::MIN_UTC
}

/// Stamps a candidate into a permanent history entry.
pub fn build_entry(candidate: &CalibrationCandidate) -> CalibrationEntry {
    let relative_error_percent = match (candidate.quantum_estimate, candidate.theoretical) {
        (Some(estimate), Some(theoretical)) if theoretical != 0.0 => {
            Some((estimate - theoretical).abs() / theoretical.abs() * 100.0)
        }
        _ => None,
    };

    CalibrationEntry {
        recorded_utc: now_utc_string(),
        source: candidate.source,
        timestamp: candidate.timestamp.clone(),
        phase_bits: candidate.phase_bits,
        repetitions: candidate.repetitions,
        runs: candidate.runs,
        quantum_estimate: candidate.quantum_estimate,
        std_error: candidate.std_error,
        theoretical: candidate.theoretical,
        mean_difference: candidate.mean_difference,
        relative_error_percent,
    }
}

/// Appends one entry to the history document, creating it on first use.
/// Deliberately non-deduplicating; every successful invocation adds exactly
/// one permanent entry. Returns the new total record count.
pub fn append_entry(history_path: &Path, entry: CalibrationEntry) -> Result<usize> {
    let mut history: CalibrationHistory = if history_path.exists() {
        read_json(history_path)?
    } else {
        CalibrationHistory::default()
    };

    history.records.push(entry);
    history.last_updated_utc = Some(now_utc_string());

    write_json_pretty(history_path, &history)?;
    Ok(history.records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ALGORITHM_NAME, EnsembleMetrics, EnsembleRunEntry, EnsembleRuns, Instance,
        InstanceParameters, ResultMetrics,
    };
    use crate::util::write_json_pretty;

    fn parameters() -> InstanceParameters {
        InstanceParameters {
            shots: Some(120),
            phase_bits: Some(6),
            repetitions: Some(120),
            threshold: Some(2.5),
            loss_qubits: Some(4),
            mean: 0.0,
            std_dev: 1.0,
            run_sanity_check: false,
        }
    }

    fn result_metrics(estimate: f64) -> ResultMetrics {
        ResultMetrics {
            logical_qubits: Some(11),
            physical_qubits: Some(11),
            t_count: Some(2880),
            runtime_days: 0,
            phase_bits: Some(6),
            repetitions: Some(120),
            quantum_estimate: Some(estimate),
            quantum_std_error: Some(0.031),
            analytic_probability: Some(0.19),
            classical_estimate: None,
            classical_std_error: None,
            difference: None,
            circular_phase: None,
            circular_amplitude: None,
        }
    }

    fn single_record(timestamp: &str, estimate: f64) -> ResultRecord {
        ResultRecord {
            timestamp: timestamp.to_string(),
            algorithm: ALGORITHM_NAME.to_string(),
            estimator_target: "TailRisk > 2.5".to_string(),
            instance: Instance {
                parameters: parameters(),
            },
            metrics: result_metrics(estimate),
            raw_output: String::new(),
            histogram_counts: None,
        }
    }

    fn ensemble_record(timestamp: &str) -> EnsembleRecord {
        EnsembleRecord {
            timestamp: timestamp.to_string(),
            algorithm: ALGORITHM_NAME.to_string(),
            mode: "ensemble".to_string(),
            estimator_target: "TailRisk > 2.5".to_string(),
            instance: Instance {
                parameters: parameters(),
            },
            metrics: EnsembleMetrics {
                ensemble_runs: 3,
                runs_requested: 3,
                quantum_estimate: Some(0.2),
                ensemble_std_deviation: Some(0.05),
                ensemble_std_error: Some(0.03),
                mean_reported_std_error: Some(0.02),
                mean_difference: Some(0.01),
                analytic_probability: None,
                circular_amplitude: None,
                circular_phase: None,
                phase_bits: Some(6),
                repetitions: Some(120),
                logical_qubits: Some(11),
                physical_qubits: Some(11),
                t_count: Some(2880),
                runtime_days: 0,
            },
            ensemble: EnsembleRuns {
                runs: vec![EnsembleRunEntry {
                    index: 1,
                    timestamp: timestamp.to_string(),
                    metrics: result_metrics(0.21),
                    source_file: "quantum_estimate_run1.json".to_string(),
                }],
            },
            histogram_counts: None,
        }
    }

    #[test]
    fn newer_single_artifact_wins_over_older_ensemble() {
        let dir = tempfile::tempdir().unwrap();
        write_json_pretty(
            &dir.path().join(ENSEMBLE_RESULT_FILE),
            &ensemble_record("2026-02-22T10:00:00Z"),
        )
        .unwrap();
        write_json_pretty(
            &dir.path().join(SINGLE_RESULT_FILE),
            &single_record("2026-02-22T10:05:00Z", 0.21),
        )
        .unwrap();

        let latest = load_latest(dir.path()).unwrap();

        assert_eq!(latest.source, CandidateSource::Single);
        assert_eq!(latest.timestamp.as_deref(), Some("2026-02-22T10:05:00Z"));
        assert_eq!(latest.quantum_estimate, Some(0.21));
        let mean_difference = latest.mean_difference.unwrap();
        assert!((mean_difference - 0.02).abs() < 1e-12);
    }

    #[test]
    fn newer_ensemble_artifact_wins_over_older_single() {
        let dir = tempfile::tempdir().unwrap();
        write_json_pretty(
            &dir.path().join(ENSEMBLE_RESULT_FILE),
            &ensemble_record("2026-02-22T11:00:00Z"),
        )
        .unwrap();
        write_json_pretty(
            &dir.path().join(SINGLE_RESULT_FILE),
            &single_record("2026-02-22T10:05:00Z", 0.21),
        )
        .unwrap();

        let latest = load_latest(dir.path()).unwrap();
        assert_eq!(latest.source, CandidateSource::Ensemble);
        assert_eq!(latest.runs, 3);
        assert_eq!(latest.std_error, Some(0.03));
    }

    #[test]
    fn unparsable_timestamp_always_loses() {
        let dir = tempfile::tempdir().unwrap();
        write_json_pretty(
            &dir.path().join(ENSEMBLE_RESULT_FILE),
            &ensemble_record("not-a-timestamp"),
        )
        .unwrap();
        write_json_pretty(
            &dir.path().join(SINGLE_RESULT_FILE),
            &single_record("2020-01-01T00:00:00Z", 0.1),
        )
        .unwrap();

        let latest = load_latest(dir.path()).unwrap();
        assert_eq!(latest.source, CandidateSource::Single);
    }

    #[test]
    fn missing_artifacts_are_a_hard_failure() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_latest(dir.path()).is_err());
    }

    #[test]
    fn ensemble_theoretical_falls_back_to_first_nested_run() {
        let candidate = candidate_from_ensemble(&ensemble_record("2026-02-22T10:00:00Z"));
        assert_eq!(candidate.theoretical, Some(0.19));
    }

    #[test]
    fn relative_error_requires_nonzero_theoretical() {
        let mut candidate = candidate_from_single(&single_record("2026-02-22T10:00:00Z", 0.21));
        let entry = build_entry(&candidate);
        let relative = entry.relative_error_percent.unwrap();
        assert!((relative - (0.02_f64 / 0.19 * 100.0)).abs() < 1e-9);

        candidate.theoretical = Some(0.0);
        assert_eq!(build_entry(&candidate).relative_error_percent, None);

        candidate.theoretical = None;
        assert_eq!(build_entry(&candidate).relative_error_percent, None);
    }

    #[test]
    fn append_creates_history_and_grows_monotonically() {
        let dir = tempfile::tempdir().unwrap();
        let history_path = dir.path().join(HISTORY_FILE);

        let first = build_entry(&candidate_from_single(&single_record(
            "2026-02-22T10:00:00Z",
            0.2,
        )));
        let second = build_entry(&candidate_from_single(&single_record(
            "2026-02-22T10:01:00Z",
            0.21,
        )));

        assert_eq!(append_entry(&history_path, first).unwrap(), 1);
        assert_eq!(append_entry(&history_path, second).unwrap(), 2);

        let history: CalibrationHistory = read_json(&history_path).unwrap();
        assert_eq!(history.records.len(), 2);
        assert_eq!(history.records[0].quantum_estimate, Some(0.2));
        assert_eq!(history.records[1].quantum_estimate, Some(0.21));
        assert!(history.last_updated_utc.is_some());
    }

    #[test]
    fn timestamps_without_offset_still_parse() {
        let parsed = parse_timestamp(Some("2026-02-22T10:00:00.5"));
        assert!(parsed > DateTime::<Utc>::MIN_UTC);
    }
}
