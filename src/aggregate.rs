use std::collections::BTreeMap;

use crate::model::{
    ALGORITHM_NAME, EnsembleMetrics, EnsembleRecord, EnsembleRunEntry, EnsembleRuns, ResultRecord,
};
use crate::util::now_utc_string;

/// Merges the records of repeated runs of one configuration into a single
/// [`EnsembleRecord`]. Per-field statistics only cover runs where the field
/// is present; absent values are skipped, never zero-filled. Returns `None`
/// when no runs completed.
pub fn aggregate(records: &[ResultRecord], runs_requested: usize) -> Option<EnsembleRecord> {
    let first = records.first()?;

    let amplitude_values = collect(records, |metrics| metrics.quantum_estimate);
    let std_error_values = collect(records, |metrics| metrics.quantum_std_error);
    let difference_values = collect(records, |metrics| metrics.difference);
    let circular_amp_values = collect(records, |metrics| metrics.circular_amplitude);
    let circular_phase_values = collect(records, |metrics| metrics.circular_phase);

    let amplitude_mean = mean(&amplitude_values);
    let amplitude_std = population_std_dev(&amplitude_values);
    let amplitude_std_error = amplitude_std
        .map(|std| std / (amplitude_values.len() as f64).sqrt());

    let merged_histogram = merge_histograms(records);

    let runs = records
        .iter()
        .enumerate()
        .map(|(index, record)| EnsembleRunEntry {
            index: index + 1,
            timestamp: record.timestamp.clone(),
            metrics: record.metrics.clone(),
            source_file: format!("quantum_estimate_run{}.json", index + 1),
        })
        .collect();

    Some(EnsembleRecord {
        timestamp: now_utc_string(),
        algorithm: ALGORITHM_NAME.to_string(),
        mode: "ensemble".to_string(),
        estimator_target: first.estimator_target.clone(),
        instance: first.instance.clone(),
        metrics: EnsembleMetrics {
            ensemble_runs: records.len(),
            runs_requested,
            quantum_estimate: amplitude_mean,
            ensemble_std_deviation: amplitude_std,
            ensemble_std_error: amplitude_std_error,
            mean_reported_std_error: mean(&std_error_values),
            mean_difference: mean(&difference_values),
            analytic_probability: None,
            circular_amplitude: mean(&circular_amp_values),
            circular_phase: mean(&circular_phase_values),
            phase_bits: first.metrics.phase_bits,
            repetitions: first.metrics.repetitions,
            logical_qubits: first.metrics.logical_qubits,
            physical_qubits: first.metrics.physical_qubits,
            t_count: first.metrics.t_count,
            runtime_days: first.metrics.runtime_days,
        },
        ensemble: EnsembleRuns { runs },
        histogram_counts: if merged_histogram.is_empty() {
            None
        } else {
            Some(merged_histogram)
        },
    })
}

/// Highest-count outcome of a merged histogram; a diagnostic only, never an
/// input to the statistical aggregates.
pub fn most_frequent_outcome(counts: &BTreeMap<u64, u64>) -> Option<(u64, u64)> {
    counts
        .iter()
        .max_by_key(|&(_, &count)| count)
        .map(|(&outcome, &count)| (outcome, count))
}

fn collect(
    records: &[ResultRecord],
    field: impl Fn(&crate::model::ResultMetrics) -> Option<f64>,
) -> Vec<f64> {
    records
        .iter()
        .filter_map(|record| field(&record.metrics))
        .collect()
}

fn merge_histograms(records: &[ResultRecord]) -> BTreeMap<u64, u64> {
    let mut merged = BTreeMap::new();
    for record in records {
        let Some(counts) = &record.histogram_counts else {
            continue;
        };
        for (&outcome, &count) in counts {
            *merged.entry(outcome).or_insert(0) += count;
        }
    }
    merged
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn population_std_dev(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values
        .iter()
        .map(|value| (value - mean) * (value - mean))
        .sum::<f64>()
        / values.len() as f64;
    Some(variance.sqrt())
}
