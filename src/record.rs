use crate::circular::CircularStats;
use crate::config::RunParams;
use crate::model::{
    ALGORITHM_NAME, ExtractedMetrics, Instance, InstanceParameters, PhaseHistogram, ResultMetrics,
    ResultRecord,
};
use crate::util::now_utc_string;

/// Combines parser output, circular-histogram analysis and run metadata
/// into one standardized [`ResultRecord`].
pub fn build_result_record(
    metrics: &ExtractedMetrics,
    circular: Option<CircularStats>,
    histogram: Option<&PhaseHistogram>,
    params: &RunParams,
    raw_output: &str,
) -> ResultRecord {
    let estimator_target = match metrics.threshold {
        Some(threshold) => format!("TailRisk > {threshold}"),
        None => "TailRisk".to_string(),
    };

    // Comparative resource proxy, deliberately approximate: four gates per
    // controlled rotation across phase_bits × repetitions applications.
    let t_count = match (metrics.phase_bits, metrics.repetitions) {
        (Some(phase_bits), Some(repetitions)) => {
            Some((u64::from(phase_bits) * u64::from(repetitions) * 4).max(1))
        }
        _ => None,
    };

    let logical_qubits = metrics.total_qubits;
    let physical_qubits = logical_qubits;

    ResultRecord {
        timestamp: now_utc_string(),
        algorithm: ALGORITHM_NAME.to_string(),
        estimator_target,
        instance: Instance {
            parameters: InstanceParameters {
                shots: metrics.repetitions,
                phase_bits: metrics.phase_bits,
                repetitions: metrics.repetitions,
                threshold: metrics.threshold,
                loss_qubits: metrics.loss_qubits,
                mean: params.mean,
                std_dev: params.std_dev,
                run_sanity_check: params.run_sanity_check,
            },
        },
        metrics: ResultMetrics {
            logical_qubits,
            physical_qubits,
            t_count,
            runtime_days: 0,
            phase_bits: metrics.phase_bits,
            repetitions: metrics.repetitions,
            quantum_estimate: metrics.quantum_estimate,
            quantum_std_error: metrics.quantum_std_error,
            analytic_probability: metrics.analytic_probability,
            classical_estimate: metrics.classical_estimate,
            classical_std_error: metrics.classical_std_error,
            difference: metrics.difference,
            circular_phase: circular.map(|stats| stats.phase),
            circular_amplitude: circular.map(|stats| stats.amplitude),
        },
        raw_output: raw_output.to_string(),
        histogram_counts: histogram
            .filter(|histogram| !histogram.is_empty())
            .map(|histogram| histogram.counts.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> ExtractedMetrics {
        ExtractedMetrics {
            quantum_estimate: Some(0.18333333333333332),
            quantum_std_error: Some(0.035322587464470735),
            analytic_probability: Some(0.18977381200856933),
            classical_estimate: None,
            classical_std_error: None,
            difference: Some(-0.006440478675236013),
            phase_bits: Some(6),
            repetitions: Some(120),
            threshold: Some(2.5),
            loss_qubits: Some(4),
            total_qubits: Some(11),
        }
    }

    #[test]
    fn builds_target_description_from_threshold() {
        let record =
            build_result_record(&metrics(), None, None, &RunParams::default(), "raw");
        assert_eq!(record.estimator_target, "TailRisk > 2.5");
        assert_eq!(record.algorithm, ALGORITHM_NAME);
    }

    #[test]
    fn missing_threshold_falls_back_to_bare_target() {
        let mut input = metrics();
        input.threshold = None;

        let record = build_result_record(&input, None, None, &RunParams::default(), "raw");
        assert_eq!(record.estimator_target, "TailRisk");
    }

    #[test]
    fn resource_proxy_is_phase_bits_times_repetitions_times_four() {
        let record =
            build_result_record(&metrics(), None, None, &RunParams::default(), "raw");
        assert_eq!(record.metrics.t_count, Some(2880));
        assert_eq!(record.metrics.logical_qubits, Some(11));
        assert_eq!(record.metrics.physical_qubits, Some(11));
        assert_eq!(record.metrics.runtime_days, 0);
    }

    #[test]
    fn resource_proxy_never_drops_below_one() {
        let mut input = metrics();
        input.phase_bits = Some(0);
        input.repetitions = Some(0);

        let record = build_result_record(&input, None, None, &RunParams::default(), "raw");
        assert_eq!(record.metrics.t_count, Some(1));
    }

    #[test]
    fn underivable_fields_stay_unavailable() {
        let mut input = metrics();
        input.phase_bits = None;
        input.total_qubits = None;

        let record = build_result_record(&input, None, None, &RunParams::default(), "raw");
        assert_eq!(record.metrics.t_count, None);
        assert_eq!(record.metrics.logical_qubits, None);
        assert_eq!(record.metrics.circular_amplitude, None);
    }

    #[test]
    fn circular_stats_and_histogram_flow_into_the_record() {
        let histogram = PhaseHistogram {
            counts: [(0, 98), (32, 22)].into_iter().collect(),
            denominator: Some(64),
        };
        let stats = CircularStats {
            amplitude: 0.25,
            phase: 0.125,
        };

        let record = build_result_record(
            &metrics(),
            Some(stats),
            Some(&histogram),
            &RunParams::default(),
            "raw",
        );

        assert_eq!(record.metrics.circular_amplitude, Some(0.25));
        assert_eq!(record.metrics.circular_phase, Some(0.125));
        assert_eq!(record.histogram_counts, Some(histogram.counts));
        assert_eq!(record.instance.parameters.shots, Some(120));
    }
}
