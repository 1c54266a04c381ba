use std::f64::consts::PI;

use crate::model::PhaseHistogram;

/// Outcome magnitudes below this are treated as too dispersed for a
/// meaningful circular mean.
const MIN_RESULTANT_MAGNITUDE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularStats {
    pub amplitude: f64,
    pub phase: f64,
}

/// Computes a phase-wraparound-safe amplitude/phase estimate from a
/// measurement histogram over denominator `2^phase_bits`.
///
/// Outcomes `k` and `D−k` encode the same estimated probability through
/// `sin²`, and outcomes near `0` and `D−1` are physically adjacent, so each
/// outcome is folded to `min(k, D−k)` and averaged on the unit circle
/// instead of as a plain index mean.
pub fn circular_estimate(histogram: &PhaseHistogram, phase_bits: u32) -> Option<CircularStats> {
    // Denominator must fit in u64.
    if phase_bits >= 64 {
        return None;
    }
    let denominator = 1u64 << phase_bits;

    let total = histogram.total_count();
    if total == 0 {
        return None;
    }

    let mut real = 0.0_f64;
    let mut imag = 0.0_f64;
    for (&outcome, &count) in &histogram.counts {
        if outcome >= denominator {
            continue;
        }
        let folded = outcome.min(denominator - outcome);
        let angle = 2.0 * PI * folded as f64 / denominator as f64;
        real += count as f64 * angle.cos();
        imag += count as f64 * angle.sin();
    }

    let mean_real = real / total as f64;
    let mean_imag = imag / total as f64;
    if (mean_real * mean_real + mean_imag * mean_imag).sqrt() < MIN_RESULTANT_MAGNITUDE {
        return None;
    }

    let mut raw_phase = mean_imag.atan2(mean_real);
    if raw_phase < 0.0 {
        raw_phase += 2.0 * PI;
    }
    let normalized = raw_phase / (2.0 * PI);
    let folded_phase = normalized.min(1.0 - normalized);
    let theta = PI * folded_phase;

    Some(CircularStats {
        amplitude: theta.sin().powi(2),
        phase: folded_phase,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(entries: &[(u64, u64)]) -> PhaseHistogram {
        PhaseHistogram {
            counts: entries.iter().copied().collect(),
            denominator: None,
        }
    }

    #[test]
    fn zero_dominated_histogram_yields_small_amplitude() {
        // Outcome 0 sits at angle 0 with weight 98; outcome 32 folds to
        // itself and sits at angle π with weight 22. The resultant points
        // along the positive real axis, so the mean phase is 0 rather than
        // a naive index average of (0·98 + 32·22)/120.
        let stats = circular_estimate(&histogram(&[(0, 98), (32, 22)]), 6)
            .expect("resultant is well above the dispersion floor");

        assert!(stats.amplitude < 1e-9, "amplitude {}", stats.amplitude);
        // The π-angle term leaves a sub-epsilon imaginary residue, so the
        // folded phase is tiny but not an exact zero.
        assert!(stats.phase < 1e-12, "phase {}", stats.phase);
    }

    #[test]
    fn reflected_outcomes_fold_to_the_same_angle() {
        // 16 and 48 both fold to 16 out of 64, a quarter turn.
        let stats = circular_estimate(&histogram(&[(16, 50), (48, 50)]), 6)
            .expect("aligned outcomes have unit resultant");

        assert!((stats.phase - 0.25).abs() < 1e-12);
        assert!((stats.amplitude - 0.5).abs() < 1e-12);
    }

    #[test]
    fn wraparound_neighbors_average_near_zero_phase() {
        // 1 and 63 are adjacent across the wraparound boundary; 63 folds to
        // 1, so both land on the same small angle instead of averaging to
        // the middle of the index range.
        let stats = circular_estimate(&histogram(&[(1, 10), (63, 10)]), 6)
            .expect("folded outcomes coincide");

        assert!((stats.phase - 1.0 / 64.0).abs() < 1e-12);
    }

    #[test]
    fn empty_histogram_is_degenerate() {
        assert_eq!(circular_estimate(&histogram(&[]), 6), None);
    }

    #[test]
    fn zero_total_count_is_degenerate() {
        assert_eq!(circular_estimate(&histogram(&[(3, 0), (9, 0)]), 6), None);
    }

    #[test]
    fn balanced_opposite_angles_are_degenerate() {
        // Equal weight at angle 0 and angle π cancels to a negligible
        // resultant; no meaningful mean exists.
        assert_eq!(circular_estimate(&histogram(&[(0, 50), (32, 50)]), 6), None);
    }

    #[test]
    fn oversized_phase_bit_count_is_rejected() {
        assert_eq!(circular_estimate(&histogram(&[(0, 1)]), 64), None);
    }
}
