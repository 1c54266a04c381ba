use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use tracing::debug;

use crate::config::RunParams;
use crate::model::{ExtractedMetrics, PhaseHistogram};

const NUMBER: &str = r"([0-9eE+\-\.,]+)";
const PLUS_MINUS: &str = r"(?:±|\+/-)";

/// Ordered fallback patterns for one logical field. Patterns are tried top
/// to bottom and the first match wins; later entries cover older console
/// formats still present in archived runs.
struct RuleSet {
    label: &'static str,
    patterns: Vec<Regex>,
}

impl RuleSet {
    fn new(label: &'static str, patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("failed to compile {label} pattern: {pattern}"))
            })
            .collect::<Result<Vec<Regex>>>()?;

        Ok(Self { label, patterns })
    }

    fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.patterns
            .iter()
            .find_map(|pattern| pattern.captures(text))
    }
}

/// Extracts an [`ExtractedMetrics`] and an optional [`PhaseHistogram`] from
/// raw experiment console output.
pub struct OutputParser {
    amplitude: RuleSet,
    analytic: RuleSet,
    classical: RuleSet,
    combined_config: RuleSet,
    precision: RuleSet,
    repetitions: RuleSet,
    threshold: RuleSet,
    loss_qubits: RuleSet,
    total_qubits: RuleSet,
    difference: RuleSet,
    histogram_line: Regex,
}

#[derive(Debug, Clone)]
pub struct ParsedOutput {
    pub metrics: ExtractedMetrics,
    pub histogram: Option<PhaseHistogram>,
    pub normalized_text: String,
}

impl OutputParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            amplitude: RuleSet::new(
                "amplitude",
                &[
                    format!("Quantum amplitude estimation.*: {NUMBER} {PLUS_MINUS} {NUMBER}"),
                    format!(r"Mean amplitude estimate:\s*{NUMBER}\s*{PLUS_MINUS}\s*{NUMBER}"),
                ],
            )?,
            analytic: RuleSet::new(
                "analytic probability",
                &[
                    format!(r"Analytical probability:\s*{NUMBER}"),
                    format!(r"Theoretical tail probability:\s*{NUMBER}"),
                ],
            )?,
            classical: RuleSet::new(
                "classical estimate",
                &[
                    format!("Classical Monte Carlo estimate: {NUMBER} {PLUS_MINUS} {NUMBER}"),
                    format!(
                        r"Monte Carlo \([0-9]+ samples\):\s*{NUMBER}\s*{PLUS_MINUS}\s*{NUMBER}"
                    ),
                ],
            )?,
            combined_config: RuleSet::new(
                "combined configuration",
                &[r"phase bits=([0-9]+), repeats=([0-9]+)".to_string()],
            )?,
            precision: RuleSet::new(
                "precision qubits",
                &[r"Precision qubits:\s*([0-9]+)".to_string()],
            )?,
            repetitions: RuleSet::new(
                "repetitions",
                &[r"Repetitions:\s*([0-9]+)".to_string()],
            )?,
            threshold: RuleSet::new(
                "loss threshold",
                &[format!(r"Loss threshold:\s*{NUMBER}")],
            )?,
            loss_qubits: RuleSet::new(
                "loss qubits",
                &[r"Loss distribution qubits:\s*([0-9]+)".to_string()],
            )?,
            total_qubits: RuleSet::new(
                "total qubits",
                &[r"Total qubits:\s*([0-9]+)".to_string()],
            )?,
            difference: RuleSet::new(
                "difference",
                &[format!(r"Difference between quantum and analytical:\s*{NUMBER}")],
            )?,
            histogram_line: Regex::new(r"(?m)^\s+Phase\s+(\d+)/(\d+).*:\s+(\d+)\s+times$")
                .context("failed to compile histogram pattern")?,
        })
    }

    /// Parses normalized console output. Fields the text omits are filled
    /// from `fallback` where the caller configured them; everything else
    /// stays `None`. A missing amplitude estimate is reported through
    /// `metrics.quantum_estimate` being `None`, never as an error.
    pub fn parse(&self, raw: &str, fallback: &RunParams) -> ParsedOutput {
        let text = normalize_output(raw);
        let mut metrics = ExtractedMetrics::default();

        if let Some(caps) = self.amplitude.captures(&text) {
            metrics.quantum_estimate = group_float(&caps, 1, self.amplitude.label);
            metrics.quantum_std_error = group_float(&caps, 2, self.amplitude.label);
        }
        if let Some(caps) = self.analytic.captures(&text) {
            metrics.analytic_probability = group_float(&caps, 1, self.analytic.label);
        }
        if let Some(caps) = self.classical.captures(&text) {
            metrics.classical_estimate = group_float(&caps, 1, self.classical.label);
            metrics.classical_std_error = group_float(&caps, 2, self.classical.label);
        }
        if let Some(caps) = self.difference.captures(&text) {
            metrics.difference = group_float(&caps, 1, self.difference.label);
        }
        if let Some(caps) = self.threshold.captures(&text) {
            metrics.threshold = group_float(&caps, 1, self.threshold.label);
        }
        if let Some(caps) = self.loss_qubits.captures(&text) {
            metrics.loss_qubits = group_int(&caps, 1);
        }
        if let Some(caps) = self.total_qubits.captures(&text) {
            metrics.total_qubits = group_int(&caps, 1);
        }

        if let Some(caps) = self.combined_config.captures(&text) {
            metrics.phase_bits = group_int(&caps, 1);
            metrics.repetitions = group_int(&caps, 2);
        }
        if metrics.phase_bits.is_none() {
            if let Some(caps) = self.precision.captures(&text) {
                metrics.phase_bits = group_int(&caps, 1);
            }
        }
        if metrics.repetitions.is_none() {
            if let Some(caps) = self.repetitions.captures(&text) {
                metrics.repetitions = group_int(&caps, 1);
            }
        }

        let histogram = self.collect_histogram(&text);

        if metrics.phase_bits.is_none() {
            if let Some(denominator) = histogram.as_ref().and_then(|h| h.denominator) {
                if denominator > 0 {
                    metrics.phase_bits = Some((denominator as f64).log2().round() as u32);
                }
            }
        }

        metrics.phase_bits.get_or_insert(fallback.phase_bits);
        metrics.repetitions.get_or_insert(fallback.repetitions);
        metrics.threshold.get_or_insert(fallback.threshold);
        metrics.loss_qubits.get_or_insert(fallback.loss_qubits);

        if metrics.total_qubits.is_none() {
            if let (Some(loss), Some(phase)) = (metrics.loss_qubits, metrics.phase_bits) {
                // Risk register + counting register + one marker qubit.
                metrics.total_qubits = Some(loss + phase + 1);
            }
        }

        if metrics.difference.is_none() {
            if let (Some(estimate), Some(analytic)) =
                (metrics.quantum_estimate, metrics.analytic_probability)
            {
                metrics.difference = Some(estimate - analytic);
            }
        }

        ParsedOutput {
            metrics,
            histogram,
            normalized_text: text,
        }
    }

    fn collect_histogram(&self, text: &str) -> Option<PhaseHistogram> {
        let mut counts = BTreeMap::new();
        let mut denominator = None;

        for caps in self.histogram_line.captures_iter(text) {
            let (Some(outcome), Some(denom), Some(count)) = (
                group_u64(&caps, 1),
                group_u64(&caps, 2),
                group_u64(&caps, 3),
            ) else {
                continue;
            };

            denominator = Some(denom);
            if outcome < denom {
                counts.insert(outcome, count);
            } else {
                debug!(outcome, denominator = denom, "dropping out-of-range histogram outcome");
            }
        }

        if counts.is_empty() {
            return None;
        }

        Some(PhaseHistogram {
            counts,
            denominator,
        })
    }
}

/// Rewrites known mis-encoded "±" byte sequences to the canonical glyph
/// before any pattern matching runs.
pub fn normalize_output(raw: &str) -> String {
    raw.replace("Ã‚Â±", "±")
        .replace("Â±", "±")
        .replace("Ã‚", "")
        .trim()
        .to_string()
}

/// Locale-tolerant float conversion: a comma without a dot is a decimal
/// comma, a comma alongside a dot is a thousands separator.
pub fn parse_locale_float(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let normalized = if trimmed.contains(',') && !trimmed.contains('.') {
        trimmed.replace(',', ".")
    } else if trimmed.contains(',') {
        trimmed.replace(',', "")
    } else {
        trimmed.to_string()
    };

    normalized.parse::<f64>().ok()
}

fn group_float(caps: &Captures<'_>, index: usize, label: &str) -> Option<f64> {
    let raw = caps.get(index)?.as_str();
    let parsed = parse_locale_float(raw);
    if parsed.is_none() {
        debug!(field = label, value = raw, "malformed numeral; leaving field unavailable");
    }
    parsed
}

fn group_int(caps: &Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index)?.as_str().parse::<u32>().ok()
}

fn group_u64(caps: &Captures<'_>, index: usize) -> Option<u64> {
    caps.get(index)?.as_str().parse::<u64>().ok()
}
