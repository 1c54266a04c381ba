use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::circular::circular_estimate;
use crate::cli::EstimateArgs;
use crate::config::{RunParams, resolve_params};
use crate::history::SINGLE_RESULT_FILE;
use crate::model::ResultRecord;
use crate::parser::OutputParser;
use crate::record::build_result_record;
use crate::runner::run_experiment;
use crate::util::{ensure_directory, write_json_pretty};

pub fn run(args: EstimateArgs) -> Result<()> {
    let params = resolve_params(&args.params)?;
    let parser = OutputParser::new()?;
    ensure_directory(&args.estimates_dir)?;

    info!(
        loss_qubits = params.loss_qubits,
        threshold = params.threshold,
        phase_bits = params.phase_bits,
        repetitions = params.repetitions,
        "starting quantum estimation"
    );

    match execute_run(
        &parser,
        &params,
        &args.experiment_command,
        args.experiment_dir.as_deref(),
    )? {
        Some(record) => {
            let output_path = args.estimates_dir.join(SINGLE_RESULT_FILE);
            write_json_pretty(&output_path, &record)?;
            info!(
                path = %output_path.display(),
                estimate = record.metrics.quantum_estimate,
                "saved quantum estimation result"
            );
        }
        None => {
            warn!("quantum estimation produced no usable result; nothing recorded");
        }
    }

    Ok(())
}

/// One external invocation plus extraction. Returns `None` for a skipped
/// run: either the process failed or its output carried no amplitude
/// estimate. Both cases are logged, not raised.
pub fn execute_run(
    parser: &OutputParser,
    params: &RunParams,
    experiment_command: &[String],
    experiment_dir: Option<&Path>,
) -> Result<Option<ResultRecord>> {
    let raw_output = match run_experiment(experiment_command, experiment_dir) {
        Ok(stdout) => stdout,
        Err(error) => {
            warn!(error = %error, "experiment run failed; skipping");
            return Ok(None);
        }
    };

    let parsed = parser.parse(&raw_output, params);
    if parsed.metrics.quantum_estimate.is_none() {
        warn!("unable to parse an amplitude estimate from experiment output");
        return Ok(None);
    }

    let circular = parsed.histogram.as_ref().and_then(|histogram| {
        parsed
            .metrics
            .phase_bits
            .and_then(|phase_bits| circular_estimate(histogram, phase_bits))
    });

    Ok(Some(build_result_record(
        &parsed.metrics,
        circular,
        parsed.histogram.as_ref(),
        params,
        &parsed.normalized_text,
    )))
}
