use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::aggregate::{aggregate, most_frequent_outcome};
use crate::cli::EnsembleArgs;
use crate::commands::estimate::execute_run;
use crate::config::resolve_params;
use crate::history::ENSEMBLE_RESULT_FILE;
use crate::parser::OutputParser;
use crate::util::{ensure_directory, write_json_pretty};

pub fn run(args: EnsembleArgs) -> Result<()> {
    if args.runs == 0 {
        bail!("ensemble run count must be positive");
    }

    let params = resolve_params(&args.params)?;
    let parser = OutputParser::new()?;
    ensure_directory(&args.estimates_dir)?;

    info!(runs = args.runs, "starting quantum estimation ensemble");

    let mut records = Vec::with_capacity(args.runs);
    for index in 0..args.runs {
        info!(run = index + 1, total = args.runs, "ensemble run");

        let Some(record) = execute_run(
            &parser,
            &params,
            &args.experiment_command,
            args.experiment_dir.as_deref(),
        )?
        else {
            // Fail-fast: a failed iteration aborts all subsequent ones.
            warn!(run = index + 1, "ensemble aborted after failed run");
            break;
        };

        let run_path = args
            .estimates_dir
            .join(format!("quantum_estimate_run{}.json", index + 1));
        write_json_pretty(&run_path, &record)?;
        info!(path = %run_path.display(), "saved ensemble run result");

        records.push(record);
    }

    let Some(ensemble) = aggregate(&records, args.runs) else {
        bail!("ensemble produced no usable runs");
    };

    if let Some((outcome, count)) = ensemble
        .histogram_counts
        .as_ref()
        .and_then(|counts| most_frequent_outcome(counts))
    {
        let denominator = ensemble
            .metrics
            .phase_bits
            .map(|phase_bits| 1u64 << phase_bits);
        info!(outcome, count, denominator, "most frequent merged outcome");
    }

    let summary_path = args.estimates_dir.join(ENSEMBLE_RESULT_FILE);
    write_json_pretty(&summary_path, &ensemble)?;
    info!(
        path = %summary_path.display(),
        completed = ensemble.metrics.ensemble_runs,
        requested = args.runs,
        mean_estimate = ensemble.metrics.quantum_estimate,
        "saved ensemble summary"
    );

    Ok(())
}
