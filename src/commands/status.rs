use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::history::{ENSEMBLE_RESULT_FILE, HISTORY_FILE, SINGLE_RESULT_FILE};
use crate::model::{CalibrationHistory, EnsembleRecord, ResultRecord};
use crate::util::read_json;

pub fn run(args: StatusArgs) -> Result<()> {
    let single_path = args.estimates_dir.join(SINGLE_RESULT_FILE);
    let ensemble_path = args.estimates_dir.join(ENSEMBLE_RESULT_FILE);
    let history_path = args
        .history_file
        .unwrap_or_else(|| args.estimates_dir.join(HISTORY_FILE));

    info!(estimates_dir = %args.estimates_dir.display(), "status requested");

    if single_path.exists() {
        let record: ResultRecord = read_json(&single_path)?;
        info!(
            timestamp = %record.timestamp,
            target = %record.estimator_target,
            estimate = record.metrics.quantum_estimate,
            std_error = record.metrics.quantum_std_error,
            "single-run artifact"
        );
    } else {
        warn!(path = %single_path.display(), "single-run artifact missing");
    }

    if ensemble_path.exists() {
        let record: EnsembleRecord = read_json(&ensemble_path)?;
        info!(
            timestamp = %record.timestamp,
            completed_runs = record.metrics.ensemble_runs,
            requested_runs = record.metrics.runs_requested,
            mean_estimate = record.metrics.quantum_estimate,
            std_error = record.metrics.ensemble_std_error,
            "ensemble artifact"
        );
    } else {
        warn!(path = %ensemble_path.display(), "ensemble artifact missing");
    }

    if history_path.exists() {
        let history: CalibrationHistory = read_json(&history_path)?;
        info!(
            records = history.records.len(),
            last_updated = history.last_updated_utc.as_deref().unwrap_or("N/A"),
            "calibration history"
        );
    } else {
        warn!(path = %history_path.display(), "calibration history missing");
    }

    Ok(())
}
