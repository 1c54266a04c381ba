use anyhow::Result;
use tracing::info;

use crate::cli::CalibrateArgs;
use crate::history::{HISTORY_FILE, append_entry, build_entry, load_latest};

pub fn run(args: CalibrateArgs) -> Result<()> {
    let history_path = args
        .history_file
        .unwrap_or_else(|| args.estimates_dir.join(HISTORY_FILE));

    let latest = load_latest(&args.estimates_dir)?;
    info!(
        source = latest.source.as_str(),
        timestamp = latest.timestamp.as_deref().unwrap_or("N/A"),
        "selected latest calibration candidate"
    );

    let entry = build_entry(&latest);
    let total = append_entry(&history_path, entry)?;

    info!(
        path = %history_path.display(),
        total_records = total,
        "appended calibration record"
    );

    Ok(())
}
