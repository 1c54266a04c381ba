use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::debug;

/// Runs the external experiment command once and returns its stdout. The
/// process has its own independent lifetime; only terminal output and exit
/// status are consumed here. A non-success exit status is an error the
/// caller treats as a failed run.
pub fn run_experiment(command_line: &[String], working_dir: Option<&Path>) -> Result<String> {
    let Some((program, args)) = command_line.split_first() else {
        bail!("experiment command is empty");
    };

    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    debug!(command = %command_line.join(" "), "invoking experiment");

    let output = command
        .output()
        .with_context(|| format!("failed to execute experiment command: {program}"))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        bail!(
            "experiment command returned non-success status {}: {}",
            output.status,
            stderr.trim()
        );
    }

    if !stderr.trim().is_empty() {
        debug!(stderr = %stderr.trim(), "experiment emitted diagnostics");
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
