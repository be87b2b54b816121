use std::process::Command;

use tracing::{error, info};

use crate::error::{RunError, RunResult};

/// Run `cmdline` through `sh -c`, inheriting stdin, stdout and stderr.
/// A non-zero exit is an error.
pub fn run(cmdline: &str) -> RunResult<()> {
    info!("Executing: {cmdline}");
    let status = Command::new("sh")
        .arg("-c")
        .arg(cmdline)
        .status()
        .map_err(|source| RunError::Spawn {
            command: cmdline.to_string(),
            source,
        })?;

    if status.success() {
        info!("OK: {cmdline}");
        Ok(())
    } else {
        error!("Failed: {cmdline}");
        Err(RunError::Failed {
            command: cmdline.to_string(),
            code: status.code(),
        })
    }
}
