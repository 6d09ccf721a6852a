//! Bounded execution of external commands.

use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use crate::error::{PipelineError, PipelineResult};

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// The child is killed if it outlives `timeout`. A non-zero exit is not an
/// error here; callers inspect `Output::status`.
pub async fn run_with_timeout(
    mut cmd: Command,
    label: &str,
    timeout: Duration,
) -> PipelineResult<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn().map_err(|source| PipelineError::Spawn {
        command: label.to_string(),
        source,
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => Ok(output?),
        Err(_) => Err(PipelineError::ToolTimeout {
            command: label.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Last non-empty stderr line, trimmed, for compact diagnostics.
pub fn stderr_summary(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string()
}
