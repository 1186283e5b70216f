//! Bounded invocation of external conversion tools.

use super::ExtractionError;
use std::ffi::OsStr;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Run `program` with `args`, capturing output, killing the child if `timeout` expires.
pub(crate) async fn run_tool<I, S>(
    program: &str,
    args: I,
    timeout: Duration,
) -> Result<Output, ExtractionError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ExtractionError::ToolMissing {
            tool: program.to_string(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(ExtractionError::Io)?,
        Err(_) => {
            tracing::warn!(tool = program, ?timeout, "External tool timed out");
            return Err(ExtractionError::Timeout {
                tool: program.to_string(),
                after: timeout,
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ExtractionError::ToolFailed {
            tool: program.to_string(),
            status: output.status.code(),
            stderr,
        });
    }

    Ok(output)
}

/// Probe whether `program` can be spawned at all.
pub async fn tool_available(program: &str, version_flag: &str) -> bool {
    let probe = Command::new(program)
        .arg(version_flag)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();
    match tokio::time::timeout(Duration::from_secs(30), probe).await {
        Ok(Ok(_)) => true,
        Ok(Err(error)) => {
            tracing::debug!(tool = program, error = %error, "Tool probe failed");
            false
        }
        Err(_) => {
            tracing::debug!(tool = program, "Tool probe timed out");
            false
        }
    }
}
