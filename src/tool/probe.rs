//! Availability and version probes

use super::ToolCommand;
use crate::error::{Result, SeparationError};
use crate::process::{run_captured, RunError};
use std::ffi::OsString;
use std::time::Duration;
use tracing::{debug, info};

/// Check that the tool answers `--help` with exit code 0 within `timeout`
///
/// Any failure is reported as [`SeparationError::ToolUnavailable`], which
/// carries installation guidance.
pub fn check_available(tool: &ToolCommand, timeout: Duration) -> Result<()> {
    let args = tool.args_with([OsString::from("--help")]);

    match run_captured(&tool.program, &args, timeout) {
        Ok(invocation) if invocation.success() => {
            debug!("{} is available", tool.program);
            Ok(())
        }
        Ok(invocation) => Err(SeparationError::ToolUnavailable {
            reason: format!(
                "'{} {}' exited with code {}",
                invocation.program,
                invocation.args,
                invocation
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "<signal>".to_string())
            ),
        }),
        Err(RunError::Timeout { after, .. }) => Err(SeparationError::ToolUnavailable {
            reason: format!(
                "'{}' did not respond to --help within {}s",
                tool.program,
                after.as_secs()
            ),
        }),
        Err(e) => Err(SeparationError::ToolUnavailable {
            reason: e.to_string(),
        }),
    }
}

/// Installed version of `package` according to `<pip> show <package>`
///
/// `None` if pip is missing, the package is not installed, or the output has
/// no `Version:` line.
pub fn tool_version(pip: &ToolCommand, package: &str, timeout: Duration) -> Option<String> {
    let args = pip.args_with([OsString::from("show"), OsString::from(package)]);

    match run_captured(&pip.program, &args, timeout) {
        Ok(invocation) if invocation.success() => {
            let version = parse_version(&invocation.stdout);
            if let Some(v) = &version {
                info!("{} version {}", package, v);
            }
            version
        }
        Ok(invocation) => {
            debug!(
                "'{} {}' exited with {:?}",
                invocation.program, invocation.args, invocation.exit_code
            );
            None
        }
        Err(e) => {
            debug!("Version probe failed: {}", e);
            None
        }
    }
}

/// Extract the value following a `Version:` line prefix
pub fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Version:"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
