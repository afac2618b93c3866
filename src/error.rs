//! Unified error types for stemctl
//!
//! Error strategy:
//! - Pre-spawn errors (validation, missing tool): fail before any work is done
//! - Tool errors (nonzero exit, timeout, no outputs): fail after cleanup
//! - Per-stem copy errors and cleanup errors: non-fatal, reported as warnings
//!
//! Fatal errors never escape the orchestrator; they are folded into a
//! failed [`SeparationResult`](crate::types::SeparationResult).

use crate::process::RunError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Supported input formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "MP3, WAV, FLAC, OGG, M4A, AAC";

/// Top-level error type for stemctl operations
#[derive(Debug, Error)]
pub enum SeparationError {
    // =========================================================================
    // Validation errors - raised before anything is spawned
    // =========================================================================
    #[error("Input file not found: '{0}'\n  Tip: Check the path exists and is accessible")]
    FileNotFound(PathBuf),

    #[error("Unsupported input format for '{path}': {format}\n  Supported formats: {SUPPORTED_FORMATS}")]
    UnsupportedFormat { path: PathBuf, format: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    // =========================================================================
    // Tool errors - the external separator could not do its job
    // =========================================================================
    #[error("Separation tool unavailable: {reason}\n\n  To enable stem separation:\n  1. Install Demucs:\n     pip install -U demucs\n  2. Check the command works:\n     demucs --help\n  3. If it is installed elsewhere, point stemctl at it:\n     stemctl --tool /path/to/demucs ...  (or set STEMCTL_TOOL)")]
    ToolUnavailable { reason: String },

    #[error("Separation tool exited with code {}:\n{stderr}", describe_exit(.exit_code))]
    ProcessFailure {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Separation tool timed out after {}s and was terminated", .0.as_secs())]
    Timeout(Duration),

    #[error("Separation was cancelled")]
    Cancelled,

    #[error("No output stems produced under '{0}'\n  Tip: The tool may have changed its output layout; rerun with -vv to see its output")]
    NoOutputFound(PathBuf),

    // =========================================================================
    // Output errors - fatal for the batch
    // =========================================================================
    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    OutputError { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for stemctl operations
pub type Result<T> = std::result::Result<T, SeparationError>;

impl SeparationError {
    /// Returns true if this error was raised before the tool was ever started
    pub fn is_pre_spawn(&self) -> bool {
        matches!(
            self,
            SeparationError::FileNotFound(_)
                | SeparationError::UnsupportedFormat { .. }
                | SeparationError::Validation(_)
                | SeparationError::ToolUnavailable { .. }
        )
    }

    /// Create a process failure, keeping only the tail of a long stderr capture
    pub fn process_failure(exit_code: Option<i32>, stderr: &str) -> Self {
        SeparationError::ProcessFailure {
            exit_code,
            stderr: stderr_tail(stderr, STDERR_TAIL_LINES),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!("Directory does not exist: {}", path.parent().map(|p| p.display().to_string()).unwrap_or_default())
            }
            _ => err.to_string(),
        };
        SeparationError::OutputError { path, reason }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "<signal>".to_string())
}

/// Number of stderr lines embedded in a process failure
const STDERR_TAIL_LINES: usize = 20;

/// Last `max_lines` non-empty lines of `text`, splitting on both `\n` and `\r`
fn stderr_tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text
        .split(['\n', '\r'])
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

impl From<RunError> for SeparationError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::NotFound { program } => SeparationError::ToolUnavailable {
                reason: format!("'{}' was not found on PATH", program),
            },
            RunError::Timeout { after, .. } => SeparationError::Timeout(after),
            RunError::Cancelled { .. } => SeparationError::Cancelled,
            RunError::Spawn { program, source } => SeparationError::ToolUnavailable {
                reason: format!("failed to start '{}': {}", program, source),
            },
            RunError::Wait { source, .. } => SeparationError::Io(source),
        }
    }
}
