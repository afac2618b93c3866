//! Runtime configuration settings

use crate::tool::{ToolCommand, DEFAULT_TOOL};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable overriding the separator command
pub const TOOL_ENV: &str = "STEMCTL_TOOL";

/// Environment variable overriding where temporary work directories go
pub const TEMP_DIR_ENV: &str = "STEMCTL_TEMP_DIR";

/// Default deadline for the `--help` availability probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime settings for the separation pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    /// Separator command
    pub tool: ToolCommand,
    /// pip command used for the version probe
    pub pip: ToolCommand,
    /// Package name the version probe asks pip about
    pub package: String,
    /// Deadline for the availability probe
    pub probe_timeout: Duration,
    /// Deadline for the separation itself (none by default)
    pub separation_timeout: Option<Duration>,
    /// Parent directory of per-request work directories
    pub temp_root: PathBuf,
    /// Show a progress bar
    pub show_progress: bool,
    /// Write a JSON manifest next to the stems
    pub write_manifest: bool,
}

impl Settings {
    /// Create settings from CLI arguments and the environment
    pub fn from_cli(cli: &super::cli::Cli) -> Self {
        let defaults = Self::default();

        let tool = cli
            .tool
            .clone()
            .or_else(|| std::env::var(TOOL_ENV).ok())
            .and_then(|command| ToolCommand::parse(&command))
            .unwrap_or(defaults.tool);

        let temp_root = std::env::var_os(TEMP_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.temp_root);

        Self {
            tool,
            temp_root,
            separation_timeout: cli.timeout.map(Duration::from_secs),
            show_progress: !cli.quiet,
            write_manifest: cli.json,
            ..defaults
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tool: ToolCommand::new(DEFAULT_TOOL),
            pip: ToolCommand::new("pip"),
            package: DEFAULT_TOOL.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            separation_timeout: None,
            temp_root: std::env::temp_dir(),
            show_progress: true,
            write_manifest: false,
        }
    }
}
