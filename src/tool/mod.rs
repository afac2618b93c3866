//! Knowledge about the external separation tool
//!
//! How to call it, what it is expected to produce, and how to tell whether it
//! is installed.

pub mod args;
pub mod models;
pub mod probe;

pub use args::build_args;
pub use models::expected_stages;
pub use probe::{check_available, parse_version, tool_version};

use std::ffi::OsString;

/// Default executable name of the separation tool
pub const DEFAULT_TOOL: &str = "demucs";

/// Program plus any fixed leading arguments (e.g. `python3 -m demucs`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub prefix_args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Parse a whitespace-separated command line such as `"python3 -m demucs"`
    ///
    /// Returns `None` for an empty string.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            prefix_args: parts.collect(),
        })
    }

    /// Prefix args followed by `args`
    pub fn args_with(&self, args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
        self.prefix_args
            .iter()
            .map(OsString::from)
            .chain(args)
            .collect()
    }
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL)
    }
}
