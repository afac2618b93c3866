//! CLI argument parsing

use crate::types::{Device, OutputFormat, SeparationRequest, DEFAULT_MODEL};
use clap::Parser;
use std::path::PathBuf;

/// stemctl - Split a track into stems with an external separator
///
/// Runs Demucs (or a compatible tool), follows its progress, and writes the
/// stems next to the input as <track>_<stem>.<ext>.
#[derive(Parser, Debug)]
#[command(name = "stemctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Input audio file (mp3, wav, flac, ogg, m4a, aac)
    #[arg(short, long, value_name = "FILE", required_unless_present = "version_check")]
    pub input: Option<PathBuf>,

    /// Directory for the stems (defaults to the input file's directory)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Separation model (htdemucs, htdemucs_ft, htdemucs_6s, mdx_extra, ...)
    #[arg(short = 'n', long, value_name = "MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Write MP3 stems instead of WAV
    #[arg(long, default_value = "false")]
    pub mp3: bool,

    /// Force CPU-only separation
    #[arg(long, default_value = "false")]
    pub cpu: bool,

    /// Number of random shifts (slower, slightly better quality)
    #[arg(long, value_name = "N", default_value = "0")]
    pub shifts: u32,

    /// Parallel jobs inside the separator (uses more memory)
    #[arg(short = 'j', long, value_name = "N", default_value = "1")]
    pub jobs: u32,

    /// Separator command, e.g. "demucs" or "python3 -m demucs" [env: STEMCTL_TOOL]
    #[arg(long, value_name = "COMMAND")]
    pub tool: Option<String>,

    /// Give up and kill the separator after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Write a JSON manifest (<track>_stems.json) next to the stems
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Print the installed separator version and exit
    #[arg(long, default_value = "false")]
    pub version_check: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress progress bar)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Cli {
    /// Build the separation request described by the arguments
    ///
    /// `None` when no input was given (only valid with `--version-check`).
    pub fn to_request(&self) -> Option<SeparationRequest> {
        let input = self.input.clone()?;
        let mut builder = SeparationRequest::builder(input)
            .model(self.model.clone())
            .format(if self.mp3 {
                OutputFormat::Mp3
            } else {
                OutputFormat::Wav
            })
            .device(if self.cpu { Device::Cpu } else { Device::Auto })
            .shifts(self.shifts)
            .jobs(self.jobs);
        if let Some(dir) = &self.output {
            builder = builder.output_dir(dir.clone());
        }
        Some(builder.build())
    }

    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
