//! stemctl - Structured driver for external stem-separation tools
//!
//! Runs a separator such as Demucs as a subprocess, turns its console output
//! into progress events, finds the files it wrote, and copies them into a
//! predictable `<track>_<stem>.<ext>` layout.
//!
//! # Architecture
//!
//! - `process`: child process runner with concurrent stdout/stderr draining
//! - `progress`: percent-to-stage progress interpretation (pluggable)
//! - `locate`: output directory discovery across tool versions
//! - `export`: final stem copies and JSON manifest
//! - `tool`: argument derivation, model tables, availability probes
//! - `pipeline`: end-to-end orchestration
//! - `config`: CLI arguments and runtime settings
//!
//! # Example
//!
//! ```no_run
//! use stemctl::{config::Settings, pipeline::Separator, SeparationRequest};
//!
//! let request = SeparationRequest::builder("song.wav").model("htdemucs").build();
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let result = Separator::new(Settings::default()).separate(&request, Some(&tx));
//! drop(tx);
//! for event in rx {
//!     println!("{}", event.message());
//! }
//! println!("success: {}, stems: {}", result.success, result.stems.len());
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod locate;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod tool;
pub mod types;

// Re-export key types at crate root
pub use error::{Result, SeparationError};
pub use types::{
    Device, LocatedStem, OutputFormat, ProgressEvent, SeparationRequest, SeparationResult,
    StemKind,
};
