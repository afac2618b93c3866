//! Core data types for stemctl
//!
//! These types represent the domain model and flow through the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Stems
// =============================================================================

/// Semantic identity of a separated stem
///
/// `AcousticGuitar` and `Strings` are reserved: no model the locator knows about
/// produces them today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StemKind {
    Drums,
    Bass,
    ElectricGuitar,
    AcousticGuitar,
    Piano,
    Strings,
    Vocals,
    Other,
}

impl StemKind {
    /// Canonical lowercase stage name used in output file names
    pub fn stage_name(self) -> &'static str {
        match self {
            StemKind::Drums => "drums",
            StemKind::Bass => "bass",
            StemKind::ElectricGuitar => "guitar",
            StemKind::AcousticGuitar => "acoustic_guitar",
            StemKind::Piano => "piano",
            StemKind::Strings => "strings",
            StemKind::Vocals => "vocals",
            StemKind::Other => "other",
        }
    }
}

impl fmt::Display for StemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stage_name())
    }
}

/// A stem file found in the tool's working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedStem {
    /// Canonical stage name ("drums", "vocals", ...)
    pub stage: &'static str,
    pub kind: StemKind,
    /// Absolute path of the file the tool wrote
    pub source: PathBuf,
}

// =============================================================================
// Request
// =============================================================================

/// Audio container the tool should write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
}

impl OutputFormat {
    /// File extension without the leading dot
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
        }
    }
}

/// Hardware the tool may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Device {
    /// Let the tool pick (GPU when present)
    #[default]
    Auto,
    /// Force CPU-only inference
    Cpu,
}

/// Default model when none is given
pub const DEFAULT_MODEL: &str = "htdemucs";

/// One separation job
///
/// Immutable once built; construct with [`SeparationRequest::builder`].
#[derive(Debug, Clone)]
pub struct SeparationRequest {
    input: PathBuf,
    output_dir: Option<PathBuf>,
    model: String,
    format: OutputFormat,
    device: Device,
    shifts: u32,
    jobs: u32,
}

impl SeparationRequest {
    pub fn builder(input: impl Into<PathBuf>) -> SeparationRequestBuilder {
        SeparationRequestBuilder {
            request: SeparationRequest {
                input: input.into(),
                output_dir: None,
                model: DEFAULT_MODEL.to_string(),
                format: OutputFormat::default(),
                device: Device::default(),
                shifts: 0,
                jobs: 1,
            },
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn shifts(&self) -> u32 {
        self.shifts
    }

    pub fn jobs(&self) -> u32 {
        self.jobs
    }

    /// Input file name without extension, used to name the outputs
    pub fn track_name(&self) -> String {
        self.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_string())
    }

    /// Directory the final stems are written to
    ///
    /// Falls back to the input file's own directory.
    pub fn final_dir(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        match self.input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Builder for [`SeparationRequest`]
#[derive(Debug, Clone)]
pub struct SeparationRequestBuilder {
    request: SeparationRequest,
}

impl SeparationRequestBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.request.output_dir = Some(dir.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.request.model = model.into();
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.request.format = format;
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.request.device = device;
        self
    }

    /// Number of random shifts (more is slower but cleaner)
    pub fn shifts(mut self, shifts: u32) -> Self {
        self.request.shifts = shifts;
        self
    }

    pub fn jobs(mut self, jobs: u32) -> Self {
        self.request.jobs = jobs;
        self
    }

    pub fn build(self) -> SeparationRequest {
        self.request
    }
}

// =============================================================================
// Progress
// =============================================================================

/// Position of a stage within a separation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRef {
    pub name: String,
    /// 1-based
    pub index: usize,
    pub total: usize,
}

/// Structured progress derived from the tool's console output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Phase announcement passed through verbatim
    Info { message: String },
    /// Raw overall percent reported by the tool
    OverallProgress { percent: u8, message: String },
    /// Estimated progress within the current stage
    StageProgress {
        stage: StageRef,
        percent: u8,
        overall_percent: u8,
        message: String,
    },
    /// The stage is considered done
    StageComplete { stage: StageRef, message: String },
}

impl ProgressEvent {
    pub fn message(&self) -> &str {
        match self {
            ProgressEvent::Info { message }
            | ProgressEvent::OverallProgress { message, .. }
            | ProgressEvent::StageProgress { message, .. }
            | ProgressEvent::StageComplete { message, .. } => message,
        }
    }

    pub fn overall_percent(&self) -> Option<u8> {
        match self {
            ProgressEvent::OverallProgress { percent, .. } => Some(*percent),
            ProgressEvent::StageProgress {
                overall_percent, ..
            } => Some(*overall_percent),
            _ => None,
        }
    }

    pub fn stage(&self) -> Option<&StageRef> {
        match self {
            ProgressEvent::StageProgress { stage, .. }
            | ProgressEvent::StageComplete { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Percent within the current stage
    pub fn stage_percent(&self) -> Option<u8> {
        match self {
            ProgressEvent::StageProgress { percent, .. } => Some(*percent),
            ProgressEvent::StageComplete { .. } => Some(100),
            _ => None,
        }
    }
}

// =============================================================================
// Result
// =============================================================================

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    Validating,
    ProbingTool,
    Invoking,
    Locating,
    PostProcessing,
    CleaningUp,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Validating => "validating",
            PipelineStage::ProbingTool => "probing tool",
            PipelineStage::Invoking => "invoking",
            PipelineStage::Locating => "locating",
            PipelineStage::PostProcessing => "post-processing",
            PipelineStage::CleaningUp => "cleaning up",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Final outcome of one separation request
#[derive(Debug, Clone)]
pub struct SeparationResult {
    pub success: bool,
    /// Human-readable failure description
    pub error: Option<String>,
    /// Stage the pipeline stopped in, when it failed
    pub failed_stage: Option<PipelineStage>,
    pub output_dir: PathBuf,
    /// Only stems that were copied successfully
    pub stems: BTreeMap<StemKind, PathBuf>,
    pub elapsed: Duration,
    /// Non-fatal problems (copy failures, leftover temp files)
    pub warnings: Vec<String>,
}

impl SeparationResult {
    pub fn succeeded(
        output_dir: PathBuf,
        stems: BTreeMap<StemKind, PathBuf>,
        elapsed: Duration,
        warnings: Vec<String>,
    ) -> Self {
        debug_assert!(!stems.is_empty(), "a successful result must carry stems");
        Self {
            success: true,
            error: None,
            failed_stage: None,
            output_dir,
            stems,
            elapsed,
            warnings,
        }
    }

    pub fn failed(
        stage: PipelineStage,
        message: impl Into<String>,
        output_dir: PathBuf,
        elapsed: Duration,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            failed_stage: Some(stage),
            output_dir,
            stems: BTreeMap::new(),
            elapsed,
            warnings,
        }
    }
}

// =============================================================================
// Supported formats
// =============================================================================

/// Input formats accepted for separation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Ogg,
    M4a,
    Aac,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" => Some(AudioFormat::Ogg),
            "m4a" => Some(AudioFormat::M4a),
            "aac" => Some(AudioFormat::Aac),
            _ => None,
        }
    }

    /// Check if a path has a supported extension
    pub fn is_supported_path(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .is_some()
    }
}
