//! Pipeline orchestration
//!
//! Validating → ProbingTool → Invoking → Locating → PostProcessing →
//! CleaningUp → Done. Every failure is folded into a [`SeparationResult`];
//! nothing escapes as an error. The work directory is removed on every path.

use crate::config::Settings;
use crate::error::{Result, SeparationError};
use crate::export::copy_stems;
use crate::locate::locate_stems;
use crate::process::{self, CancellationToken, RunOptions};
use crate::progress::{default_strategy, StrategyFactory};
use crate::tool::{build_args, check_available};
use crate::types::{
    AudioFormat, PipelineStage, ProgressEvent, SeparationRequest, SeparationResult, StemKind,
};
use crossbeam_channel::Sender;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Runs separation requests against one configured tool
pub struct Separator {
    settings: Settings,
    strategy: StrategyFactory,
    cancel: Option<CancellationToken>,
}

impl Separator {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            strategy: default_strategy,
            cancel: None,
        }
    }

    /// Use a different progress interpretation
    pub fn with_strategy(mut self, strategy: StrategyFactory) -> Self {
        self.strategy = strategy;
        self
    }

    /// Allow the running tool to be killed through `token`
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the full pipeline for `request`
    ///
    /// Progress events are sent to `progress` in the order they are produced.
    /// The channel should be unbounded; a dropped receiver is ignored.
    pub fn separate(
        &self,
        request: &SeparationRequest,
        progress: Option<&Sender<ProgressEvent>>,
    ) -> SeparationResult {
        let started = Instant::now();
        let output_dir = request.final_dir();
        let mut stage = PipelineStage::Validating;
        let mut warnings = Vec::new();

        info!("Separating {} with {}", request.input().display(), request.model());

        match self.run_stages(request, progress, &mut stage, &mut warnings) {
            Ok(stems) => {
                info!(
                    "Separated {} stems in {:.2}s",
                    stems.len(),
                    started.elapsed().as_secs_f64()
                );
                SeparationResult::succeeded(output_dir, stems, started.elapsed(), warnings)
            }
            Err(e) => {
                error!("Separation failed while {}: {}", stage, e);
                if e.is_pre_spawn() {
                    debug!("{} was never started", self.settings.tool.program);
                }
                SeparationResult::failed(stage, e.to_string(), output_dir, started.elapsed(), warnings)
            }
        }
    }

    fn run_stages(
        &self,
        request: &SeparationRequest,
        progress: Option<&Sender<ProgressEvent>>,
        stage: &mut PipelineStage,
        warnings: &mut Vec<String>,
    ) -> Result<BTreeMap<StemKind, PathBuf>> {
        enter(stage, PipelineStage::Validating);
        validate(request)?;

        enter(stage, PipelineStage::ProbingTool);
        check_available(&self.settings.tool, self.settings.probe_timeout)?;

        enter(stage, PipelineStage::Invoking);
        let workdir = WorkDir::create(&self.settings.temp_root)?;

        let outcome = self.separate_in(workdir.path(), request, progress, stage, warnings);

        if outcome.is_ok() {
            enter(stage, PipelineStage::CleaningUp);
        }
        if let Err(message) = workdir.remove() {
            warn!("{}", message);
            warnings.push(message);
        }

        let stems = outcome?;
        enter(stage, PipelineStage::Done);
        Ok(stems)
    }

    /// Invoking, Locating and PostProcessing, all inside `temp_dir`
    fn separate_in(
        &self,
        temp_dir: &Path,
        request: &SeparationRequest,
        progress: Option<&Sender<ProgressEvent>>,
        stage: &mut PipelineStage,
        warnings: &mut Vec<String>,
    ) -> Result<BTreeMap<StemKind, PathBuf>> {
        let tool = &self.settings.tool;
        let args = tool.args_with(build_args(request, temp_dir));
        let options = RunOptions {
            timeout: self.settings.separation_timeout,
            cancel: self.cancel.clone(),
        };

        let mut strategy = (self.strategy)(request.model());

        let invocation = process::run(
            &tool.program,
            &args,
            &options,
            |line| debug!("[tool] {}", line),
            |line| {
                trace!("[tool stderr] {}", line);
                send_events(progress, strategy.feed(line));
            },
        )?;

        if !invocation.success() {
            return Err(SeparationError::process_failure(
                invocation.exit_code,
                &invocation.stderr,
            ));
        }
        send_events(progress, strategy.finish());

        enter(stage, PipelineStage::Locating);
        let track = request.track_name();
        let extension = request.format().extension();
        let located = locate_stems(temp_dir, request.model(), &track, extension);
        if located.is_empty() {
            return Err(SeparationError::NoOutputFound(temp_dir.to_path_buf()));
        }

        enter(stage, PipelineStage::PostProcessing);
        let final_dir = request.final_dir();
        let report = copy_stems(&located, &final_dir, &track, extension)?;

        for failure in &report.failures {
            warnings.push(format!(
                "{} stem not copied from {}: {}",
                failure.kind,
                failure.source.display(),
                failure.reason
            ));
        }

        if report.copied.is_empty() {
            return Err(SeparationError::OutputError {
                path: final_dir,
                reason: format!("none of the {} located stems could be copied", located.len()),
            });
        }

        Ok(report.copied)
    }
}

/// Check a request before anything is spawned
pub fn validate(request: &SeparationRequest) -> Result<()> {
    let input = request.input();

    if !input.exists() {
        return Err(SeparationError::FileNotFound(input.to_path_buf()));
    }
    if !input.is_file() {
        return Err(SeparationError::Validation(format!(
            "'{}' is not a file",
            input.display()
        )));
    }
    if !AudioFormat::is_supported_path(input) {
        return Err(SeparationError::UnsupportedFormat {
            path: input.to_path_buf(),
            format: input
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("none")
                .to_string(),
        });
    }
    if request.model().trim().is_empty() {
        return Err(SeparationError::Validation(
            "model identifier is empty".to_string(),
        ));
    }
    // The model names a folder inside the work directory
    let mut components = Path::new(request.model()).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return Err(SeparationError::Validation(format!(
            "model identifier '{}' must be a plain name, not a path",
            request.model()
        )));
    }

    Ok(())
}

fn enter(stage: &mut PipelineStage, next: PipelineStage) {
    debug!("Pipeline stage: {}", next);
    *stage = next;
}

fn send_events(progress: Option<&Sender<ProgressEvent>>, events: Vec<ProgressEvent>) {
    let Some(tx) = progress else {
        return;
    };
    for event in events {
        // Receiver gone means nobody is watching; keep separating
        let _ = tx.send(event);
    }
}

/// Per-request work directory, removed on drop if not removed explicitly
struct WorkDir {
    path: PathBuf,
    removed: bool,
}

impl WorkDir {
    fn create(root: &Path) -> Result<Self> {
        let path = root.join(format!("stemctl-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path).map_err(|e| SeparationError::output_error(&path, e))?;
        debug!("Created work directory {}", path.display());
        Ok(Self {
            path,
            removed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory, describing any failure
    fn remove(mut self) -> std::result::Result<(), String> {
        self.removed = true;
        remove_tree(&self.path).map_err(|e| {
            format!(
                "Could not remove temporary directory {}: {}",
                self.path.display(),
                e
            )
        })
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.removed {
            if let Err(e) = remove_tree(&self.path) {
                warn!(
                    "Could not remove temporary directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

fn remove_tree(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => {
            if other.is_ok() {
                debug!("Removed work directory {}", path.display());
            }
            other
        }
    }
}
