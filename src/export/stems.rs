//! Final stem layout
//!
//! Copies located stems to `<dest>/<track>_<stage>.<ext>`. Each stem is
//! copied independently; one failure never stops the others.

use crate::error::{Result, SeparationError};
use crate::types::{LocatedStem, StemKind};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, info, warn};

/// A stem that could not be copied
#[derive(Debug, Clone)]
pub struct CopyFailure {
    pub kind: StemKind,
    pub source: PathBuf,
    pub reason: String,
}

/// Outcome of copying a batch of stems
#[derive(Debug, Default)]
pub struct CopyReport {
    /// Final path of every stem that was copied
    pub copied: BTreeMap<StemKind, PathBuf>,
    pub failures: Vec<CopyFailure>,
}

/// Final file name for a stage: `<track>_<stage>.<ext>`
pub fn stem_file_name(track: &str, stage: &str, extension: &str) -> String {
    format!("{}_{}.{}", track, stage, extension)
}

/// Copy `stems` into `dest_dir`, overwriting files of the same name
///
/// Only failure to create `dest_dir` is an error; per-stem failures are
/// collected in the report.
pub fn copy_stems(
    stems: &[LocatedStem],
    dest_dir: &Path,
    track: &str,
    extension: &str,
) -> Result<CopyReport> {
    std::fs::create_dir_all(dest_dir).map_err(|e| SeparationError::output_error(dest_dir, e))?;

    let report = {
        let lock = dir_lock(dest_dir);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        copy_all(stems, dest_dir, track, extension)
    };
    forget_idle_locks();

    info!(
        "Wrote {} stems to {} ({} failed)",
        report.copied.len(),
        dest_dir.display(),
        report.failures.len()
    );

    Ok(report)
}

fn copy_all(stems: &[LocatedStem], dest_dir: &Path, track: &str, extension: &str) -> CopyReport {
    let mut report = CopyReport::default();

    for stem in stems {
        let dest = dest_dir.join(stem_file_name(track, stem.stage, extension));
        match copy_one(&stem.source, &dest) {
            Ok(bytes) => {
                debug!(
                    "Copied {} ({} bytes) -> {}",
                    stem.source.display(),
                    bytes,
                    dest.display()
                );
                report.copied.insert(stem.kind, dest);
            }
            Err(e) => {
                warn!("Failed to copy {} stem from {}: {}", stem.stage, stem.source.display(), e);
                report.failures.push(CopyFailure {
                    kind: stem.kind,
                    source: stem.source.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

/// Copy through a temporary name so a reader never sees a half-written stem
fn copy_one(source: &Path, dest: &Path) -> std::io::Result<u64> {
    let partial = dest.with_extension("partial");
    let bytes = std::fs::copy(source, &partial).inspect_err(|_| {
        let _ = std::fs::remove_file(&partial);
    })?;
    std::fs::rename(&partial, dest).inspect_err(|_| {
        let _ = std::fs::remove_file(&partial);
    })?;
    Ok(bytes)
}

/// Per-directory locks of the requests currently post-processing
///
/// Two requests for the same track writing to the same directory would
/// otherwise interleave their overwrites.
static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

fn locks() -> MutexGuard<'static, HashMap<PathBuf, Arc<Mutex<()>>>> {
    LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn lock_key(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
}

fn dir_lock(dir: &Path) -> Arc<Mutex<()>> {
    locks().entry(lock_key(dir)).or_default().clone()
}

/// Drop locks nobody holds so the map only tracks directories in use
fn forget_idle_locks() {
    locks().retain(|_, lock| Arc::strong_count(lock) > 1);
}
