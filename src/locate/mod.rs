//! Output discovery
//!
//! Where the tool puts its files depends on its version. Known layouts are
//! tried in a fixed priority order (first existing directory wins); if none
//! exist the working directory is searched for a `drums.<ext>` file.

pub mod candidates;
pub mod stem_table;

pub use candidates::candidate_dirs;

use crate::types::LocatedStem;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Stage whose file marks a directory as a stem directory during the fallback search
const MARKER_STAGE: &str = "drums";

/// Find the stems the tool produced for `track` under `root`
///
/// Returns an empty list if no stem directory can be found.
pub fn locate_stems(root: &Path, model: &str, track: &str, extension: &str) -> Vec<LocatedStem> {
    match find_stem_dir(root, model, track, extension) {
        Some(dir) => collect_stems(&dir, extension),
        None => {
            warn!("No stem directory found under {}", root.display());
            Vec::new()
        }
    }
}

/// The directory holding the stems, by candidate priority then by search
pub fn find_stem_dir(root: &Path, model: &str, track: &str, extension: &str) -> Option<PathBuf> {
    for candidate in candidate_dirs(root, model, track) {
        if candidate.is_dir() {
            debug!("Using stem directory {}", candidate.display());
            return Some(candidate);
        }
        debug!("Candidate {} does not exist", candidate.display());
    }

    let found = search_for_stem_dir(root, extension);
    if let Some(dir) = &found {
        info!(
            "Stems found outside the expected layout at {}",
            dir.display()
        );
    }
    found
}

/// Depth-first, name-sorted walk of `root` for the first `drums.<ext>`
///
/// Symlinks are not followed, so the walk never leaves `root`.
fn search_for_stem_dir(root: &Path, extension: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|entry| {
            entry.file_type().is_file() && is_stage_file(entry.path(), MARKER_STAGE, extension)
        })
        .and_then(|entry| entry.path().parent().map(Path::to_path_buf))
}

fn is_stage_file(path: &Path, stage: &str, extension: &str) -> bool {
    let stem_matches = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.eq_ignore_ascii_case(stage));
    stem_matches && has_extension(path, extension)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Map every `*.<ext>` file in `dir` to a stem, skipping unknown names
fn collect_stems(dir: &Path, extension: &str) -> Vec<LocatedStem> {
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());

    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read stem directory {}: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && has_extension(p, extension))
        .collect();
    files.sort();

    let mut seen = HashSet::new();
    let mut stems = Vec::new();

    for path in files {
        let Some(base) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match stem_table::lookup(base) {
            Some((stage, kind)) if seen.insert(kind) => {
                stems.push(LocatedStem {
                    stage,
                    kind,
                    source: path,
                });
            }
            Some((stage, _)) => {
                debug!("Ignoring duplicate {} stem {}", stage, path.display());
            }
            None => {
                debug!("Ignoring unrecognized file {}", path.display());
            }
        }
    }

    debug!("Located {} stems in {}", stems.len(), dir.display());
    stems
}
