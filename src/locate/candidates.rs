//! Candidate output directories, in priority order
//!
//! Each builder is a pure function of (root, model, track). Nothing here
//! touches the filesystem.

use crate::tool::models::ALTERNATE_MODEL_DIRS;
use std::path::{Path, PathBuf};

/// Builds zero or more candidate directories
pub type CandidateFn = fn(&Path, &str, &str) -> Vec<PathBuf>;

/// `<root>/<model>/<track>`, the layout the tool documents
pub fn model_dir(root: &Path, model: &str, track: &str) -> Vec<PathBuf> {
    vec![root.join(model).join(track)]
}

/// `<root>/<alt>/<track>` for model folders some versions write regardless of `-n`
pub fn alternate_model_dirs(root: &Path, model: &str, track: &str) -> Vec<PathBuf> {
    ALTERNATE_MODEL_DIRS
        .iter()
        .filter(|alt| **alt != model)
        .map(|alt| root.join(alt).join(track))
        .collect()
}

/// `<root>/separated/<model>/<track>`, the tool's own default grouping
pub fn grouped_by_model(root: &Path, model: &str, track: &str) -> Vec<PathBuf> {
    vec![root.join("separated").join(model).join(track)]
}

/// Candidate builders, highest priority first
pub const CANDIDATES: &[CandidateFn] = &[model_dir, alternate_model_dirs, grouped_by_model];

/// All candidate directories in priority order
pub fn candidate_dirs(root: &Path, model: &str, track: &str) -> Vec<PathBuf> {
    CANDIDATES
        .iter()
        .flat_map(|build| build(root, model, track))
        .collect()
}
