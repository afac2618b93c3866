//! Output writers: the final stem files and the optional JSON manifest

pub mod manifest;
pub mod stems;

pub use manifest::write_manifest;
pub use stems::{copy_stems, CopyFailure, CopyReport};
