//! JSON manifest describing a separation run

use crate::error::{Result, SeparationError};
use crate::types::{SeparationRequest, SeparationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Manifest schema version
const SCHEMA_VERSION: &str = "1.0";

/// Top-level manifest structure
#[derive(Debug, Serialize, Deserialize)]
pub struct SeparationManifest {
    /// Schema version for forward compatibility
    pub version: String,
    /// stemctl version that generated this file
    pub generator_version: String,
    pub created_at: String,
    pub input: String,
    pub model: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub output_dir: String,
    /// Stage name -> final file path
    pub stems: BTreeMap<String, String>,
    pub elapsed_seconds: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SeparationManifest {
    pub fn new(request: &SeparationRequest, result: &SeparationResult) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            input: request.input().to_string_lossy().to_string(),
            model: request.model().to_string(),
            success: result.success,
            error: result.error.clone(),
            output_dir: result.output_dir.to_string_lossy().to_string(),
            stems: result
                .stems
                .iter()
                .map(|(kind, path)| (kind.stage_name().to_string(), path.to_string_lossy().to_string()))
                .collect(),
            elapsed_seconds: result.elapsed.as_secs_f64(),
            warnings: result.warnings.clone(),
        }
    }
}

/// Write the manifest for `result` to `output_path`
///
/// Writes to a temp file first, then renames, so an interrupted write never
/// leaves a truncated manifest behind.
pub fn write_manifest(
    request: &SeparationRequest,
    result: &SeparationResult,
    output_path: &Path,
) -> Result<()> {
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| SeparationError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    let manifest = SeparationManifest::new(request, result);

    serde_json::to_writer_pretty(BufWriter::new(file), &manifest).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        SeparationError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        SeparationError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    info!("Wrote manifest to {}", output_path.display());

    Ok(())
}
