//! Separation pipeline

pub mod orchestrator;

pub use orchestrator::{validate, Separator};

use crate::config::Settings;
use crate::types::{SeparationRequest, SeparationResult};

/// Run one request with `settings`, without progress reporting
pub fn run(settings: &Settings, request: &SeparationRequest) -> SeparationResult {
    Separator::new(settings.clone()).separate(request, None)
}
