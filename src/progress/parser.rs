//! Percent-to-stage estimation
//!
//! The tool reports one percentage for the whole run. Stage boundaries are
//! estimated by splitting 0–100 evenly across the expected stages, so the
//! reported stage is wrong whenever stages take unequal time. That is a known
//! limitation of the approximation.

use super::ProgressStrategy;
use crate::tool::expected_stages;
use crate::types::{ProgressEvent, StageRef};
use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

/// Lines without a percentage that are still worth reporting
pub const PHASE_MARKERS: &[&str] = &["Separating", "Separated tracks", "Selected model"];

fn percent_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+)%").expect("percent pattern is valid"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParserState {
    Idle,
    TrackingStage(usize),
}

/// Stage estimator driven by `\d+%` tokens
#[derive(Debug, Clone)]
pub struct PercentStageParser {
    stages: Vec<String>,
    markers: Vec<String>,
    pattern: Regex,
    state: ParserState,
}

impl PercentStageParser {
    /// Parser for an explicit, non-empty list of stage names
    pub fn new<S: Into<String>>(stages: impl IntoIterator<Item = S>) -> Self {
        let mut stages: Vec<String> = stages.into_iter().map(Into::into).collect();
        if stages.is_empty() {
            stages.push("separation".to_string());
        }
        Self {
            stages,
            markers: PHASE_MARKERS.iter().map(|m| m.to_string()).collect(),
            pattern: percent_pattern().clone(),
            state: ParserState::Idle,
        }
    }

    /// Parser for the stages `model` is expected to produce
    pub fn for_model(model: &str) -> Self {
        Self::new(expected_stages(model).iter().copied())
    }

    /// Replace the percent pattern; the first capture group must be the number
    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = pattern;
        self
    }

    /// Replace the phase-announcement markers
    pub fn with_markers<S: Into<String>>(mut self, markers: impl IntoIterator<Item = S>) -> Self {
        self.markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// 0-based stage index of the stage currently being tracked
    pub fn current_stage(&self) -> Option<usize> {
        match self.state {
            ParserState::Idle => None,
            ParserState::TrackingStage(index) => Some(index),
        }
    }

    /// First percentage token in `line`, capped at 100
    fn extract_percent(&self, line: &str) -> Option<u8> {
        let digits = self.pattern.captures(line)?.get(1)?.as_str();
        // Digits too long for u64 can only mean "more than 100"
        let value = digits.parse::<u64>().unwrap_or(u64::MAX);
        Some(value.min(100) as u8)
    }

    /// Estimated 0-based stage index for an overall percent
    pub fn stage_index(&self, percent: u8) -> usize {
        let count = self.stages.len();
        (usize::from(percent) * count / 100).min(count - 1)
    }

    /// Percent within `index`'s share of the 0–100 range
    fn stage_percent(&self, percent: u8, index: usize) -> u8 {
        let count = self.stages.len();
        let scaled = usize::from(percent) * count;
        let local = scaled.saturating_sub(index * 100).min(100);
        local as u8
    }

    fn stage_ref(&self, index: usize) -> StageRef {
        StageRef {
            name: self.stages[index].clone(),
            index: index + 1,
            total: self.stages.len(),
        }
    }

    fn complete_event(&self, index: usize) -> ProgressEvent {
        let stage = self.stage_ref(index);
        let message = format!("{} complete", stage.name);
        ProgressEvent::StageComplete { stage, message }
    }
}

impl ProgressStrategy for PercentStageParser {
    fn feed(&mut self, line: &str) -> Vec<ProgressEvent> {
        let message = line.trim();

        let Some(percent) = self.extract_percent(line) else {
            if self.markers.iter().any(|m| line.contains(m.as_str())) {
                return vec![ProgressEvent::Info {
                    message: message.to_string(),
                }];
            }
            trace!("Dropping line: {}", message);
            return Vec::new();
        };

        let index = self.stage_index(percent);
        let mut events = Vec::with_capacity(3);

        match self.state {
            ParserState::TrackingStage(previous) if index > previous => {
                events.push(self.complete_event(previous));
            }
            ParserState::TrackingStage(previous) if index < previous => {
                // Counter restarted (another shift or pass); follow it without
                // claiming anything finished
                trace!("Progress moved back from stage {} to {}", previous + 1, index + 1);
            }
            _ => {}
        }
        self.state = ParserState::TrackingStage(index);

        events.push(ProgressEvent::StageProgress {
            stage: self.stage_ref(index),
            percent: self.stage_percent(percent, index),
            overall_percent: percent,
            message: message.to_string(),
        });
        events.push(ProgressEvent::OverallProgress {
            percent,
            message: message.to_string(),
        });

        events
    }

    fn finish(&mut self) -> Vec<ProgressEvent> {
        match std::mem::replace(&mut self.state, ParserState::Idle) {
            ParserState::TrackingStage(index) => vec![self.complete_event(index)],
            ParserState::Idle => Vec::new(),
        }
    }
}
