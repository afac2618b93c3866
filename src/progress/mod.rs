//! Progress interpretation
//!
//! The separation tool prints free-form progress text. A [`ProgressStrategy`]
//! turns it into [`ProgressEvent`]s. The default strategy,
//! [`PercentStageParser`], assumes a single rising percentage counter split
//! evenly across stages; other tool versions can plug in their own strategy
//! without touching the pipeline.

pub mod parser;

pub use parser::PercentStageParser;

use crate::types::ProgressEvent;

/// Line-by-line interpreter of tool output
pub trait ProgressStrategy: Send {
    /// Interpret one line, returning the events it produces (possibly none)
    fn feed(&mut self, line: &str) -> Vec<ProgressEvent>;

    /// Called once the stream has ended
    fn finish(&mut self) -> Vec<ProgressEvent>;
}

/// Builds a fresh strategy for a model identifier
pub type StrategyFactory = fn(&str) -> Box<dyn ProgressStrategy>;

/// The percent-based stage estimator for `model`
pub fn default_strategy(model: &str) -> Box<dyn ProgressStrategy> {
    Box::new(PercentStageParser::for_model(model))
}
