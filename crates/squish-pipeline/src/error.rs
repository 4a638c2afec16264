//! Error types for pipeline setup and runs

use squish_core::ConfigError;
use thiserror::Error;

use crate::matcher::InvalidSpecError;
use crate::scheduler::SchedulerError;

/// Result type alias using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that abort a pipeline.
///
/// Per-asset failures (transform errors, timeouts, cache IO) never surface
/// here; they resolve to the original content.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed match specification
    #[error(transparent)]
    InvalidSpec(#[from] InvalidSpecError),

    /// Scheduler setup or task failure
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}
