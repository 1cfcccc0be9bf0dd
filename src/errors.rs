//! Typed error hierarchy for the paperlog workflow.
//!
//! - `InputError`: malformed workflow input, raised before any stage runs
//! - `StageError`: one external stage invocation failed
//! - `FanOutFailure`: one or more producers failed during the parallel fan-out
//! - `WorkflowError`: everything the run controller can return
//!
//! Running out of review iterations is not an error; see
//! [`RunStatus::BudgetExhausted`](crate::workflow::RunStatus).

use crate::workflow::{ProducerRole, Role};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from validating a `WorkflowInput`.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Source reference is empty")]
    EmptySource,

    #[error("Source file not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Output directory is empty")]
    EmptyOutputDir,

    #[error("Output path exists but is not a directory: {0}")]
    OutputNotDirectory(PathBuf),
}

/// A single external stage invocation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Stage '{role}' failed: {cause}")]
pub struct StageError {
    pub role: Role,
    pub cause: String,
}

impl StageError {
    pub fn new(role: impl Into<Role>, cause: impl fmt::Display) -> Self {
        Self {
            role: role.into(),
            cause: cause.to_string(),
        }
    }
}

/// Outcome of a fan-out in which at least one producer failed.
///
/// Siblings are always awaited, so the roles that did succeed are reported
/// alongside every failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOutFailure {
    /// Failures in canonical role order. Never empty.
    pub failures: Vec<StageError>,
    /// Producers that completed successfully before the batch was rejected.
    pub completed: Vec<ProducerRole>,
}

impl FanOutFailure {
    /// The failure reported to the caller as the run's cause.
    pub fn primary(&self) -> &StageError {
        &self.failures[0]
    }
}

impl fmt::Display for FanOutFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary())?;
        if self.failures.len() > 1 {
            write!(f, " (and {} more)", self.failures.len() - 1)?;
        }
        if !self.completed.is_empty() {
            let done: Vec<String> = self.completed.iter().map(|r| r.to_string()).collect();
            write!(f, "; completed: {}", done.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for FanOutFailure {}

/// Errors from a workflow run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid workflow input: {0}")]
    Input(#[from] InputError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("Producer fan-out failed: {0}")]
    FanOut(#[from] FanOutFailure),

    #[error("Integration has no output from {role}")]
    MissingProducerOutput { role: ProducerRole },

    #[error("Failed to write checkpoint for iteration {iteration} at {path}: {source}")]
    CheckpointWriteFailed {
        iteration: u32,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write final output at {path}: {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkflowError {
    /// The stage failure behind this error, if it came from a stage.
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            Self::Stage(e) => Some(e),
            Self::FanOut(f) => Some(f.primary()),
            _ => None,
        }
    }
}
