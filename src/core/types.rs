use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Terminal failure of a guest run, as reported by `join`.
#[derive(Error, Debug, Clone)]
pub enum GuestFailure {
    #[error("entry point not found: {name}")]
    EntryPointNotFound { name: String },

    #[error("guest failed: {0:#}")]
    Failed(Arc<anyhow::Error>),

    #[error("guest panicked: {message}")]
    Panicked { message: String },

    #[error("context has no worker")]
    NotStarted,
}

impl GuestFailure {
    pub fn failed(err: anyhow::Error) -> Self {
        GuestFailure::Failed(Arc::new(err))
    }

    /// Short stable label used in lifecycle events.
    pub fn kind(&self) -> &'static str {
        match self {
            GuestFailure::EntryPointNotFound { .. } => "entry_point_not_found",
            GuestFailure::Failed(_) => "failed",
            GuestFailure::Panicked { .. } => "panicked",
            GuestFailure::NotStarted => "not_started",
        }
    }
}

/// Result of a synchronous guest run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed,
    Failed(GuestFailure),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }

    /// Process exit status for the outcome: 0 success, 2 missing entry
    /// point, 1 anything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::Failed(GuestFailure::EntryPointNotFound { .. }) => 2,
            RunOutcome::Failed(_) => 1,
        }
    }
}

impl From<std::result::Result<(), GuestFailure>> for RunOutcome {
    fn from(result: std::result::Result<(), GuestFailure>) -> Self {
        match result {
            Ok(()) => RunOutcome::Completed,
            Err(failure) => RunOutcome::Failed(failure),
        }
    }
}

/// Summary of one context, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ContextSummary {
    pub id: uuid::Uuid,
    pub label: String,
    pub outcome: String,
    pub exit_code: i32,
}
