use thiserror::Error;

use crate::task::TaskState;

/// Errors surfaced by the scheduler core.
///
/// Invalid transitions and priority-set failures are not fatal in release
/// builds — the scheduler logs and continues, per the bookkeeping rules in
/// `TaskStateMachine`. They are still represented here so callers that want
/// to observe them (tests, diagnostics) can.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// The executor's submission ring is full.
    #[error("submission ring is full")]
    Overflow,

    /// `submit` was called after the owning executor (or pool) shut down.
    #[error("executor is shutting down")]
    ShutdownInProgress,

    /// A task attempted a transition not present in the state table.
    #[error("invalid task state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: TaskState, to: TaskState },

    /// Setting the OS-level scheduling priority for a worker thread failed.
    /// The task still runs, at its inherited priority.
    #[error("failed to set thread priority: {0}")]
    PrioritySetFailed(String),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
