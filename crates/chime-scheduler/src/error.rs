use thiserror::Error;

/// Errors that can occur within the scheduler core.
///
/// Nothing here ever terminates the hosting process: every variant degrades
/// to "this task did not run this pass".
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The registry could not be queried at all; the pass aborts silently.
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// Underlying SQLite / rusqlite error outside the locked update path.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The exclusive registry lock is held elsewhere. Too risky to continue
    /// with this task; it is skipped for the pass.
    #[error("Registry lock unavailable for task {id}")]
    LockUnavailable { id: String },

    /// The run-state write or its commit failed; the task is not invoked.
    #[error("Run-state write failed for task {id}: {reason}")]
    WriteFailed { id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
