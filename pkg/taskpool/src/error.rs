use common::errors::*;

/// Error code returned by [`crate::Future::get`] when the task closure
/// panicked instead of returning normally.
///
/// Stored in the future's `error` slot rather than surfaced through
/// `Result::Err`, since the future itself did reach a terminal (`Done`)
/// status.
pub const TASK_PANICKED_ERROR_CODE: u64 = u64::MAX;

/// Errors returned by the executor/future surface.
///
/// Argument-validation errors from a C-style API (null object, null
/// function, null out-pointer) have no counterpart here: the type system
/// makes those states unrepresentable, so only the lifecycle and resource
/// errors remain.
#[derive(Clone, Copy, Debug, Fail, PartialEq, Eq)]
pub enum TaskPoolError {
    /// Returned by `submit`/`shutdown` once the executor has begun or
    /// completed shutdown.
    #[fail(display = "executor is busy shutting down")]
    IsBusyShuttingDown,

    /// Returned by `submit` when no worker thread could be spawned and the
    /// pool had no existing threads to fall back on.
    #[fail(display = "failed to spawn a worker thread")]
    ThreadCreationFailed,

    /// Returned by `cancel` when the future has already completed normally.
    #[fail(display = "future has already completed")]
    FutureIsDone,

    /// Returned by `get` when the future's task was cancelled rather than
    /// completed.
    #[fail(display = "future was cancelled")]
    FutureIsCancelled,
}

pub type Result<T> = std::result::Result<T, TaskPoolError>;
