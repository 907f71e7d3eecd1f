use std::sync::Arc;

use lazy_static::lazy_static;

use crate::executor::Executor;

lazy_static! {
    static ref DEFAULT_EXECUTOR: Arc<Executor> = Executor::new();
}

/// Returns the process-wide default executor, creating it (and its first
/// worker thread, lazily, on first `submit`) the first time it is needed.
///
/// Every caller that wants to share one pool across a process rather than
/// owning a private one should go through this accessor instead of calling
/// [`Executor::new`] directly.
pub fn default_executor() -> Arc<Executor> {
    DEFAULT_EXECUTOR.clone()
}
