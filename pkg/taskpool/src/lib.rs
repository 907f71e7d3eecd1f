//! A small thread pool for running blocking closures off the calling
//! thread.
//!
//! [`Executor`] owns a dynamically sized pool of worker threads and a FIFO
//! queue of submitted tasks. [`Executor::submit`] hands a closure to the
//! pool and returns a [`Future`] that can be polled, blocked on, or
//! cancelled. Use [`default_executor`] to share one pool across a process
//! instead of constructing a private one.

mod error;
mod executor;
mod future;
mod singleton;

pub use error::{TaskPoolError, TASK_PANICKED_ERROR_CODE};
pub use executor::Executor;
pub use future::{Future, FutureStatus};
pub use singleton::default_executor;
