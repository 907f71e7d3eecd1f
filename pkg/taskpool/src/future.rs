use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Result, TaskPoolError};
use crate::executor::Executor;

/// Lifecycle of a single submitted task.
///
/// Values are ordered so that `status as u8` comparisons match the
/// "monotonic along any permitted path" invariant: `Pending < Running <
/// {Done, Cancelled}`, with `Done` and `Cancelled` both terminal.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FutureStatus {
    Pending = 0,
    Running = 1,
    Done = 2,
    Cancelled = 3,
}

impl From<u8> for FutureStatus {
    fn from(v: u8) -> Self {
        match v {
            0 => FutureStatus::Pending,
            1 => FutureStatus::Running,
            2 => FutureStatus::Done,
            3 => FutureStatus::Cancelled,
            _ => unreachable!("invalid future status {}", v),
        }
    }
}

type TaskFn<T> = dyn FnOnce(&dyn Fn() -> bool) -> (Option<T>, u64) + Send;

/// Internal, type-erased handle used by the executor's task queue and
/// worker loop. A `Future<T>`'s queue entry is stored as `Arc<dyn
/// ScheduledTask>` so that futures of different output types can share one
/// `VecDeque`.
pub(crate) trait ScheduledTask: Send + Sync {
    /// Run (or cancel) the task. `executor_running` is a snapshot of
    /// `executor.is_running()` taken by the worker immediately before the
    /// call.
    fn run(&self, executor_running: bool);
}

struct FutureInner<T> {
    status: AtomicU8,
    error: AtomicU64,
    rendezvous: Mutex<Option<T>>,
    condvar: Condvar,
    executor: Arc<Executor>,
    function: Mutex<Option<Box<TaskFn<T>>>>,
}

/// A handle to the eventual result of one submitted task.
///
/// Cloning a `Future` is cheap (it clones the underlying `Arc`) and all
/// clones observe the same status transitions and the same terminal
/// `(out, error)` pair — though only the first successful `get()` call
/// actually takes ownership of `out`; see `get`'s documentation.
pub struct Future<T> {
    inner: Arc<FutureInner<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Future<T> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        function: Box<TaskFn<T>>,
    ) -> Future<T> {
        Future {
            inner: Arc::new(FutureInner {
                status: AtomicU8::new(FutureStatus::Pending as u8),
                error: AtomicU64::new(0),
                rendezvous: Mutex::new(None),
                condvar: Condvar::new(),
                executor,
                function: Mutex::new(Some(function)),
            }),
        }
    }

    pub(crate) fn as_scheduled_task(&self) -> Arc<dyn ScheduledTask> {
        self.inner.clone()
    }

    /// Atomically reads the future's current status. Never fails.
    pub fn status(&self) -> FutureStatus {
        FutureStatus::from(self.inner.status.load(Ordering::SeqCst))
    }

    /// Requests cancellation of the task.
    ///
    /// Fails with [`TaskPoolError::FutureIsDone`] if the task has already
    /// completed normally. Succeeds (as a no-op) if the future is already
    /// cancelled: the operation is idempotent.
    pub fn cancel(&self) -> Result<()> {
        let mut expected = self.inner.status.load(Ordering::SeqCst);
        loop {
            if expected == FutureStatus::Done as u8 {
                return Err(TaskPoolError::FutureIsDone);
            }
            if expected == FutureStatus::Cancelled as u8 {
                return Ok(());
            }

            match self.inner.status.compare_exchange(
                expected,
                FutureStatus::Cancelled as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(()),
                Err(observed) => expected = observed,
            }
        }
    }

    /// Blocks the calling thread until the task reaches a terminal status,
    /// then returns its output and error code.
    ///
    /// Safe to call concurrently from multiple threads: all callers observe
    /// the same terminal status and `error` code. Only one caller, however,
    /// receives `Some` for the output value — `out` is taken rather than
    /// cloned, so a second `get()` call after the first successful one sees
    /// `None` where the first saw `Some`. Callers that need the value from
    /// more than one place should coordinate amongst themselves (e.g. by
    /// only calling `get` once and fanning the result out).
    pub fn get(&self) -> Result<(Option<T>, u64)> {
        let mut guard = self.inner.rendezvous.lock().unwrap();
        while self.inner.status.load(Ordering::SeqCst) < FutureStatus::Done as u8 {
            guard = self.inner.condvar.wait(guard).unwrap();
        }
        // Chain any other thread also blocked in `get` on this future.
        self.inner.condvar.notify_one();

        let status = FutureStatus::from(self.inner.status.load(Ordering::SeqCst));
        let out = guard.take();
        drop(guard);

        if status == FutureStatus::Cancelled {
            return Err(TaskPoolError::FutureIsCancelled);
        }

        Ok((out, self.inner.error.load(Ordering::SeqCst)))
    }
}

impl<T: Send + Sync + 'static> FutureInner<T> {
    fn is_cancelled(&self) -> bool {
        if self.status.load(Ordering::SeqCst) == FutureStatus::Cancelled as u8 {
            return true;
        }

        if !self.executor.is_running() {
            self.status
                .store(FutureStatus::Cancelled as u8, Ordering::SeqCst);
            return true;
        }

        false
    }
}

impl<T: Send + Sync + 'static> ScheduledTask for FutureInner<T> {
    fn run(&self, executor_running: bool) {
        if !executor_running {
            self.status
                .store(FutureStatus::Cancelled as u8, Ordering::SeqCst);
            self.condvar.notify_all();
            return;
        }

        self.status
            .store(FutureStatus::Running as u8, Ordering::SeqCst);

        let function = self
            .function
            .lock()
            .unwrap()
            .take()
            .expect("task function already consumed");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            function(&|| self.is_cancelled())
        }));

        let (out, error) = match result {
            Ok(value) => value,
            Err(payload) => {
                log::error!("taskpool: task panicked: {}", describe_panic(&payload));
                (None, crate::error::TASK_PANICKED_ERROR_CODE)
            }
        };

        self.error.store(error, Ordering::SeqCst);
        {
            let mut guard = self.rendezvous.lock().unwrap();
            *guard = out;
        }

        let _ = self.status.compare_exchange(
            FutureStatus::Running as u8,
            FutureStatus::Done as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );

        self.condvar.notify_all();
    }
}

fn describe_panic(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_future<T: Send + Sync + 'static>(
        executor: Arc<Executor>,
        f: impl FnOnce(&dyn Fn() -> bool) -> (Option<T>, u64) + Send + 'static,
    ) -> Future<T> {
        Future::new(executor, Box::new(f))
    }

    #[test]
    fn status_starts_pending() {
        let executor = Executor::new();
        let future = new_future(executor, |_| (Some(1u32), 0));
        assert_eq!(future.status(), FutureStatus::Pending);
    }

    #[test]
    fn cancel_on_pending_succeeds_and_is_idempotent() {
        let executor = Executor::new();
        let future = new_future::<u32>(executor, |_| (None, 0));
        assert!(future.cancel().is_ok());
        assert_eq!(future.status(), FutureStatus::Cancelled);
        // Repeated cancellation of an already-cancelled future succeeds.
        assert!(future.cancel().is_ok());
    }

    #[test]
    fn cancel_after_done_fails() {
        let executor = Executor::new();
        let future = new_future(executor, |_| (Some(7u32), 0));
        ScheduledTask::run(&*future.inner, true);
        assert_eq!(future.cancel(), Err(TaskPoolError::FutureIsDone));
    }

    #[test]
    fn run_not_running_marks_cancelled() {
        let executor = Executor::new();
        let future = new_future::<u32>(executor, |_| (Some(9), 0));
        ScheduledTask::run(&*future.inner, false);
        assert_eq!(future.status(), FutureStatus::Cancelled);
        assert_eq!(future.get(), Err(TaskPoolError::FutureIsCancelled));
    }

    #[test]
    fn get_returns_output_once() {
        let executor = Executor::new();
        let future = new_future(executor, |_| (Some(42u32), 0xCAFE));
        ScheduledTask::run(&*future.inner, true);

        let (out, error) = future.get().unwrap();
        assert_eq!(out, Some(42));
        assert_eq!(error, 0xCAFE);

        // A second `get` observes the same terminal status but the output
        // has already been taken.
        let (out2, error2) = future.get().unwrap();
        assert_eq!(out2, None);
        assert_eq!(error2, 0xCAFE);
    }

    #[test]
    fn panicking_task_is_reported_as_done_with_panic_code() {
        let executor = Executor::new();
        let future = new_future::<u32>(executor, |_| panic!("boom"));
        ScheduledTask::run(&*future.inner, true);

        assert_eq!(future.status(), FutureStatus::Done);
        let (out, error) = future.get().unwrap();
        assert_eq!(out, None);
        assert_eq!(error, crate::error::TASK_PANICKED_ERROR_CODE);
    }
}
