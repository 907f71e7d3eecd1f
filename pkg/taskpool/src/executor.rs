use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::time::{Duration, Instant};

use crate::error::{Result, TaskPoolError};
use crate::future::{Future, ScheduledTask};

/// How long an idle worker waits for new work before retiring.
const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the destructor polls `count` while waiting for workers to
/// drain during graceful teardown.
const TEARDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct ThreadPoolState {
    tasks: Mutex<VecDeque<Arc<dyn ScheduledTask>>>,
    pool_mutex: Mutex<()>,
    pool_condvar: Condvar,
    count: AtomicU64,
    ready: AtomicU64,
}

/// Owns a pool of worker threads, a FIFO task queue, and the running flag
/// that governs graceful shutdown.
///
/// An `Executor` is normally held behind an `Arc` (as returned by
/// [`Executor::new`] and [`crate::default_executor`]); every [`Future`]
/// produced by `submit` keeps that `Arc` alive for as long as the future
/// itself is reachable, so the executor outlives any task still in flight.
pub struct Executor {
    running: AtomicBool,
    threads: ThreadPoolState,
    self_weak: Mutex<Option<Weak<Executor>>>,
}

impl Executor {
    /// Creates a new, empty executor. No worker threads are spawned until
    /// the first task is submitted.
    pub fn new() -> Arc<Executor> {
        let executor = Arc::new(Executor {
            running: AtomicBool::new(true),
            threads: ThreadPoolState {
                tasks: Mutex::new(VecDeque::new()),
                pool_mutex: Mutex::new(()),
                pool_condvar: Condvar::new(),
                count: AtomicU64::new(0),
                ready: AtomicU64::new(0),
            },
            self_weak: Mutex::new(None),
        });

        *executor.self_weak.lock().unwrap() = Some(Arc::downgrade(&executor));

        executor
    }

    /// Number of live worker threads.
    pub fn count(&self) -> u64 {
        self.threads.count.load(Ordering::SeqCst)
    }

    /// Number of worker threads currently idle and waiting for work.
    pub fn ready(&self) -> u64 {
        self.threads.ready.load(Ordering::SeqCst)
    }

    /// Whether the executor is still accepting submissions.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops accepting new submissions.
    ///
    /// Already-queued and in-flight tasks are not aborted immediately: a
    /// running task observes shutdown only the next time it polls the
    /// cancellation probe, and a task that never polls it still runs to
    /// completion, but is reported as cancelled rather than done (see
    /// [`crate::Future::get`]).
    pub fn shutdown(&self) -> Result<()> {
        self.running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| TaskPoolError::IsBusyShuttingDown)?;

        // Wake every idle worker so they observe `running == false` on
        // their next loop turn instead of waiting out the full idle
        // timeout.
        let _guard = self.threads.pool_mutex.lock().unwrap();
        self.threads.pool_condvar.notify_all();
        Ok(())
    }

    /// Submits a task closure to run on the pool.
    ///
    /// `function` receives a cancellation probe (`&dyn Fn() -> bool`) that
    /// it should poll periodically, and returns an optional output value
    /// plus an application-defined error code (both default to
    /// `None`/`0` if the task ignores them).
    pub fn submit<F, T>(&self, function: F) -> Result<Future<T>>
    where
        F: FnOnce(&dyn Fn() -> bool) -> (Option<T>, u64) + Send + 'static,
        T: Send + Sync + 'static,
    {
        if !self.is_running() {
            return Err(TaskPoolError::IsBusyShuttingDown);
        }

        let strong_self = self
            .self_weak
            .lock()
            .unwrap()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(TaskPoolError::IsBusyShuttingDown)?;

        let future = Future::new(strong_self, Box::new(function));

        if self.threads.ready.load(Ordering::SeqCst) == 0 {
            self.spawn_worker()?;
        }

        self.threads
            .tasks
            .lock()
            .unwrap()
            .push_back(future.as_scheduled_task());

        let _guard = self.threads.pool_mutex.lock().unwrap();
        self.threads.pool_condvar.notify_one();
        drop(_guard);

        Ok(future)
    }

    fn spawn_worker(&self) -> Result<()> {
        let executor_weak = self
            .self_weak
            .lock()
            .unwrap()
            .clone()
            .expect("self_weak is initialized before Executor::new returns");

        let spawn_result = std::thread::Builder::new()
            .name("taskpool-worker".to_string())
            .spawn(move || worker_loop(executor_weak));

        match spawn_result {
            Ok(_join_handle) => {
                // The worker runs detached: its lifetime is governed by its
                // own loop, not by anyone joining this handle.
                self.threads.count.fetch_add(1, Ordering::SeqCst);
                log::debug!("taskpool: spawned worker, count={}", self.count());
                Ok(())
            }
            Err(err) => {
                if self.threads.count.load(Ordering::SeqCst) > 0 {
                    log::warn!(
                        "taskpool: failed to spawn worker ({}), falling back to existing pool",
                        err
                    );
                    Ok(())
                } else {
                    log::error!("taskpool: failed to spawn first worker: {}", err);
                    Err(TaskPoolError::ThreadCreationFailed)
                }
            }
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        // Tolerate a shutdown that already happened (e.g. the caller called
        // `shutdown` explicitly before dropping the last handle).
        let _ = self.shutdown();

        while self.count() > 0 {
            std::thread::sleep(TEARDOWN_POLL_INTERVAL);
        }

        // `tasks`, `pool_mutex`, `pool_condvar` and `self_weak` are dropped
        // normally from here: every worker has already decremented `count`
        // to zero as the very last action of its loop, so none can still be
        // touching them.
    }
}

fn worker_loop(executor: Weak<Executor>) {
    let executor = match executor.upgrade() {
        Some(e) => e,
        None => return,
    };

    loop {
        loop {
            let next = executor.threads.tasks.lock().unwrap().pop_front();
            let task = match next {
                Some(task) => task,
                None => break,
            };

            // Wake at most one peer that may be blocked waiting for the
            // queue to drain further.
            {
                let _guard = executor.threads.pool_mutex.lock().unwrap();
                executor.threads.pool_condvar.notify_one();
            }

            task.run(executor.is_running());
        }

        let mut guard = executor.threads.pool_mutex.lock().unwrap();
        let deadline = Instant::now() + WORKER_IDLE_TIMEOUT;
        executor.threads.ready.fetch_add(1, Ordering::SeqCst);

        let mut timed_out = false;
        while executor.threads.tasks.lock().unwrap().is_empty() {
            let now = Instant::now();
            if now >= deadline {
                timed_out = true;
                break;
            }

            let (next_guard, wait_result) = executor
                .threads
                .pool_condvar
                .wait_timeout(guard, deadline - now)
                .unwrap();
            guard = next_guard;

            if wait_result.timed_out() && executor.threads.tasks.lock().unwrap().is_empty() {
                timed_out = true;
                break;
            }
        }

        executor.threads.ready.fetch_sub(1, Ordering::SeqCst);
        drop(guard);

        if timed_out && executor.threads.tasks.lock().unwrap().is_empty() {
            executor.threads.count.fetch_sub(1, Ordering::SeqCst);
            log::debug!(
                "taskpool: worker retiring after idle timeout, count={}",
                executor.count()
            );
            return;
        }
        // Either woken by a signal, or the queue gained work while we were
        // about to declare a timeout: go back around and drain it.
    }
}
