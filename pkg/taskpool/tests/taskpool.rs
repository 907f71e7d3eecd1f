extern crate taskpool;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskpool::{default_executor, Executor, FutureStatus, TaskPoolError};

#[test]
fn submits_and_collects_many_concurrent_tasks() {
    let executor = Executor::new();

    let futures: Vec<_> = (0..32)
        .map(|i| executor.submit(move |_| (Some(i * 2), 0)).unwrap())
        .collect();

    for (i, future) in futures.into_iter().enumerate() {
        let (out, error) = future.get().unwrap();
        assert_eq!(out, Some(i * 2));
        assert_eq!(error, 0);
    }
}

#[test]
fn many_producers_submit_concurrently() {
    let executor = Arc::new(Executor::new());
    let total_done = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let executor = executor.clone();
            let total_done = total_done.clone();
            std::thread::spawn(move || {
                let futures: Vec<_> = (0..16)
                    .map(|i| executor.submit(move |_| (Some(i), 0)).unwrap())
                    .collect();
                for future in futures {
                    future.get().unwrap();
                    total_done.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }

    assert_eq!(total_done.load(Ordering::SeqCst), 64);
}

#[test]
fn shutdown_rejects_further_submissions_but_lets_queued_work_finish() {
    let executor = Executor::new();

    let future = executor.submit(|_| (Some(1u32), 0)).unwrap();
    assert_eq!(future.get().unwrap(), (Some(1), 0));

    executor.shutdown().unwrap();
    assert_eq!(
        executor.submit(|_| (Some(2u32), 0)).err(),
        Some(TaskPoolError::IsBusyShuttingDown)
    );
}

#[test]
fn cancellation_is_visible_through_the_public_api() {
    let executor = Executor::new();

    let future = executor
        .submit(|is_cancelled| {
            while !is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            (Some(0u32), 0)
        })
        .unwrap();

    // Give the worker a moment to pick the task up and enter Running before
    // we race it with cancel.
    std::thread::sleep(Duration::from_millis(20));
    future.cancel().unwrap();

    assert_eq!(future.get().err(), Some(TaskPoolError::FutureIsCancelled));
    assert_eq!(future.status(), FutureStatus::Cancelled);
}

#[test]
fn panicking_task_does_not_take_down_the_pool() {
    let executor = Executor::new();

    let bad = executor.submit(|_| -> (Option<()>, u64) { panic!("deliberate") }).unwrap();
    let (out, error) = bad.get().unwrap();
    assert_eq!(out, None);
    assert_eq!(error, taskpool::TASK_PANICKED_ERROR_CODE);

    // The pool is still usable after a task panics.
    let good = executor.submit(|_| (Some(7u32), 0)).unwrap();
    assert_eq!(good.get().unwrap(), (Some(7), 0));
}

#[test]
fn default_executor_is_shared_across_callers() {
    let a = default_executor();
    let b = default_executor();

    let future = a.submit(|_| (Some(1u32), 0)).unwrap();
    assert_eq!(future.get().unwrap(), (Some(1), 0));

    // Submitted through `a`, observable (via count) as having run on the
    // same pool `b` refers to.
    assert!(b.count() >= 1);
}
