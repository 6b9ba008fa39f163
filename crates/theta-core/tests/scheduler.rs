//! End-to-end scenarios exercising submit -> refill -> worker -> finish
//! across real threads, without any OS-backed collaborator (clock, usage,
//! priority binding are all the null/testing implementations theta-core
//! ships itself).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use theta_core::{
    clock::{MonotonicClock, NullUsageReader},
    priority::NullPriorityBinder,
    ExecutorConfig, NicePriority, PriorityQueues, SchedulerError, TaskState, Worker,
};

fn spawn_worker(
    id: u64,
    band: NicePriority,
    executor: &Arc<theta_core::Executor>,
) -> thread::JoinHandle<()> {
    let worker = Worker::new(
        id,
        band,
        Arc::clone(executor),
        Arc::new(MonotonicClock::new()),
        Arc::new(NullUsageReader),
        Arc::new(NullPriorityBinder),
    );
    thread::spawn(move || worker.run())
}

#[test]
fn single_submission_runs_to_completion() {
    let executor = theta_core::Executor::new(
        ExecutorConfig::default().set_worker_limit(1),
        Arc::new(PriorityQueues::new()),
    );
    let handle = spawn_worker(0, NicePriority::Normal, &executor);

    let ran = Arc::new(AtomicUsize::new(0));
    let ran2 = Arc::clone(&ran);
    let task = executor
        .submit(Box::new(move || {
            ran2.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    executor.refill(None);

    for _ in 0..200 {
        if task.state() == TaskState::Finished {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(task.state(), TaskState::Finished);
    assert_eq!(ran.load(Ordering::SeqCst), 1);

    executor.shutdown((0, 1, 0));
    handle.join().unwrap();
}

#[test]
fn submission_ring_enforces_backpressure() {
    // spec.md §8 scenario 2: backpressure comes from the ring filling up,
    // not from `active_limit` — a deliberately tiny `worker_limit` (1) is
    // used here specifically to demonstrate that `submit` keeps accepting
    // work past it, right up until the ring itself is full.
    let executor = theta_core::Executor::new(
        ExecutorConfig::default().set_ring_capacity(2).set_worker_limit(1),
        Arc::new(PriorityQueues::new()),
    );

    // No workers: submitted tasks stay on the ring, so pushing past its
    // rounded-up capacity (the next power of two >= 2, minus one sentinel)
    // must eventually fail with Overflow.
    let mut accepted = 0;
    loop {
        match executor.submit(Box::new(|| {})) {
            Ok(_) => accepted += 1,
            Err(SchedulerError::Overflow) => break,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
        if accepted > 10_000 {
            panic!("ring never reported overflow");
        }
    }
    // Accepted strictly more than `worker_limit` (1): the ring, sized
    // independently of the adaptive concurrency cap, is what gated this.
    assert!(accepted > 1);
    assert_eq!(accepted, executor.ring_len());
}

#[test]
fn fifo_order_is_preserved_within_a_band() {
    let executor = theta_core::Executor::new(
        ExecutorConfig::default().set_worker_limit(1),
        Arc::new(PriorityQueues::new()),
    );

    let order = Arc::new(Mutex::new(Vec::new()));
    for i in 0..20 {
        let order = Arc::clone(&order);
        executor
            .submit(Box::new(move || {
                order.lock().unwrap().push(i);
            }))
            .unwrap();
    }
    executor.refill(None);

    let handle = spawn_worker(0, NicePriority::Normal, &executor);
    for _ in 0..200 {
        if order.lock().unwrap().len() == 20 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    executor.shutdown((0, 1, 0));
    handle.join().unwrap();

    let got = order.lock().unwrap().clone();
    assert_eq!(got, (0..20).collect::<Vec<_>>());
}

#[test]
fn tasks_demote_to_throttled_once_running_limit_is_saturated() {
    let executor = theta_core::Executor::new(
        ExecutorConfig::default().set_worker_limit(4).set_thread_weight(1),
        Arc::new(PriorityQueues::new()),
    );

    // No workers are running yet, so every submitted task is dispatched
    // purely against the static running_limit computed from thread_weight.
    let first = executor.submit(Box::new(|| {})).unwrap();
    let second = executor.submit(Box::new(|| {})).unwrap();
    executor.refill(None);

    assert_eq!(first.state(), TaskState::QueuedNormal);
    assert_eq!(second.state(), TaskState::QueuedThrottled);
}

#[test]
fn shutdown_wakes_blocked_workers_without_running_remaining_tasks() {
    let executor = theta_core::Executor::new(
        ExecutorConfig::default().set_worker_limit(1),
        Arc::new(PriorityQueues::new()),
    );
    let handle = spawn_worker(0, NicePriority::Normal, &executor);

    // Give the worker a moment to block on an empty queue before shutdown.
    thread::sleep(Duration::from_millis(20));
    executor.shutdown((0, 1, 0));

    handle.join().unwrap();
    assert!(executor.is_shutting_down());
}

#[test]
fn ema_runtime_tracks_actual_task_duration() {
    let executor = theta_core::Executor::new(
        ExecutorConfig::default().set_worker_limit(1),
        Arc::new(PriorityQueues::new()),
    );
    let handle = spawn_worker(0, NicePriority::Normal, &executor);

    for _ in 0..50 {
        executor
            .submit(Box::new(|| {
                thread::sleep(Duration::from_millis(2));
            }))
            .unwrap();
        executor.refill(None);
    }

    for _ in 0..500 {
        if executor.stats().finished_num(Ordering::Acquire) >= 50 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    let ema_runtime = executor.stats().ema_runtime_sec(Ordering::Acquire);
    assert!(ema_runtime > 0.0, "ema_runtime_sec should have picked up a signal");

    executor.shutdown((0, 1, 0));
    handle.join().unwrap();
}
