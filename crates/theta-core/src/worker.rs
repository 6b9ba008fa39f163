//! One worker thread's loop body: block for a task on an assigned priority
//! band, run it in isolation from the rest of the scheduler, and report the
//! timing the stats layer needs.
//!
//! Thread spawning and the thread pool itself live in `theta-pool` — this
//! only implements what one worker does once it has a thread to run on.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::clock::{Clock, ThreadUsageReader};
use crate::executor::Executor;
use crate::limiter::LimitController;
use crate::priority::{NicePriority, PriorityBinder};
use crate::task::{Task, TaskState};

/// A single worker bound to one priority band of one executor.
pub struct Worker {
    id: u64,
    band: NicePriority,
    executor: Arc<Executor>,
    clock: Arc<dyn Clock>,
    usage_reader: Arc<dyn ThreadUsageReader>,
    priority_binder: Arc<dyn PriorityBinder>,
}

impl Worker {
    pub fn new(
        id: u64,
        band: NicePriority,
        executor: Arc<Executor>,
        clock: Arc<dyn Clock>,
        usage_reader: Arc<dyn ThreadUsageReader>,
        priority_binder: Arc<dyn PriorityBinder>,
    ) -> Self {
        Self {
            id,
            band,
            executor,
            clock,
            usage_reader,
            priority_binder,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn band(&self) -> NicePriority {
        self.band
    }

    /// Runs until the worker's queue shuts down.
    pub fn run(&self) {
        while self.run_once() {}
    }

    /// Blocks for one task and runs it. Returns `false` once the queue has
    /// shut down and the caller should stop looping.
    pub fn run_once(&self) -> bool {
        let Some(task) = self.executor.queues().blocking_pop(self.band) else {
            return false;
        };
        self.run_task(task);
        true
    }

    fn running_state(&self) -> TaskState {
        match self.band {
            NicePriority::Throttled => TaskState::RunningThrottled,
            NicePriority::Normal => TaskState::RunningNormal,
            NicePriority::Prioritized => TaskState::RunningPrioritized,
        }
    }

    fn run_task(&self, task: Arc<Task>) {
        task.set_worker(self.id);
        if let Err(err) = self.priority_binder.bind(task.nice_priority()) {
            tracing::warn!(?err, worker = self.id, "failed to bind worker OS priority");
        }

        if let Err(err) = task.transition(self.running_state()) {
            tracing::error!(?err, worker = self.id, "failed to start task");
            return;
        }

        let begin_tv = self.clock.now();
        let begin_usage = self.usage_reader.read();

        if let Some(func) = task.take_func() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(func)) {
                tracing::error!(
                    worker = self.id,
                    panic = panic_message(&payload),
                    "task payload panicked"
                );
            }
        }

        let end_tv = self.clock.now();
        let end_usage = self.usage_reader.read();

        if let Err(err) = task.transition(TaskState::Finished) {
            tracing::error!(?err, worker = self.id, "failed to finish task");
            return;
        }

        self.executor
            .stats()
            .update_ema(begin_usage, begin_tv, end_usage, end_tv);
        LimitController::recompute(&self.executor, num_cpus::get() as u32);
        self.executor.refill(None);
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
