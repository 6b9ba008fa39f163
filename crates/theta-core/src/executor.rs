//! The executor: owns one submission ring, one set of stats, and a handle to
//! the priority queues its workers drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ExecutorConfig;
use crate::error::{Result, SchedulerError};
use crate::priority::NicePriority;
use crate::queue::PriorityQueues;
use crate::ring::BoundedRing;
use crate::stats::ExecutorStats;
use crate::task::{Task, TaskState};

/// Time constant for the three EMAs an executor's stats track. Chosen to
/// weight roughly the last ten seconds of activity; `theta-pool`'s
/// `LimitController` is the only consumer sensitive to its exact value and
/// may override it via `ExecutorConfig` in a future policy.
const DEFAULT_EMA_TAU_SECS: f64 = 5.0;

/// Owns the submission ring and per-executor stats; delegates actual task
/// storage and wakeup to the shared `PriorityQueues`.
pub struct Executor {
    config: ExecutorConfig,
    ring: BoundedRing<Arc<Task>>,
    stats: ExecutorStats,
    queues: Arc<PriorityQueues>,
    shutting_down: AtomicBool,
}

impl Executor {
    pub fn new(config: ExecutorConfig, queues: Arc<PriorityQueues>) -> Arc<Executor> {
        let ring = BoundedRing::new(config.ring_capacity());
        let worker_limit = (config.worker_limit().max(1)) as u32;
        let initial_running_limit = (config.thread_weight().max(1) as u32).min(worker_limit);
        let stats = ExecutorStats::new(worker_limit, initial_running_limit, DEFAULT_EMA_TAU_SECS);
        Arc::new(Executor {
            config,
            ring,
            stats,
            queues,
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn stats(&self) -> &ExecutorStats {
        &self.stats
    }

    pub fn queues(&self) -> &Arc<PriorityQueues> {
        &self.queues
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    pub fn ring_len(&self) -> usize {
        self.ring.size()
    }

    /// Admits `func` as a new task and places it on the submission ring.
    /// This is the ring's whole reason for existing: it is sized
    /// independently of `active_limit` (by default far larger, see
    /// `ExecutorConfig::ring_capacity`) so it can absorb a burst of
    /// submissions while the adaptive concurrency cap lags behind. `submit`
    /// therefore only fails when the ring itself is full — admission against
    /// `active_limit` happens later, in `refill`, as tasks are actually
    /// popped off the ring.
    pub fn submit(
        self: &Arc<Self>,
        func: Box<dyn FnOnce() + Send + 'static>,
    ) -> Result<Arc<Task>> {
        if self.is_shutting_down() {
            return Err(SchedulerError::ShutdownInProgress);
        }

        let priority = if self.config.require_low_latency() {
            NicePriority::Prioritized
        } else {
            NicePriority::Normal
        };
        let task = Task::new(func, self, priority);

        if self.ring.push(Box::new(Arc::clone(&task))).is_err() {
            return Err(SchedulerError::Overflow);
        }

        task.transition(TaskState::QueuedExecutor)?;

        Ok(task)
    }

    /// Decides which priority band a task leaving the ring should enter.
    /// `require_low_latency` always wins; otherwise a task is admitted to
    /// `Normal` while `running_num` is under `running_limit`, and demoted to
    /// `Throttled` once that limit is reached, per the demotion policy
    /// driven by the `LimitController`-maintained `running_limit`.
    fn dispatch_band(&self) -> NicePriority {
        if self.config.require_low_latency() {
            return NicePriority::Prioritized;
        }
        let running = self.stats.running_num(Ordering::Acquire);
        let limit = self.stats.running_limit();
        if running >= limit {
            NicePriority::Throttled
        } else {
            NicePriority::Normal
        }
    }

    fn queued_state_for(band: NicePriority) -> TaskState {
        match band {
            NicePriority::Throttled => TaskState::QueuedThrottled,
            NicePriority::Normal => TaskState::QueuedNormal,
            NicePriority::Prioritized => TaskState::QueuedPrioritized,
        }
    }

    /// The admission-gated heart of the executor: while `reserve_active()`
    /// succeeds (i.e. `active.num` has not yet caught up with
    /// `active.limit`), pops one task off the submission ring and assigns it
    /// a priority band. If the ring has nothing to give, the speculative
    /// reservation is released and `refill` returns — the ring, not
    /// `active_limit`, is what determines whether a burst of submissions is
    /// accepted at all; `active_limit` only gates how many of those already
    /// ring-buffered tasks get promoted into a band at once. If `take_first`
    /// is given, the first dispatched task is written there instead of being
    /// pushed to its queue — letting an idle worker about to call
    /// `blocking_pop` anyway take that task directly, skipping a push/pop
    /// round trip through the queue's permit channel.
    pub fn refill(&self, take_first: Option<&mut Option<Arc<Task>>>) {
        let mut take_first = take_first;
        while self.stats.reserve_active() {
            let Some(task) = self.ring.pop() else {
                self.stats.unreserve_active();
                return;
            };
            let band = self.dispatch_band();
            if let Err(err) = task.transition(Self::queued_state_for(band)) {
                tracing::error!(?err, "failed to move task out of submission ring");
                self.stats.unreserve_active();
                continue;
            }
            match take_first.take() {
                Some(slot) => *slot = Some(task),
                None => self.queues.queue(band).push(task),
            }
        }
    }

    /// Marks the executor as shutting down, drains any tasks still sitting
    /// in the submission ring (they never reached a priority band, so the
    /// state machine has no path to run or cancel them — they're simply
    /// dropped unrun), and wakes every worker blocked on one of its three
    /// bands (`workers_per_band` is `(throttled, normal, prioritized)`
    /// worker counts).
    pub fn shutdown(&self, workers_per_band: (usize, usize, usize)) {
        self.shutting_down.store(true, Ordering::Release);
        for _ in self.ring.flusher() {}
        let (throttled, normal, prioritized) = workers_per_band;
        self.queues.shutdown(throttled, normal, prioritized);
    }
}
