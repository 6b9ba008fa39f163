//! Per-task state, transitions, and the side-effects each transition has on
//! the owning executor's counters.

use std::sync::{Arc, Mutex, Weak};

use crate::error::SchedulerError;
use crate::executor::Executor;
use crate::priority::NicePriority;

/// A task's position in its lifecycle. Initial state is `Created`, terminal
/// state is `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Created,
    QueuedExecutor,
    QueuedThrottled,
    QueuedNormal,
    QueuedPrioritized,
    RunningThrottled,
    RunningNormal,
    RunningPrioritized,
    Finished,
}

/// Per-band counter deltas applied on a transition: (waiting, running,
/// throttled, finished). `running` here really means "admitted to the
/// normal/prioritized bands" — it is incremented the moment a task is
/// queued into one of those bands, not only while it executes.
fn transition_deltas(from: TaskState, to: TaskState) -> Option<(i32, i32, i32, i32)> {
    use TaskState::*;
    match (from, to) {
        (Created, QueuedExecutor) => Some((1, 0, 0, 0)),
        (Created, QueuedPrioritized) => Some((0, 1, 0, 0)),
        (Created, QueuedThrottled) => Some((0, 0, 1, 0)),
        (Created, QueuedNormal) => Some((0, 1, 0, 0)),

        // `waiting` is not decremented when a task leaves QueuedExecutor for
        // a priority band — only the one Created -> QueuedExecutor edge
        // ever increments it.
        (QueuedExecutor, QueuedPrioritized) => Some((0, 1, 0, 0)),
        (QueuedExecutor, QueuedThrottled) => Some((0, 0, 1, 0)),
        (QueuedExecutor, QueuedNormal) => Some((0, 1, 0, 0)),

        (QueuedPrioritized, RunningPrioritized) => Some((0, 0, 0, 0)),
        (QueuedPrioritized, QueuedThrottled) => Some((0, -1, 1, 0)),

        (QueuedThrottled, QueuedPrioritized) => Some((0, 1, -1, 0)),
        (QueuedThrottled, QueuedNormal) => Some((0, 1, -1, 0)),
        (QueuedThrottled, RunningThrottled) => Some((0, 0, 0, 0)),

        (QueuedNormal, QueuedThrottled) => Some((0, -1, 1, 0)),
        (QueuedNormal, RunningNormal) => Some((0, 0, 0, 0)),

        (RunningPrioritized, RunningThrottled) => Some((0, -1, 1, 0)),
        (RunningThrottled, RunningPrioritized) => Some((0, 0, 0, 0)),
        (RunningThrottled, RunningNormal) => Some((0, 0, 0, 0)),
        (RunningNormal, RunningThrottled) => Some((0, -1, 1, 0)),

        (RunningPrioritized, Finished) => Some((0, -1, 0, 1)),
        (RunningThrottled, Finished) => Some((0, 0, -1, 1)),
        (RunningNormal, Finished) => Some((0, -1, 0, 1)),

        _ => None,
    }
}

struct TaskInner {
    state: TaskState,
    nice_priority: NicePriority,
    worker: Option<u64>,
}

/// One unit of work plus its position in the lifecycle.
///
/// The back-reference to the owning executor is a `Weak` pointer rather
/// than an owned one: the executor strictly outlives all tasks it creates,
/// so an owned cycle is never required, and `Weak` documents that
/// non-ownership directly in the type.
pub struct Task {
    func: Mutex<Option<Box<dyn FnOnce() + Send + 'static>>>,
    executor: Weak<Executor>,
    inner: Mutex<TaskInner>,
}

impl Task {
    /// Constructs a task in the `Created` state. Does not dispatch it —
    /// callers go through `ExecutorCore::submit`.
    pub fn new(
        func: Box<dyn FnOnce() + Send + 'static>,
        executor: &Arc<Executor>,
        nice_priority: NicePriority,
    ) -> Arc<Task> {
        Arc::new(Task {
            func: Mutex::new(Some(func)),
            executor: Arc::downgrade(executor),
            inner: Mutex::new(TaskInner {
                state: TaskState::Created,
                nice_priority,
                worker: None,
            }),
        })
    }

    pub fn state(&self) -> TaskState {
        self.inner.lock().unwrap().state
    }

    pub fn nice_priority(&self) -> NicePriority {
        self.inner.lock().unwrap().nice_priority
    }

    /// Sets the task's desired OS-level priority band.
    // TODO: if this task already has a worker assigned, re-bind that
    // worker's OS priority immediately rather than waiting for its next run.
    pub fn set_nice_priority(&self, priority: NicePriority) {
        self.inner.lock().unwrap().nice_priority = priority;
    }

    pub fn worker(&self) -> Option<u64> {
        self.inner.lock().unwrap().worker
    }

    pub(crate) fn set_worker(&self, worker: u64) {
        self.inner.lock().unwrap().worker = Some(worker);
    }

    pub fn executor(&self) -> Option<Arc<Executor>> {
        self.executor.upgrade()
    }

    /// Takes the task's payload, to be invoked exactly once. Returns `None`
    /// if already taken (a programming error — a task is run by exactly one
    /// worker, exactly once).
    pub(crate) fn take_func(&self) -> Option<Box<dyn FnOnce() + Send + 'static>> {
        self.func.lock().unwrap().take()
    }

    /// Applies a state transition and its side-effects on the owning
    /// executor's stats. Transitions not in the table panic in debug builds
    /// (a programming error) and, in release builds, log and are rejected
    /// without mutating state.
    pub fn transition(&self, to: TaskState) -> Result<(), SchedulerError> {
        let mut guard = self.inner.lock().unwrap();
        let from = guard.state;

        let Some((dwait, drun, dthr, dfin)) = transition_deltas(from, to) else {
            debug_assert!(
                false,
                "invalid task state transition: {from:?} -> {to:?}"
            );
            tracing::error!(?from, ?to, "invalid task state transition");
            return Err(SchedulerError::InvalidTransition { from, to });
        };

        if let Some(executor) = self.executor.upgrade() {
            let stats = executor.stats();
            if dwait != 0 {
                stats.waiting_delta(dwait);
            }
            if drun != 0 {
                stats.running_delta(drun);
            }
            if dthr != 0 {
                stats.throttled_delta(dthr);
            }
            if dfin != 0 {
                stats.finished_delta(dfin as u32);
            }
        }

        guard.state = to;
        Ok(())
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("state", &self.state()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutorConfig;
    use crate::queue::PriorityQueues;
    use std::sync::atomic::Ordering;

    fn test_executor() -> Arc<Executor> {
        Executor::new(ExecutorConfig::default(), Arc::new(PriorityQueues::new()))
    }

    #[test]
    fn valid_transition_updates_state() {
        let executor = test_executor();
        let task = Task::new(Box::new(|| {}), &executor, NicePriority::Normal);
        assert_eq!(task.state(), TaskState::Created);
        task.transition(TaskState::QueuedNormal).unwrap();
        assert_eq!(task.state(), TaskState::QueuedNormal);
        assert_eq!(executor.stats().running_num(Ordering::Acquire), 1);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let executor = test_executor();
        let task = Task::new(Box::new(|| {}), &executor, NicePriority::Normal);
        let err = task.transition(TaskState::Finished).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidTransition { .. }));
        assert_eq!(task.state(), TaskState::Created);
    }

    #[test]
    fn full_lifecycle_leaves_counters_at_zero() {
        let executor = test_executor();
        let task = Task::new(Box::new(|| {}), &executor, NicePriority::Normal);
        task.transition(TaskState::QueuedNormal).unwrap();
        task.transition(TaskState::RunningNormal).unwrap();
        task.transition(TaskState::Finished).unwrap();

        let stats = executor.stats();
        assert_eq!(stats.running_num(Ordering::Acquire), 0);
        assert_eq!(stats.throttled_num(Ordering::Acquire), 0);
        assert_eq!(stats.finished_num(Ordering::Acquire), 1);
    }

    #[test]
    fn demotion_moves_counts_between_bands() {
        let executor = test_executor();
        let task = Task::new(Box::new(|| {}), &executor, NicePriority::Prioritized);
        task.transition(TaskState::QueuedPrioritized).unwrap();
        assert_eq!(executor.stats().running_num(Ordering::Acquire), 1);

        task.transition(TaskState::QueuedThrottled).unwrap();
        assert_eq!(executor.stats().running_num(Ordering::Acquire), 0);
        assert_eq!(executor.stats().throttled_num(Ordering::Acquire), 1);
    }
}
