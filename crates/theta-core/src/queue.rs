//! Three priority-sorted run queues feeding workers. Each band is a
//! mutex-guarded deque paired with a counting semaphore for blocking
//! consumers.
//!
//! The counting semaphore is an unbounded `crossbeam_channel` used purely as
//! a permit token: `push` sends one token, `try_pop`/`blocking_pop` receive
//! one before touching the deque. This mirrors the permit-channel technique
//! this corpus already uses to reimplement a C thread pool's semaphore over
//! `crossbeam_channel::bounded`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::priority::NicePriority;
use crate::task::{Task, TaskState};

/// A single priority band's run queue.
pub struct PriorityQueue {
    deque: Mutex<VecDeque<Arc<Task>>>,
    permit_tx: Sender<()>,
    permit_rx: Receiver<()>,
    closed: AtomicBool,
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityQueue {
    pub fn new() -> Self {
        let (permit_tx, permit_rx) = unbounded();
        Self {
            deque: Mutex::new(VecDeque::new()),
            permit_tx,
            permit_rx,
            closed: AtomicBool::new(false),
        }
    }

    /// Appends `task` and releases one permit.
    pub fn push(&self, task: Arc<Task>) {
        self.deque.lock().unwrap().push_back(task);
        // The receiver is held by this same struct, so `send` only fails if
        // the channel itself was dropped, which cannot happen here.
        let _ = self.permit_tx.send(());
    }

    /// Non-blocking pop. Returns `None` immediately if no permit is
    /// available (queue is empty, modulo in-flight `push`es).
    pub fn try_pop(&self) -> Option<Arc<Task>> {
        self.permit_rx.try_recv().ok()?;
        self.pop_after_permit()
    }

    /// Blocks until a permit is available, then pops. Returns `None` only
    /// once the queue has shut down.
    pub fn blocking_pop(&self) -> Option<Arc<Task>> {
        self.permit_rx.recv().ok()?;
        self.pop_after_permit()
    }

    fn pop_after_permit(&self) -> Option<Arc<Task>> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let mut dq = self.deque.lock().unwrap();
        Self::reap_finished_locked(&mut dq);
        dq.pop_front()
    }

    /// Idempotent: removes Finished entries from the front of the deque.
    /// Priority changes may demote a task after it has been placed; rather
    /// than implement O(n) removal, Finished tasks are tombstoned in place
    /// and skipped here at delivery time.
    pub fn reap_finished(&self) {
        let mut dq = self.deque.lock().unwrap();
        Self::reap_finished_locked(&mut dq);
    }

    fn reap_finished_locked(dq: &mut VecDeque<Arc<Task>>) {
        while matches!(dq.front().map(|t| t.state()), Some(TaskState::Finished)) {
            dq.pop_front();
        }
    }

    /// Sets the shutdown flag and releases `wake_count` permits (typically
    /// the number of workers blocked on this queue) so every blocked
    /// `blocking_pop` wakes and observes `None`.
    pub fn shutdown(&self, wake_count: usize) {
        self.closed.store(true, Ordering::Release);
        for _ in 0..wake_count {
            let _ = self.permit_tx.send(());
        }
    }

    pub fn len(&self) -> usize {
        self.deque.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The three priority-sorted run queues (throttled, normal, prioritized)
/// shared by every executor drawing from the same worker population.
#[derive(Default)]
pub struct PriorityQueues {
    throttled: PriorityQueue,
    normal: PriorityQueue,
    prioritized: PriorityQueue,
}

impl PriorityQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, band: NicePriority) -> &PriorityQueue {
        match band {
            NicePriority::Throttled => &self.throttled,
            NicePriority::Normal => &self.normal,
            NicePriority::Prioritized => &self.prioritized,
        }
    }

    /// Transitions `task` into the Queued* state matching `band` and pushes
    /// it onto that band's queue.
    pub fn push(&self, band: NicePriority, task: Arc<Task>) -> crate::error::Result<()> {
        let target = match band {
            NicePriority::Throttled => TaskState::QueuedThrottled,
            NicePriority::Normal => TaskState::QueuedNormal,
            NicePriority::Prioritized => TaskState::QueuedPrioritized,
        };
        task.transition(target)?;
        self.queue(band).push(task);
        Ok(())
    }

    pub fn blocking_pop(&self, band: NicePriority) -> Option<Arc<Task>> {
        self.queue(band).blocking_pop()
    }

    /// Shuts down all three bands, waking `workers_per_band[i]` blocked
    /// workers on band `i`.
    pub fn shutdown(&self, throttled_workers: usize, normal_workers: usize, prioritized_workers: usize) {
        self.throttled.shutdown(throttled_workers);
        self.normal.shutdown(normal_workers);
        self.prioritized.shutdown(prioritized_workers);
    }

    /// Scans the throttled band once (at most as many entries as were
    /// present when the scan started, so this terminates even under
    /// concurrent pushes) and promotes back to the normal band any task
    /// whose owning executor now has headroom under its `running_limit`.
    /// Called periodically by the pool's maintenance thread at
    /// `PoolConfig::throttle_interval`. Returns the number promoted.
    ///
    /// Tasks that can't yet be promoted are pushed back onto the throttled
    /// band, which rotates them to the back rather than preserving their
    /// exact position — acceptable for a periodic housekeeping pass.
    pub fn promote_throttled(&self) -> usize {
        let scan_count = self.throttled.len();
        let mut promoted = 0;
        for _ in 0..scan_count {
            let Some(task) = self.throttled.try_pop() else {
                break;
            };
            let has_headroom = task
                .executor()
                .map(|executor| {
                    let stats = executor.stats();
                    stats.running_num(Ordering::Acquire) < stats.running_limit()
                })
                .unwrap_or(false);
            if has_headroom && task.transition(TaskState::QueuedNormal).is_ok() {
                self.normal.push(task);
                promoted += 1;
            } else {
                self.throttled.push(task);
            }
        }
        promoted
    }
}
