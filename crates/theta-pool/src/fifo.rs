//! A trivial single-band executor for callers who don't need priority
//! banding at all: every task runs in submission order across a fixed pool
//! of workers, all bound to the normal band.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use theta_core::{
    Clock, Executor, ExecutorConfig, MonotonicClock, NicePriority, PriorityBinder, PriorityQueues,
    Result, Task, ThreadUsageReader, Worker,
};

use crate::os_priority::OsPriorityBinder;
use crate::os_usage::OsThreadUsageReader;
use crate::pool::available_parallelism;

/// Single-band wrapper over `theta_core::Executor`. Skips `theta-pool`'s
/// throttled/prioritized worker split and the maintenance thread entirely —
/// `active_limit`/`running_limit` simply stay at their initial values, which
/// is fine since there is only one band for them to gate.
pub struct FifoExecutor {
    executor: Arc<Executor>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutting_down: AtomicBool,
    worker_count: usize,
}

impl FifoExecutor {
    pub fn new(worker_count: usize) -> Arc<Self> {
        let worker_count = worker_count.max(1);
        let executor_config = ExecutorConfig::default().set_worker_limit(worker_count);
        let executor = Executor::new(executor_config, Arc::new(PriorityQueues::new()));

        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let usage_reader: Arc<dyn ThreadUsageReader> = Arc::new(OsThreadUsageReader);
        let priority_binder: Arc<dyn PriorityBinder> = Arc::new(OsPriorityBinder);

        let workers = (0..worker_count)
            .map(|id| {
                let worker = Worker::new(
                    id as u64,
                    NicePriority::Normal,
                    Arc::clone(&executor),
                    Arc::clone(&clock),
                    Arc::clone(&usage_reader),
                    Arc::clone(&priority_binder),
                );
                thread::Builder::new()
                    .name(format!("theta-fifo-{id}"))
                    .spawn(move || worker.run())
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Arc::new(Self {
            executor,
            workers: Mutex::new(workers),
            shutting_down: AtomicBool::new(false),
            worker_count,
        })
    }

    /// Sizes the pool to the host's available parallelism.
    pub fn with_default_parallelism() -> Arc<Self> {
        Self::new(available_parallelism())
    }

    pub fn submit(&self, func: Box<dyn FnOnce() + Send + 'static>) -> Result<Arc<Task>> {
        let task = self.executor.submit(func)?;
        self.executor.refill(None);
        Ok(task)
    }

    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        self.executor.shutdown((0, self.worker_count, 0));
        for handle in self.workers.lock().unwrap().drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for FifoExecutor {
    fn drop(&mut self) {
        if !self.shutting_down.load(Ordering::Acquire) {
            self.shutdown();
        }
    }
}
