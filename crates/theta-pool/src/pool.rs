//! Bootstraps real OS threads around one `theta_core::Executor`: spawns its
//! workers, runs a background thread that periodically recomputes its
//! admission/demotion limits, and owns clean shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use theta_core::{
    Clock, Executor, ExecutorConfig, LimitController, MonotonicClock, NicePriority, PoolConfig,
    PriorityBinder, PriorityQueues, Result, Task, ThreadUsageReader, Worker,
};

use crate::os_priority::OsPriorityBinder;
use crate::os_usage::OsThreadUsageReader;

/// Number of available CPUs as seen by this thread's affinity mask, falling
/// back to `num_cpus` if affinity cannot be queried (e.g. non-Linux, or a
/// sandboxed environment that denies `sched_getaffinity`).
pub fn available_parallelism() -> usize {
    #[cfg(target_os = "linux")]
    {
        use nix::sched::{sched_getaffinity, CpuSet};
        use nix::unistd::Pid;
        if let Ok(set) = sched_getaffinity(Pid::from_raw(0)) {
            let count = (0..CpuSet::count()).filter(|&i| set.is_set(i).unwrap_or(false)).count();
            if count > 0 {
                return count;
            }
        }
    }
    num_cpus::get().max(1)
}

/// One executor plus the real OS threads driving it.
pub struct ScalingThreadPool {
    executor: Arc<Executor>,
    pool_config: PoolConfig,
    workers: Mutex<Vec<JoinHandle<()>>>,
    maintenance: Mutex<Option<JoinHandle<()>>>,
    shutting_down: Arc<AtomicBool>,
    band_worker_counts: (usize, usize, usize),
}

impl ScalingThreadPool {
    /// Builds the executor, spawns its worker threads, and starts the
    /// maintenance thread that keeps `active_limit`/`running_limit` current.
    ///
    /// `pool_config.thread_limit()` ("maximum worker count", spec §6) caps
    /// `executor_config.worker_limit()` before anything else derives from
    /// it — both the number of OS threads spawned below and the
    /// `ExecutorStats::active` limit the executor itself enforces, so a
    /// pool-wide thread cap can never be bypassed by a looser per-executor
    /// `worker_limit`.
    ///
    /// Workers are split across bands: the first `pool_config.nice_cores()`
    /// are dedicated to the throttled band; of the remainder, one in four
    /// (at least one, if any remain) services the prioritized band so
    /// `require_low_latency` executors always have a worker able to drain
    /// it, and the rest service the normal band.
    pub fn new(pool_config: PoolConfig, executor_config: ExecutorConfig) -> Arc<Self> {
        let thread_limit = pool_config.thread_limit().max(1);
        let worker_limit = executor_config.worker_limit().max(1).min(thread_limit);
        let executor_config = executor_config.set_worker_limit(worker_limit);

        let queues = Arc::new(PriorityQueues::new());
        let executor = Executor::new(executor_config.clone(), Arc::clone(&queues));

        let throttled_count = pool_config.nice_cores().min(worker_limit);
        let remaining = worker_limit - throttled_count;
        let prioritized_count = if remaining > 0 { (remaining / 4).max(1) } else { 0 };
        let normal_count = remaining - prioritized_count;

        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let usage_reader: Arc<dyn ThreadUsageReader> = Arc::new(OsThreadUsageReader);
        let priority_binder: Arc<dyn PriorityBinder> = Arc::new(OsPriorityBinder);

        let assignments = std::iter::repeat(NicePriority::Throttled)
            .take(throttled_count)
            .chain(std::iter::repeat(NicePriority::Normal).take(normal_count))
            .chain(std::iter::repeat(NicePriority::Prioritized).take(prioritized_count));

        let workers = assignments
            .enumerate()
            .map(|(id, band)| {
                let worker = Worker::new(
                    id as u64,
                    band,
                    Arc::clone(&executor),
                    Arc::clone(&clock),
                    Arc::clone(&usage_reader),
                    Arc::clone(&priority_binder),
                );
                thread::Builder::new()
                    .name(format!("theta-worker-{id}"))
                    .spawn(move || worker.run())
                    .expect("failed to spawn worker thread")
            })
            .collect();

        let shutting_down = Arc::new(AtomicBool::new(false));
        let maintenance = {
            let executor = Arc::clone(&executor);
            let shutting_down = Arc::clone(&shutting_down);
            let interval = pool_config.throttle_interval();
            thread::Builder::new()
                .name("theta-maintenance".to_string())
                .spawn(move || {
                    let hardware_concurrency = available_parallelism().max(1) as u32;
                    while !shutting_down.load(Ordering::Acquire) {
                        thread::sleep(interval);
                        LimitController::recompute(&executor, hardware_concurrency);
                        executor.queues().promote_throttled();
                    }
                })
                .expect("failed to spawn maintenance thread")
        };

        Arc::new(Self {
            executor,
            pool_config,
            workers: Mutex::new(workers),
            maintenance: Mutex::new(Some(maintenance)),
            shutting_down,
            band_worker_counts: (throttled_count, normal_count, prioritized_count),
        })
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn pool_config(&self) -> &PoolConfig {
        &self.pool_config
    }

    /// Submits `func` and immediately drains the submission ring so it
    /// reaches a priority band without waiting for another submitter to
    /// trigger a refill.
    pub fn submit(&self, func: Box<dyn FnOnce() + Send + 'static>) -> Result<Arc<Task>> {
        let task = self.executor.submit(func)?;
        self.executor.refill(None);
        Ok(task)
    }

    /// Signals shutdown, wakes every worker, and joins all threads. Blocks
    /// until every in-flight task has finished.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        self.executor.shutdown(self.band_worker_counts);

        for handle in self.workers.lock().unwrap().drain(..) {
            let _ = handle.join();
        }
        if let Some(handle) = self.maintenance.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ScalingThreadPool {
    fn drop(&mut self) {
        if !self.shutting_down.load(Ordering::Acquire) {
            self.shutdown();
        }
    }
}
