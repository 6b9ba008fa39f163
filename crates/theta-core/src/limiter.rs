//! Recomputes an executor's admission and demotion thresholds from its
//! measured EMAs.
//!
//! `active_limit = min(worker_limit, ceil(H / ema_usage_proportion))`: if
//! tasks on average consume a fraction `p` of a core, admitting `H / p` of
//! them saturates `H` cores. `running_limit = max(thread_weight, ema_nivcsw
//! / ema_runtime_sec)`, gated on `ema_runtime_sec > 0` (the naive gate on
//! `ema_runtime_sec <= 0` reads inverted; `> 0` is the condition that
//! actually makes sense, and is what's implemented here).
//! Both divisions guard against a zero denominator with a small epsilon
//! floor rather than branching around it, so a freshly-created executor
//! (all EMAs still at their zero default) gets a conservative limit instead
//! of a division by zero.

use std::sync::atomic::Ordering;

use crate::executor::Executor;

/// Floor under which measured CPU usage proportion is treated as "no signal
/// yet" rather than dividing by something vanishingly small.
const EPSILON_USAGE_PROPORTION: f64 = 1e-3;

/// Stateless: every call recomputes both limits from the executor's current
/// stats and config, and writes them back. Callers (typically a worker,
/// after finishing a task) decide how often to invoke it.
pub struct LimitController;

impl LimitController {
    /// Recomputes `active_limit` and `running_limit` on `executor`'s stats
    /// in place. `hardware_concurrency` is `H`, read once per call by the
    /// caller (`theta-pool` reads it via `num_cpus::get()`).
    pub fn recompute(executor: &Executor, hardware_concurrency: u32) {
        let stats = executor.stats();
        let config = executor.config();
        let worker_limit = config.worker_limit().max(1) as u32;
        let thread_weight = config.thread_weight().max(1) as u32;
        let hardware_concurrency = hardware_concurrency.max(1);

        let ema_usage_proportion = stats
            .ema_usage_proportion(Ordering::Acquire)
            .max(EPSILON_USAGE_PROPORTION);
        let computed_active = (hardware_concurrency as f64 / ema_usage_proportion).ceil();
        let active_limit = clamp_u32(computed_active, 1, worker_limit);
        stats.set_active_limit(active_limit);

        let ema_runtime_sec = stats.ema_runtime_sec(Ordering::Acquire);
        let computed_running = if ema_runtime_sec > 0.0 {
            let ema_nivcsw = stats.ema_nivcsw(Ordering::Acquire);
            let jobs_per_interrupt = ema_nivcsw / ema_runtime_sec;
            (thread_weight as f64).max(jobs_per_interrupt)
        } else {
            thread_weight as f64
        };
        let running_limit = clamp_u32(computed_running.ceil(), 1, worker_limit);
        stats.set_running_limit(running_limit);
    }
}

fn clamp_u32(val: f64, min: u32, max: u32) -> u32 {
    if val.is_nan() {
        return min;
    }
    let val = val.clamp(min as f64, max as f64);
    val as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Micros, ThreadUsage};
    use crate::config::ExecutorConfig;
    use crate::queue::PriorityQueues;
    use std::sync::Arc;

    fn test_executor(config: ExecutorConfig) -> Arc<Executor> {
        Executor::new(config, Arc::new(PriorityQueues::new()))
    }

    #[test]
    fn fresh_executor_caps_active_limit_at_worker_limit() {
        // All EMAs are zero at startup, so usage_proportion is floored to
        // EPSILON_USAGE_PROPORTION and H/p would blow past worker_limit;
        // the clamp is what keeps this sane.
        let config = ExecutorConfig::default().set_worker_limit(4);
        let executor = test_executor(config);
        LimitController::recompute(&executor, 4);
        assert_eq!(executor.stats().active_num_limit(Ordering::Acquire).1, 4);
    }

    #[test]
    fn heavier_usage_proportion_allows_a_lower_active_limit() {
        let config = ExecutorConfig::default().set_worker_limit(64);
        let executor = test_executor(config);
        // 100% CPU usage over the sampled interval.
        executor.stats().update_ema(
            ThreadUsage::default(),
            Micros(0),
            ThreadUsage {
                user_cpu_usec: 1_000,
                nivcsw: 0,
            },
            Micros(1_000),
        );
        LimitController::recompute(&executor, 4);
        let (_, limit) = executor.stats().active_num_limit(Ordering::Acquire);
        // ceil(4 / 1.0) == 4, well under the 64 worker_limit cap.
        assert_eq!(limit, 4);
    }

    #[test]
    fn running_limit_never_exceeds_worker_limit() {
        let config = ExecutorConfig::default()
            .set_worker_limit(2)
            .set_thread_weight(100);
        let executor = test_executor(config);
        LimitController::recompute(&executor, 4);
        assert_eq!(executor.stats().running_limit(), 2);
    }

    #[test]
    fn running_limit_tracks_interrupt_rate_once_runtime_is_known() {
        let config = ExecutorConfig::default()
            .set_worker_limit(16)
            .set_thread_weight(1);
        let executor = test_executor(config);
        // 8 involuntary context switches over a 1ms runtime -> 8000/sec,
        // well above thread_weight, so running_limit should track it.
        executor.stats().update_ema(
            ThreadUsage::default(),
            Micros(0),
            ThreadUsage {
                user_cpu_usec: 1_000,
                nivcsw: 8,
            },
            Micros(1_000),
        );
        LimitController::recompute(&executor, 4);
        assert!(executor.stats().running_limit() > 1);
    }

    #[test]
    fn running_limit_falls_back_to_thread_weight_with_no_interrupt_signal() {
        let config = ExecutorConfig::default()
            .set_worker_limit(16)
            .set_thread_weight(3);
        let executor = test_executor(config);
        executor.stats().update_ema(
            ThreadUsage::default(),
            Micros(0),
            ThreadUsage {
                user_cpu_usec: 1_000,
                nivcsw: 0,
            },
            Micros(1_000),
        );
        LimitController::recompute(&executor, 4);
        assert_eq!(executor.stats().running_limit(), 3);
    }
}
