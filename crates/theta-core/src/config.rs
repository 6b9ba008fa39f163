use std::time::Duration;

/// Task placement/run policy for an executor.
///
/// `Fifo` is the only policy implemented by the core; it is kept as an enum
/// (rather than a bare unit type) so `PriorityPolicy` stays an extension
/// point the pool bootstrap layer may grow further policies on top of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityPolicy {
    #[default]
    Fifo,
}

/// Pool-wide configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of cores designated for throttled-only execution.
    nice_cores: usize,
    /// Maximum worker count across the whole pool.
    thread_limit: usize,
    /// Periodicity at which throttled workers are scanned for promotion.
    throttle_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            nice_cores: 0,
            thread_limit: num_cpus::get().max(1),
            throttle_interval: Duration::from_millis(100),
        }
    }
}

impl PoolConfig {
    pub fn nice_cores(&self) -> usize {
        self.nice_cores
    }

    pub fn set_nice_cores(mut self, val: usize) -> Self {
        self.nice_cores = val;
        self
    }

    pub fn thread_limit(&self) -> usize {
        self.thread_limit
    }

    pub fn set_thread_limit(mut self, val: usize) -> Self {
        self.thread_limit = val;
        self
    }

    pub fn throttle_interval(&self) -> Duration {
        self.throttle_interval
    }

    pub fn set_throttle_interval(mut self, val: Duration) -> Self {
        self.throttle_interval = val;
        self
    }
}

/// Per-executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    priority_policy: PriorityPolicy,
    /// Lower bound on `running_limit`.
    thread_weight: usize,
    /// Upper bound on `active_limit`.
    worker_limit: usize,
    /// If true, new tasks enter the prioritized band.
    require_low_latency: bool,
    /// Capacity requested for the submission `BoundedRing` (rounded up to
    /// the next power of two by `BoundedRing::new`).
    ring_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            priority_policy: PriorityPolicy::Fifo,
            thread_weight: 1,
            worker_limit: num_cpus::get().max(1),
            require_low_latency: false,
            ring_capacity: 512,
        }
    }
}

impl ExecutorConfig {
    pub fn priority_policy(&self) -> PriorityPolicy {
        self.priority_policy
    }

    pub fn set_priority_policy(mut self, val: PriorityPolicy) -> Self {
        self.priority_policy = val;
        self
    }

    pub fn thread_weight(&self) -> usize {
        self.thread_weight
    }

    pub fn set_thread_weight(mut self, val: usize) -> Self {
        self.thread_weight = val;
        self
    }

    pub fn worker_limit(&self) -> usize {
        self.worker_limit
    }

    pub fn set_worker_limit(mut self, val: usize) -> Self {
        self.worker_limit = val;
        self
    }

    pub fn require_low_latency(&self) -> bool {
        self.require_low_latency
    }

    pub fn set_require_low_latency(mut self, val: bool) -> Self {
        self.require_low_latency = val;
        self
    }

    pub fn ring_capacity(&self) -> usize {
        self.ring_capacity
    }

    pub fn set_ring_capacity(mut self, val: usize) -> Self {
        self.ring_capacity = val;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_config_builder_roundtrip() {
        let cfg = ExecutorConfig::default()
            .set_priority_policy(PriorityPolicy::Fifo)
            .set_thread_weight(5)
            .set_worker_limit(2)
            .set_require_low_latency(true);

        assert_eq!(cfg.priority_policy(), PriorityPolicy::Fifo);
        assert_eq!(cfg.thread_weight(), 5);
        assert_eq!(cfg.worker_limit(), 2);
        assert!(cfg.require_low_latency());
    }
}
