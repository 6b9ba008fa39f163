//! The two external capabilities `theta-core` consumes but does not
//! implement: a monotonic clock with microsecond resolution, and per-thread
//! resource usage (user CPU time, involuntary context switches). Both are
//! traits here; `theta-pool` supplies OS-backed implementations so the core
//! stays testable without touching the OS.

use std::time::Instant;

/// A monotonic instant expressed as microseconds since some fixed (but
/// otherwise unspecified) origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Micros(pub u64);

impl Micros {
    pub fn saturating_sub(self, other: Micros) -> Micros {
        Micros(self.0.saturating_sub(other.0))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }
}

/// A monotonic clock with microsecond resolution.
pub trait Clock: Send + Sync {
    fn now(&self) -> Micros;
}

/// `std::time::Instant`-backed clock. This is the implementation used
/// whenever `theta-core` is exercised on its own (e.g. in unit tests);
/// `theta-pool` re-exports it as the default for real pools, since
/// `Instant` already is a monotonic, microsecond-resolvable clock on every
/// supported target.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    origin: std::sync::OnceLock<Instant>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Micros {
        let origin = self.origin.get_or_init(Instant::now);
        Micros(origin.elapsed().as_micros() as u64)
    }
}

/// A snapshot of per-thread resource usage, read at task start and end.
/// Fields correspond to `struct rusage`'s `ru_utime` and `ru_nivcsw`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadUsage {
    /// User CPU time consumed by the calling thread, in microseconds.
    pub user_cpu_usec: u64,
    /// Involuntary context switches observed for the calling thread.
    pub nivcsw: u64,
}

/// Reads resource usage for the *calling* thread. Implementations must read
/// thread-local (not process-wide) usage — this is a per-thread facility.
pub trait ThreadUsageReader: Send + Sync {
    fn read(&self) -> ThreadUsage;
}

/// A reader that always reports zero usage. Useful for tests that want
/// deterministic EMA inputs without depending on real scheduling noise.
#[derive(Debug, Default)]
pub struct NullUsageReader;

impl ThreadUsageReader for NullUsageReader {
    fn read(&self) -> ThreadUsage {
        ThreadUsage::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_is_nondecreasing() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn micros_as_secs_f64() {
        assert_eq!(Micros(1_500_000).as_secs_f64(), 1.5);
    }
}
