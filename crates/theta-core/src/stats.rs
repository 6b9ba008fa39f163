//! Atomic counters plus three exponentially-weighted moving averages, and a
//! packed (active_count, active_limit) pair supporting bounded reservation.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::clock::{Micros, ThreadUsage};

#[inline]
fn pack_active(num: u32, limit: u32) -> u64 {
    ((num as u64) << 32) | (limit as u64)
}

#[inline]
fn unpack_active(line: u64) -> (u32, u32) {
    ((line >> 32) as u32, line as u32)
}

#[inline]
fn add_u32_delta(counter: &AtomicU32, delta: i32) {
    counter.fetch_add(delta as u32, Ordering::AcqRel);
}

/// Atomic stats for one executor: admission accounting, per-band
/// population counters, and the three EMAs the `LimitController` reads.
pub struct ExecutorStats {
    /// Packed `(num: u32, limit: u32)`, CAS'd as a single unit so admission
    /// always observes both halves consistently.
    active: AtomicU64,
    waiting_num: AtomicU32,
    running_num: AtomicU32,
    throttled_num: AtomicU32,
    finished_num: AtomicU32,
    /// Current "allow more running-band tasks" threshold computed by the
    /// `LimitController`. Not part of the admission word —
    /// read by `ExecutorCore`'s dispatch policy, not by `reserve_active`.
    running_limit: AtomicU32,
    ema_usage_proportion: AtomicU64,
    ema_nivcsw: AtomicU64,
    ema_runtime_sec: AtomicU64,
    tau_secs: f64,
}

impl ExecutorStats {
    pub fn new(initial_active_limit: u32, initial_running_limit: u32, tau_secs: f64) -> Self {
        Self {
            active: AtomicU64::new(pack_active(0, initial_active_limit)),
            waiting_num: AtomicU32::new(0),
            running_num: AtomicU32::new(0),
            throttled_num: AtomicU32::new(0),
            finished_num: AtomicU32::new(0),
            running_limit: AtomicU32::new(initial_running_limit),
            ema_usage_proportion: AtomicU64::new(0f64.to_bits()),
            ema_nivcsw: AtomicU64::new(0f64.to_bits()),
            ema_runtime_sec: AtomicU64::new(0f64.to_bits()),
            tau_secs,
        }
    }

    /// Speculatively reserves one admission slot. Fails (without mutating
    /// anything) if `num + 1 > limit`. Linearization point: the successful
    /// CAS.
    pub fn reserve_active(&self) -> bool {
        let mut expected = self.active.load(Ordering::Acquire);
        loop {
            let (num, limit) = unpack_active(expected);
            let desired_num = num + 1;
            if desired_num > limit {
                return false;
            }
            let desired = pack_active(desired_num, limit);
            match self.active.compare_exchange_weak(
                expected,
                desired,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => expected = actual,
            }
        }
    }

    /// Releases a reservation that found no task to pop. `num` only ever
    /// decreases here while holding its own bit range, so a plain
    /// fetch_sub on the shifted delta is safe: it cannot borrow into the
    /// `limit` half as long as callers only unreserve after a matching
    /// successful `reserve_active` (num > 0 is guaranteed).
    pub fn unreserve_active(&self) {
        self.active.fetch_sub(1u64 << 32, Ordering::AcqRel);
    }

    pub fn set_active_limit(&self, limit: u32) {
        let mut expected = self.active.load(Ordering::Relaxed);
        loop {
            let (num, _old_limit) = unpack_active(expected);
            let desired = pack_active(num, limit);
            match self.active.compare_exchange_weak(
                expected,
                desired,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => expected = actual,
            }
        }
    }

    pub fn active_num_limit(&self, order: Ordering) -> (u32, u32) {
        unpack_active(self.active.load(order))
    }

    pub fn running_limit(&self) -> u32 {
        self.running_limit.load(Ordering::Acquire)
    }

    pub fn set_running_limit(&self, limit: u32) {
        self.running_limit.store(limit, Ordering::Release);
    }

    pub fn waiting_num(&self, order: Ordering) -> u32 {
        self.waiting_num.load(order)
    }

    pub fn waiting_delta(&self, delta: i32) {
        add_u32_delta(&self.waiting_num, delta);
    }

    pub fn running_num(&self, order: Ordering) -> u32 {
        self.running_num.load(order)
    }

    pub fn running_delta(&self, delta: i32) {
        add_u32_delta(&self.running_num, delta);
    }

    pub fn throttled_num(&self, order: Ordering) -> u32 {
        self.throttled_num.load(order)
    }

    pub fn throttled_delta(&self, delta: i32) {
        add_u32_delta(&self.throttled_num, delta);
    }

    pub fn finished_num(&self, order: Ordering) -> u32 {
        self.finished_num.load(order)
    }

    /// Increments `finished_num` by `n` and decrements `active.num` by `n`.
    /// Order is fixed: finished first, then active, both release.
    pub fn finished_delta(&self, n: u32) {
        self.finished_num.fetch_add(n, Ordering::Release);
        self.active.fetch_sub((n as u64) << 32, Ordering::Release);
    }

    pub fn ema_usage_proportion(&self, order: Ordering) -> f64 {
        f64::from_bits(self.ema_usage_proportion.load(order))
    }

    pub fn ema_nivcsw(&self, order: Ordering) -> f64 {
        f64::from_bits(self.ema_nivcsw.load(order))
    }

    pub fn ema_runtime_sec(&self, order: Ordering) -> f64 {
        f64::from_bits(self.ema_runtime_sec.load(order))
    }

    pub fn tau_secs(&self) -> f64 {
        self.tau_secs
    }

    fn cas_update_ema(cell: &AtomicU64, sample: f64, alpha: f64) {
        let mut expected = cell.load(Ordering::Relaxed);
        loop {
            let old = f64::from_bits(expected);
            let desired = old + alpha * (sample - old);
            match cell.compare_exchange_weak(
                expected,
                desired.to_bits(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => expected = actual,
            }
        }
    }

    /// Updates the three EMAs from one completed task's begin/end
    /// resource-usage and clock samples.
    pub fn update_ema(
        &self,
        begin_usage: ThreadUsage,
        begin_tv: Micros,
        end_usage: ThreadUsage,
        end_tv: Micros,
    ) {
        let interval_sec = end_tv.saturating_sub(begin_tv).as_secs_f64();
        if interval_sec <= 0.0 {
            return;
        }
        let alpha = 1.0 - (-interval_sec / self.tau_secs).exp();

        let usage_sec = Micros(
            end_usage
                .user_cpu_usec
                .saturating_sub(begin_usage.user_cpu_usec),
        )
        .as_secs_f64();
        let usage_proportion = usage_sec / interval_sec;
        Self::cas_update_ema(&self.ema_usage_proportion, usage_proportion, alpha);

        let nivcsw_delta = end_usage.nivcsw.saturating_sub(begin_usage.nivcsw) as f64;
        Self::cas_update_ema(&self.ema_nivcsw, nivcsw_delta, alpha);

        Self::cas_update_ema(&self.ema_runtime_sec, interval_sec, alpha);
    }
}
