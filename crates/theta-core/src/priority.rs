//! The OS-priority syscall binding is a trait here; `theta-pool` binds it
//! to `libc::setpriority` (no stable `nix` wrapper exists for `setpriority(2)`).

use crate::error::SchedulerError;

/// Runtime priority band a task runs under. Determines both which
/// `PriorityQueue` a task is dispatched to and the OS-level nice value its
/// worker requests: throttled → +19, normal → default, prioritized → −20.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NicePriority {
    Throttled,
    Normal,
    Prioritized,
}

impl NicePriority {
    /// The nice-value equivalent this band maps to.
    pub fn nice_value(self) -> i32 {
        match self {
            NicePriority::Throttled => 19,
            NicePriority::Normal => 0,
            NicePriority::Prioritized => -20,
        }
    }
}

/// Binds a `NicePriority` to the calling thread's OS scheduling class.
/// Best-effort: a failure is reported (so the caller can log it) but never
/// prevents the task from running at its inherited priority.
pub trait PriorityBinder: Send + Sync {
    fn bind(&self, priority: NicePriority) -> Result<(), SchedulerError>;
}

/// A binder that does nothing and always succeeds. Used by default in
/// `theta-core` tests and wherever OS-level priority control is
/// unavailable or undesired.
#[derive(Debug, Default)]
pub struct NullPriorityBinder;

impl PriorityBinder for NullPriorityBinder {
    fn bind(&self, _priority: NicePriority) -> Result<(), SchedulerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nice_values_match_spec() {
        assert_eq!(NicePriority::Throttled.nice_value(), 19);
        assert_eq!(NicePriority::Normal.nice_value(), 0);
        assert_eq!(NicePriority::Prioritized.nice_value(), -20);
    }

    #[test]
    fn null_binder_always_succeeds() {
        let binder = NullPriorityBinder;
        assert!(binder.bind(NicePriority::Prioritized).is_ok());
    }
}
