//! `theta_core::PriorityBinder` bound to the calling thread's OS nice value.

use theta_core::{NicePriority, PriorityBinder, SchedulerError};

/// Binds the calling thread's nice value via `setpriority(2)`. On Linux,
/// `PRIO_PROCESS` with the kernel thread id as `who` sets the priority of
/// just the calling thread rather than the whole process, since each thread
/// is its own schedulable entity at the kernel level.
#[derive(Debug, Default)]
pub struct OsPriorityBinder;

impl PriorityBinder for OsPriorityBinder {
    fn bind(&self, priority: NicePriority) -> Result<(), SchedulerError> {
        let tid = unsafe { libc::syscall(libc::SYS_gettid) } as libc::id_t;
        let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, tid, priority.nice_value()) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            return Err(SchedulerError::PrioritySetFailed(err.to_string()));
        }
        Ok(())
    }
}
