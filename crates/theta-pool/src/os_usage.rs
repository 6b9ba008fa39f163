//! `theta_core::ThreadUsageReader` backed by `getrusage(2)`.

use theta_core::{ThreadUsage, ThreadUsageReader};

/// Reads the calling thread's own CPU time and involuntary context switches
/// via `RUSAGE_THREAD`. Linux-specific: `RUSAGE_THREAD` is not POSIX.
#[derive(Debug, Default)]
pub struct OsThreadUsageReader;

impl ThreadUsageReader for OsThreadUsageReader {
    fn read(&self) -> ThreadUsage {
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::getrusage(libc::RUSAGE_THREAD, &mut usage) };
        if rc != 0 {
            tracing::warn!(
                err = %std::io::Error::last_os_error(),
                "getrusage(RUSAGE_THREAD) failed, reporting zero usage"
            );
            return ThreadUsage::default();
        }
        let user_cpu_usec =
            (usage.ru_utime.tv_sec as u64) * 1_000_000 + usage.ru_utime.tv_usec as u64;
        ThreadUsage {
            user_cpu_usec,
            nivcsw: usage.ru_nivcsw as u64,
        }
    }
}
