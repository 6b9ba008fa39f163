//! OS-facing collaborators for `theta-core`: real worker threads, real
//! thread-priority and CPU-usage bindings, and process logging setup. None
//! of the scheduling algorithm lives here — only the bootstrap around it.

mod fifo;
mod logging;
mod os_priority;
mod os_usage;
mod pool;

pub use fifo::FifoExecutor;
pub use logging::init as init_logging;
pub use os_priority::OsPriorityBinder;
pub use os_usage::OsThreadUsageReader;
pub use pool::{available_parallelism, ScalingThreadPool};
