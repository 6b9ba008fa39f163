//! Core of an adaptive, priority-aware in-process task scheduler.
//!
//! This crate implements the algorithm: a bounded submission ring per
//! executor, three priority-banded run queues shared across an executor's
//! workers, a task lifecycle state machine, EMA-backed stats, and the
//! admission/demotion policy that reads them. It does not spawn OS threads,
//! read real CPU usage, or bind real scheduling priorities — those
//! collaborators are expressed here as traits (`Clock`, `ThreadUsageReader`,
//! `PriorityBinder`) and implemented against the OS by `theta-pool`.

pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod limiter;
pub mod priority;
pub mod queue;
pub mod ring;
pub mod stats;
pub mod task;
pub mod worker;

pub use clock::{Clock, Micros, MonotonicClock, NullUsageReader, ThreadUsage, ThreadUsageReader};
pub use config::{ExecutorConfig, PoolConfig, PriorityPolicy};
pub use error::{Result, SchedulerError};
pub use executor::Executor;
pub use limiter::LimitController;
pub use priority::{NicePriority, NullPriorityBinder, PriorityBinder};
pub use queue::{PriorityQueue, PriorityQueues};
pub use ring::BoundedRing;
pub use stats::ExecutorStats;
pub use task::{Task, TaskState};
pub use worker::Worker;
