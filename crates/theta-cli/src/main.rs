use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use theta_core::{ExecutorConfig, PoolConfig};
use theta_pool::ScalingThreadPool;

/// Drives a theta scheduler with synthetic load and prints its live stats.
#[derive(Parser)]
#[command(name = "theta")]
#[command(version, about = "Synthetic load generator for the theta scheduler", long_about = None)]
struct Cli {
    /// Number of tasks to submit.
    #[arg(short = 'n', long, default_value_t = 2000)]
    tasks: usize,

    /// Maximum worker threads.
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Cores dedicated to throttled-only execution.
    #[arg(long, default_value_t = 0)]
    nice_cores: usize,

    /// Route every submitted task straight into the prioritized band.
    #[arg(long, default_value_t = false)]
    low_latency: bool,

    /// Simulated per-task work duration, in microseconds.
    #[arg(long, default_value_t = 500)]
    task_micros: u64,
}

fn main() -> Result<()> {
    theta_pool::init_logging();
    let cli = Cli::parse();

    let worker_limit = cli.workers.unwrap_or_else(theta_pool::available_parallelism);
    let pool_config = PoolConfig::default()
        .set_nice_cores(cli.nice_cores.min(worker_limit))
        .set_thread_limit(worker_limit);
    let executor_config = ExecutorConfig::default()
        .set_worker_limit(worker_limit)
        .set_require_low_latency(cli.low_latency);

    tracing::info!(
        tasks = cli.tasks,
        worker_limit,
        nice_cores = cli.nice_cores,
        low_latency = cli.low_latency,
        "starting theta scheduler demo"
    );

    let pool = ScalingThreadPool::new(pool_config, executor_config);
    let completed = Arc::new(AtomicUsize::new(0));

    for i in 0..cli.tasks {
        let completed = Arc::clone(&completed);
        let task_micros = cli.task_micros;
        loop {
            let result = pool.submit(Box::new(move || {
                std::thread::sleep(Duration::from_micros(task_micros));
                completed.fetch_add(1, Ordering::Relaxed);
            }));
            match result {
                Ok(_) => break,
                Err(theta_core::SchedulerError::Overflow) => {
                    std::thread::sleep(Duration::from_micros(200));
                }
                Err(err) => return Err(err.into()),
            }
        }
        if i % 500 == 0 {
            print_stats(&pool, i);
        }
    }

    while completed.load(Ordering::Relaxed) < cli.tasks {
        std::thread::sleep(Duration::from_millis(20));
    }
    print_stats(&pool, cli.tasks);

    pool.shutdown();
    Ok(())
}

fn print_stats(pool: &ScalingThreadPool, submitted: usize) {
    let stats = pool.executor().stats();
    let (active_num, active_limit) = stats.active_num_limit(std::sync::atomic::Ordering::Acquire);
    println!(
        "submitted={submitted} active={active_num}/{active_limit} waiting={} running={} throttled={} finished={} running_limit={} ema_usage={:.3} ema_runtime_ms={:.3}",
        stats.waiting_num(std::sync::atomic::Ordering::Acquire),
        stats.running_num(std::sync::atomic::Ordering::Acquire),
        stats.throttled_num(std::sync::atomic::Ordering::Acquire),
        stats.finished_num(std::sync::atomic::Ordering::Acquire),
        stats.running_limit(),
        stats.ema_usage_proportion(std::sync::atomic::Ordering::Acquire),
        stats.ema_runtime_sec(std::sync::atomic::Ordering::Acquire) * 1000.0,
    );
}
