//! Bounded parallel execution of a batch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, mpsc};
use std::thread;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::core::result::TaskResult;
use crate::core::task::TaskDefinition;
use crate::executor::boundary::run_task;

/// Default number of concurrent workers.
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Knobs for [`run_parallel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelOptions {
    /// Upper bound on concurrent workers (capped at the batch size).
    pub max_workers: usize,
    /// Stop dispatching new tasks after the first error result.
    pub fail_fast: bool,
    /// Per-task deadline; `None` waits indefinitely.
    pub task_timeout: Option<Duration>,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            fail_fast: false,
            task_timeout: None,
        }
    }
}

impl ParallelOptions {
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Self::default()
        }
    }
}

/// Run every task on a bounded pool and return results in completion order.
///
/// Workers pull from a shared queue. Cancellation in fail-fast mode is checked
/// only before a worker starts its next task: running tasks always finish, and
/// their late results are dropped.
#[instrument(skip_all, fields(tasks = tasks.len(), max_workers = options.max_workers, fail_fast = options.fail_fast))]
pub fn run_parallel(tasks: Vec<TaskDefinition>, options: &ParallelOptions) -> Vec<TaskResult> {
    if tasks.is_empty() {
        return Vec::new();
    }
    let total = tasks.len();
    let workers = options.max_workers.clamp(1, total);
    let queue = Mutex::new(VecDeque::from(tasks));
    let cancelled = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<TaskResult>();
    let mut results = Vec::with_capacity(total);

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            let cancelled = &cancelled;
            let timeout = options.task_timeout;
            scope.spawn(move || {
                loop {
                    if cancelled.load(Ordering::SeqCst) {
                        break;
                    }
                    let next = match queue.lock() {
                        Ok(mut pending) => pending.pop_front(),
                        Err(_) => break,
                    };
                    let Some(task) = next else { break };
                    if tx.send(run_task(task, timeout)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        for result in rx.iter() {
            if result.is_error() && options.fail_fast {
                warn!(task = %result.name(), "fail-fast: cancelling pending tasks");
                cancelled.store(true, Ordering::SeqCst);
                results.push(result);
                break;
            }
            results.push(result);
        }
    });

    debug!(collected = results.len(), submitted = total, "parallel batch finished");
    results
}
