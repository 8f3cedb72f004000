//! Ordered execution of a batch with short-circuit on failure.

use std::time::Duration;

use tracing::{info, instrument};

use crate::core::result::TaskResult;
use crate::core::task::TaskDefinition;
use crate::executor::boundary::run_task;

/// Run tasks strictly in order on the calling thread.
///
/// After the first error result, every remaining task is reported as skipped
/// (in original order) and never invoked.
#[instrument(skip_all, fields(tasks = tasks.len()))]
pub fn run_sequential(tasks: Vec<TaskDefinition>, task_timeout: Option<Duration>) -> Vec<TaskResult> {
    let mut results = Vec::with_capacity(tasks.len());
    let mut pending = tasks.into_iter();

    while let Some(task) = pending.next() {
        let result = run_task(task, task_timeout);
        let failed = result.is_error().then(|| result.name().to_string());
        results.push(result);

        if let Some(failed) = failed {
            let reason = format!("Skipped due to error in {failed}");
            let skipped: Vec<_> = pending
                .by_ref()
                .map(|remaining| TaskResult::skipped(remaining.name(), &reason))
                .collect();
            info!(failed = %failed, skipped = skipped.len(), "sequential batch short-circuited");
            results.extend(skipped);
            break;
        }
    }

    results
}
