//! The single-task boundary shared by both executors.
//!
//! Every invocation passes through [`run_task`]: it is timed with a monotonic
//! clock, errors and panics are contained and turned into error results, the
//! body's [`TaskOutput`] is adapted into a [`TaskResult`], and the task's
//! failure policy is applied.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Error, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::result::TaskResult;
use crate::core::task::{FailurePolicy, TaskBody, TaskDefinition, TaskOutput};

const EMPTY_ERROR_MESSAGE: &str = "task failed without an error message";

enum Invocation {
    Returned(Result<TaskOutput>),
    Panicked(String),
    TimedOut(Duration),
}

/// Invoke one task and convert whatever happens into a [`TaskResult`].
///
/// With a `timeout`, the body runs on its own thread; on expiry the result is
/// an error and the thread is left to finish on its own.
pub fn run_task(definition: TaskDefinition, timeout: Option<Duration>) -> TaskResult {
    let (name, policy, body) = definition.into_parts();
    let start = Instant::now();
    let invocation = match timeout {
        Some(limit) => invoke_with_timeout(&name, body, limit),
        None => invoke(body),
    };
    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let result = apply_policy(adapt(&name, invocation), policy).with_duration(duration_ms);
    match result.error_message() {
        Some(message) => warn!(task = %name, duration_ms, error = %message, "task failed"),
        None => debug!(task = %name, status = ?result.status(), duration_ms, "task finished"),
    }
    result
}

fn invoke(body: TaskBody) -> Invocation {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(returned) => Invocation::Returned(returned),
        Err(payload) => Invocation::Panicked(panic_message(payload.as_ref())),
    }
}

fn invoke_with_timeout(name: &str, body: TaskBody, limit: Duration) -> Invocation {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name(format!("task-{name}"))
        .spawn(move || {
            // Receiver is gone once the deadline passed; nothing left to report to.
            let _ = tx.send(invoke(body));
        });
    if let Err(err) = spawned {
        return Invocation::Returned(Err(Error::new(err).context("spawn task thread")));
    }
    match rx.recv_timeout(limit) {
        Ok(invocation) => invocation,
        Err(RecvTimeoutError::Timeout) => {
            warn!(task = %name, timeout = ?limit, "task exceeded its timeout");
            Invocation::TimedOut(limit)
        }
        Err(RecvTimeoutError::Disconnected) => {
            Invocation::Panicked("task thread exited without reporting".to_string())
        }
    }
}

fn adapt(name: &str, invocation: Invocation) -> TaskResult {
    match invocation {
        Invocation::Returned(Ok(TaskOutput::Result(result))) => result.with_name(name),
        Invocation::Returned(Ok(TaskOutput::Value(value))) => wrap_value(name, value),
        Invocation::Returned(Err(err)) => TaskResult::error(name, error_message(&err)),
        Invocation::Panicked(message) => {
            TaskResult::error(name, format!("task panicked: {message}"))
        }
        Invocation::TimedOut(limit) => TaskResult::error(name, format!("timed out after {limit:?}")),
    }
}

fn wrap_value(name: &str, value: Value) -> TaskResult {
    if value.is_null() {
        return TaskResult::success(name, None);
    }
    let mut data = Map::new();
    data.insert("result".to_string(), value);
    TaskResult::success(name, Some(data))
}

fn apply_policy(result: TaskResult, policy: FailurePolicy) -> TaskResult {
    if policy == FailurePolicy::Fatal || !result.is_error() {
        return result;
    }
    let mut data = Map::new();
    data.insert("degraded".to_string(), Value::Bool(true));
    data.insert(
        "error".to_string(),
        Value::String(result.error_message().unwrap_or_default().to_string()),
    );
    debug!(task = %result.name(), "non-fatal failure downgraded");
    TaskResult::success(result.name(), Some(data))
}

fn error_message(err: &Error) -> String {
    let message = format!("{err:#}");
    if message.trim().is_empty() {
        EMPTY_ERROR_MESSAGE.to_string()
    } else {
        message
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
