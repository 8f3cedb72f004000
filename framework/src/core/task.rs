//! Task definitions submitted to the executors.
//!
//! A definition pairs a batch-unique name with a body whose arguments are
//! captured when the closure is built. Bodies report through [`TaskOutput`], a
//! tagged union resolved once at the task boundary: either a plain JSON value
//! (wrapped into a success result) or a fully built [`TaskResult`].

use std::fmt;

use anyhow::Result;
use serde_json::Value;

use crate::core::result::TaskResult;

/// What a task body hands back on the success path.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    /// Domain value; becomes `data = {"result": value}` (or no data for null).
    Value(Value),
    /// Pre-built result; the executor only stamps the measured duration.
    Result(TaskResult),
}

impl TaskOutput {
    /// Output with no payload.
    pub fn none() -> Self {
        Self::Value(Value::Null)
    }
}

impl From<TaskResult> for TaskOutput {
    fn from(result: TaskResult) -> Self {
        Self::Result(result)
    }
}

impl From<Value> for TaskOutput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// How a failing body is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Failure yields an error result and counts against the protocol.
    #[default]
    Fatal,
    /// Failure is downgraded to a success carrying the error as diagnostics.
    NonFatal,
}

pub type TaskBody = Box<dyn FnOnce() -> Result<TaskOutput> + Send + 'static>;

/// A named unit of work. Consumed once by an executor.
pub struct TaskDefinition {
    name: String,
    policy: FailurePolicy,
    body: TaskBody,
}

impl TaskDefinition {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce() -> Result<TaskOutput> + Send + 'static,
    {
        Self {
            name: name.into(),
            policy: FailurePolicy::Fatal,
            body: Box::new(body),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Split into the parts the task boundary needs.
    pub fn into_parts(self) -> (String, FailurePolicy, TaskBody) {
        (self.name, self.policy, self.body)
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
