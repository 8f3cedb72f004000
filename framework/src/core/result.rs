//! Structured outcomes for single tasks and whole protocol runs.
//!
//! Both records are built once through their constructors and are read-only
//! afterwards. The constructors are the only place the mutual-exclusion rules
//! live: an error result never carries data, and a protocol result carries
//! either a user prompt or a summary, never both.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Execution status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Error,
    Skipped,
}

/// Aggregated status of a protocol run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolStatus {
    Success,
    Error,
    UserInputRequired,
}

/// Outcome of one task invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskResult {
    name: String,
    status: TaskStatus,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TaskResult {
    pub fn success(name: impl Into<String>, data: Option<Map<String, Value>>) -> Self {
        Self {
            name: name.into(),
            status: TaskStatus::Success,
            duration_ms: 0,
            data,
            error: None,
        }
    }

    /// Success result from a JSON object literal; non-object values are wrapped
    /// under `result`.
    pub fn success_with(name: impl Into<String>, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => return Self::success(name, None),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                map
            }
        };
        Self::success(name, Some(data))
    }

    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: TaskStatus::Error,
            duration_ms: 0,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Skipped result; a non-empty reason is recorded as `data.reason`.
    pub fn skipped(name: impl Into<String>, reason: &str) -> Self {
        let data = (!reason.is_empty()).then(|| {
            let mut map = Map::new();
            map.insert("reason".to_string(), Value::String(reason.to_string()));
            map
        });
        Self {
            name: name.into(),
            status: TaskStatus::Skipped,
            duration_ms: 0,
            data,
            error: None,
        }
    }

    /// Same result with the measured duration.
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Same result re-labelled with `name`.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.status == TaskStatus::Error
    }

    /// Look up a top-level data field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }
}

/// Aggregated outcome of a protocol run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolResult {
    protocol: String,
    status: ProtocolStatus,
    tasks: Vec<TaskResult>,
    total_duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
}

impl ProtocolResult {
    pub fn success(
        protocol: impl Into<String>,
        tasks: Vec<TaskResult>,
        summary: impl Into<String>,
    ) -> Self {
        Self::build(protocol, ProtocolStatus::Success, tasks, None, Some(summary.into()))
    }

    pub fn error(
        protocol: impl Into<String>,
        tasks: Vec<TaskResult>,
        summary: impl Into<String>,
    ) -> Self {
        Self::build(protocol, ProtocolStatus::Error, tasks, None, Some(summary.into()))
    }

    pub fn user_input_required(
        protocol: impl Into<String>,
        tasks: Vec<TaskResult>,
        prompt: impl Into<String>,
    ) -> Self {
        Self::build(
            protocol,
            ProtocolStatus::UserInputRequired,
            tasks,
            Some(prompt.into()),
            None,
        )
    }

    fn build(
        protocol: impl Into<String>,
        status: ProtocolStatus,
        tasks: Vec<TaskResult>,
        user_prompt: Option<String>,
        summary: Option<String>,
    ) -> Self {
        // Sum of work, not wall-clock: parallel tasks overlap.
        let total_duration_ms = tasks.iter().map(TaskResult::duration_ms).sum();
        Self {
            protocol: protocol.into(),
            status,
            tasks,
            total_duration_ms,
            user_prompt,
            summary,
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn status(&self) -> ProtocolStatus {
        self.status
    }

    pub fn tasks(&self) -> &[TaskResult] {
        &self.tasks
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn user_prompt(&self) -> Option<&str> {
        self.user_prompt.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn success_count(&self) -> usize {
        self.count(TaskStatus::Success)
    }

    pub fn error_count(&self) -> usize {
        self.count(TaskStatus::Error)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(TaskStatus::Skipped)
    }

    pub fn errors(&self) -> impl Iterator<Item = &TaskResult> {
        self.tasks.iter().filter(|task| task.is_error())
    }

    pub fn task(&self, name: &str) -> Option<&TaskResult> {
        self.tasks.iter().find(|task| task.name == name)
    }

    /// Serialize to JSON, pretty-printed when requested.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let out = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        out.context("serialize protocol result")
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|task| task.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_result_carries_message_and_no_data() {
        let result = TaskResult::error("commit", "no hash returned");
        assert_eq!(result.status(), TaskStatus::Error);
        assert_eq!(result.error_message(), Some("no hash returned"));
        assert!(result.data().is_none());
    }

    #[test]
    fn skipped_records_reason_only_when_given() {
        let with_reason = TaskResult::skipped("commit", "No changes to commit");
        assert_eq!(
            with_reason.field("reason"),
            Some(&json!("No changes to commit"))
        );
        assert!(TaskResult::skipped("commit", "").data().is_none());
    }

    #[test]
    fn success_with_wraps_scalars_under_result() {
        let result = TaskResult::success_with("sample", json!(42));
        assert_eq!(result.field("result"), Some(&json!(42)));
        assert!(TaskResult::success_with("sample", Value::Null).data().is_none());
    }

    #[test]
    fn total_duration_is_sum_of_task_durations() {
        let tasks = vec![
            TaskResult::success("a", None).with_duration(12),
            TaskResult::error("b", "boom").with_duration(30),
            TaskResult::skipped("c", "upstream"),
        ];
        let result = ProtocolResult::error("completion", tasks, "failed");
        assert_eq!(result.total_duration_ms(), 42);
        assert_eq!(result.success_count(), 1);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.skipped_count(), 1);
    }

    #[test]
    fn user_input_required_has_prompt_and_no_summary() {
        let result = ProtocolResult::user_input_required("cold-start", Vec::new(), "choose");
        assert_eq!(result.user_prompt(), Some("choose"));
        assert!(result.summary().is_none());
    }

    /// Serialized field names and omission of absent optionals are a public
    /// contract consumed by callers of the CLI.
    #[test]
    fn serializes_with_stable_field_names() {
        let tasks = vec![
            TaskResult::success_with("config_init", json!({"action": "loaded"})).with_duration(3),
            TaskResult::error("commit", "failed").with_duration(1),
        ];
        let result = ProtocolResult::error("completion", tasks, "Completion failed");
        let value: Value = serde_json::from_str(&result.to_json(false).expect("json"))
            .expect("parse");
        assert_eq!(
            value,
            json!({
                "protocol": "completion",
                "status": "error",
                "tasks": [
                    {"name": "config_init", "status": "success", "duration_ms": 3, "data": {"action": "loaded"}},
                    {"name": "commit", "status": "error", "duration_ms": 1, "error": "failed"}
                ],
                "total_duration_ms": 4,
                "summary": "Completion failed"
            })
        );
    }

    #[test]
    fn user_input_required_serializes_snake_case_status() {
        let result = ProtocolResult::user_input_required("cold-start", Vec::new(), "p");
        let json = result.to_json(false).expect("json");
        assert!(json.contains("\"status\":\"user_input_required\""));
        assert!(!json.contains("summary"));
    }
}
