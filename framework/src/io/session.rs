//! Session bookkeeping in `.claude/.last_session`, used for crash detection.
//!
//! A session is written as `active` at startup and `completed` by the
//! completion protocol. Finding it still `active` at the next startup means the
//! previous session never finished.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_COMPLETED: &str = "completed";

/// Persisted session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub status: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl SessionState {
    pub fn new(status: &str, task: &str, metadata: Option<Map<String, Value>>) -> Self {
        Self {
            status: status.to_string(),
            task: task.to_string(),
            timestamp: now_timestamp(),
            pid: Some(std::process::id()),
            metadata,
        }
    }

    /// A session left `active` was never closed.
    pub fn is_crashed(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    /// Crash details in the shape the startup protocol reads.
    pub fn crash_info(&self) -> Value {
        let or_unknown = |value: &str, fallback: &str| {
            if value.is_empty() {
                fallback.to_string()
            } else {
                value.to_string()
            }
        };
        json!({
            "task": or_unknown(&self.task, "Unknown task"),
            "timestamp": or_unknown(&self.timestamp, "Unknown time"),
            "metadata": self.metadata.clone().unwrap_or_default(),
        })
    }
}

pub fn now_timestamp() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Read the last session; missing or unparseable files count as no session.
pub fn read_session(path: &Path) -> Result<Option<SessionState>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    match serde_json::from_str(&contents) {
        Ok(state) => Ok(Some(state)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable session file");
            Ok(None)
        }
    }
}

pub fn write_session(path: &Path, state: &SessionState) -> Result<()> {
    debug!(status = %state.status, task = %state.task, "writing session");
    let mut buf = serde_json::to_string_pretty(state).context("serialize session")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

pub fn mark_active(path: &Path, task: &str) -> Result<()> {
    write_session(path, &SessionState::new(STATUS_ACTIVE, task, None))
}

pub fn mark_completed(path: &Path, summary: &str) -> Result<()> {
    let mut metadata = Map::new();
    metadata.insert("completed_at".to_string(), Value::String(now_timestamp()));
    write_session(
        path,
        &SessionState::new(STATUS_COMPLETED, summary, Some(metadata)),
    )
}
