//! Persistent JSON log of protocol runs under `.claude/logs/<protocol>/`.
//!
//! Each day gets one file, `<YYYY-MM-DD>.json`, holding a JSON array of
//! entries: one per task, followed by a `protocol_summary` entry per run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::core::result::{ProtocolResult, ProtocolStatus, TaskStatus};
use crate::io::session::now_timestamp;

const DATE_FORMAT: &str = "%Y-%m-%d";
const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Serialize)]
struct TaskEntry<'a> {
    timestamp: &'a str,
    task: &'a str,
    status: TaskStatus,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SummaryEntry<'a> {
    timestamp: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    protocol: &'a str,
    status: ProtocolStatus,
    total_duration_ms: u64,
    task_count: usize,
    error_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ErrorEntry<'a> {
    timestamp: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    error: &'a str,
}

/// Writer and reader for the per-protocol daily log files.
#[derive(Debug, Clone)]
pub struct ProtocolLog {
    dir: PathBuf,
    max_age_days: u64,
}

impl ProtocolLog {
    /// `max_age_days == 0` disables rotation.
    pub fn new(dir: impl Into<PathBuf>, max_age_days: u64) -> Self {
        Self {
            dir: dir.into(),
            max_age_days,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Today's file for `protocol`.
    pub fn today_path(&self, protocol: &str) -> PathBuf {
        self.dir
            .join(protocol)
            .join(format!("{}.json", Local::now().format(DATE_FORMAT)))
    }

    /// Append one entry per task plus the run summary.
    #[instrument(skip_all, fields(protocol = result.protocol()))]
    pub fn record(&self, result: &ProtocolResult) -> Result<PathBuf> {
        let timestamp = now_timestamp();
        let mut entries = Vec::with_capacity(result.tasks().len() + 1);
        for task in result.tasks() {
            entries.push(to_value(&TaskEntry {
                timestamp: &timestamp,
                task: task.name(),
                status: task.status(),
                duration_ms: task.duration_ms(),
                details: task.data(),
                error: task.error_message(),
            })?);
        }
        entries.push(to_value(&SummaryEntry {
            timestamp: &timestamp,
            kind: "protocol_summary",
            protocol: result.protocol(),
            status: result.status(),
            total_duration_ms: result.total_duration_ms(),
            task_count: result.tasks().len(),
            error_count: result.error_count(),
            summary: result.summary(),
        })?);
        self.append(result.protocol(), entries)
    }

    /// Record an engine failure that produced no protocol result.
    pub fn record_error(&self, protocol: &str, error: &str) -> Result<PathBuf> {
        let entry = to_value(&ErrorEntry {
            timestamp: &now_timestamp(),
            kind: "error",
            error,
        })?;
        self.append(protocol, vec![entry])
    }

    fn append(&self, protocol: &str, entries: Vec<Value>) -> Result<PathBuf> {
        let path = self.today_path(protocol);
        let mut existing = read_entries(&path)?;
        existing.extend(entries);
        let mut buf = serde_json::to_string_pretty(&existing).context("serialize log entries")?;
        buf.push('\n');
        super::write_atomic(&path, &buf)?;
        debug!(path = %path.display(), entries = existing.len(), "protocol log written");
        Ok(path)
    }

    /// Delete `*.json` files whose mtime is older than the retention window.
    /// Returns how many were removed.
    pub fn rotate(&self) -> Result<usize> {
        if self.max_age_days == 0 || !self.dir.is_dir() {
            return Ok(0);
        }
        let max_age = Duration::from_secs(self.max_age_days.saturating_mul(SECS_PER_DAY));
        let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
            return Ok(0);
        };
        let mut removed = 0;
        for path in json_files(&self.dir)? {
            let modified = fs::metadata(&path).and_then(|meta| meta.modified());
            match modified {
                Ok(modified) if modified < cutoff => {
                    fs::remove_file(&path)
                        .with_context(|| format!("remove {}", path.display()))?;
                    removed += 1;
                }
                Ok(_) => {}
                Err(err) => warn!(path = %path.display(), error = %err, "cannot stat log file"),
            }
        }
        if removed > 0 {
            debug!(removed, "rotated protocol logs");
        }
        Ok(removed)
    }

    /// Entries logged for `protocol` during the last `days` days, newest file
    /// first. `status` keeps only entries with that status.
    pub fn recent_entries(
        &self,
        protocol: &str,
        days: u64,
        status: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut entries = Vec::new();
        for path in self.recent_files(protocol, days)? {
            entries.extend(read_entries(&path)?.into_iter().filter(|entry| {
                status.is_none_or(|wanted| {
                    entry.get("status").and_then(Value::as_str) == Some(wanted)
                })
            }));
        }
        Ok(entries)
    }

    /// Most recent `protocol_summary` entry for `protocol` within the
    /// retention window.
    pub fn last_summary(&self, protocol: &str) -> Result<Option<Value>> {
        for path in self.recent_files(protocol, self.max_age_days.max(1))? {
            let summary = read_entries(&path)?
                .into_iter()
                .rev()
                .find(|entry| entry.get("type").and_then(Value::as_str) == Some("protocol_summary"));
            if summary.is_some() {
                return Ok(summary);
            }
        }
        Ok(None)
    }

    /// Daily files for `protocol` dated within the last `days` days, newest
    /// first. Files whose name is not a date are ignored.
    fn recent_files(&self, protocol: &str, days: u64) -> Result<Vec<PathBuf>> {
        let dir = self.dir.join(protocol);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let cutoff = Local::now()
            .date_naive()
            .checked_sub_days(Days::new(days))
            .unwrap_or(NaiveDate::MIN);
        let mut dated: Vec<(NaiveDate, PathBuf)> = json_files(&dir)?
            .into_iter()
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?;
                let date = NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()?;
                (date >= cutoff).then_some((date, path))
            })
            .collect();
        dated.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(dated.into_iter().map(|(_, path)| path).collect())
    }
}

fn to_value<T: Serialize>(entry: &T) -> Result<Value> {
    serde_json::to_value(entry).context("serialize log entry")
}

/// Existing entries in `path`; a missing or corrupt file starts fresh.
fn read_entries(path: &Path) -> Result<Vec<Value>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(&contents) {
        Ok(Value::Array(entries)) => Ok(entries),
        Ok(single) => Ok(vec![single]),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "discarding corrupt log file");
            Ok(Vec::new())
        }
    }
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries =
            fs::read_dir(&current).with_context(|| format!("read dir {}", current.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("read dir entry in {}", current.display()))?
                .path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "json") {
                found.push(path);
            }
        }
    }
    Ok(found)
}
