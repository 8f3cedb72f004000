//! Pure readers and formatters used by the protocols to branch on results.
//!
//! Everything here inspects task data by field name; the field names are the
//! contract between task bodies and the orchestrator.

use serde_json::Value;

use crate::core::result::TaskResult;

/// Maximum number of errors listed in an error summary.
pub const MAX_SUMMARIZED_ERRORS: usize = 3;

/// Details of a previous session that never closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashInfo {
    pub task: String,
    pub timestamp: String,
}

/// Join up to [`MAX_SUMMARIZED_ERRORS`] errors as `name: message` with `"; "`.
pub fn summarize_errors<'a>(errors: impl IntoIterator<Item = &'a TaskResult>) -> String {
    errors
        .into_iter()
        .take(MAX_SUMMARIZED_ERRORS)
        .map(|task| format!("{}: {}", task.name(), task.error_message().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Crash details when the crash-detection task reported `crash_detected: true`.
pub fn crash_info(result: Option<&TaskResult>) -> Option<CrashInfo> {
    let result = result?;
    if result.field("crash_detected").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let info = result.field("crash_info");
    let read = |key: &str| {
        info.and_then(|info| info.get(key))
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string()
    };
    Some(CrashInfo {
        task: read("task"),
        timestamp: read("timestamp"),
    })
}

/// Critical finding count reported by a security scan (0 when absent).
pub fn critical_findings(result: Option<&TaskResult>) -> u64 {
    result
        .and_then(|result| result.field("critical"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// `Update available: <latest>` when the version check found a newer release.
pub fn update_note(result: Option<&TaskResult>) -> Option<String> {
    let result = result?;
    if result.field("update_available").and_then(Value::as_bool) != Some(true) {
        return None;
    }
    let latest = result
        .field("latest_version")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    Some(format!("Update available: {latest}"))
}

/// `v<version> [| Update available: …] | Preset: <preset>`.
pub fn startup_summary(version: &str, update_note: Option<&str>, preset: &str) -> String {
    let mut parts = vec![format!("v{version}")];
    if let Some(note) = update_note {
        parts.push(note.to_string());
    }
    parts.push(format!("Preset: {preset}"));
    parts.join(" | ")
}

/// Hash of the commit created by the commit task, if any.
pub fn commit_hash(result: Option<&TaskResult>) -> Option<&str> {
    result
        .and_then(|result| result.field("hash"))
        .and_then(Value::as_str)
        .filter(|hash| !hash.is_empty())
}

/// Short commit hash, else changed file count, else a no-changes note.
///
/// `changed_files` is only consulted when no commit happened.
pub fn completion_summary(commit_hash: Option<&str>, changed_files: impl FnOnce() -> usize) -> String {
    if let Some(hash) = commit_hash {
        return hash.chars().take(8).collect();
    }
    match changed_files() {
        0 => "No changes to commit".to_string(),
        files => format!("{files} files"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summarize_errors_lists_first_three() {
        let errors = [
            TaskResult::error("a", "one"),
            TaskResult::error("b", "two"),
            TaskResult::error("c", "three"),
            TaskResult::error("d", "four"),
        ];
        assert_eq!(summarize_errors(&errors), "a: one; b: two; c: three");
    }

    #[test]
    fn crash_info_defaults_missing_fields_to_unknown() {
        let result = TaskResult::success_with(
            "crash_detection",
            json!({"crash_detected": true, "crash_info": {"task": "refactor"}}),
        );
        assert_eq!(
            crash_info(Some(&result)),
            Some(CrashInfo {
                task: "refactor".to_string(),
                timestamp: "Unknown".to_string(),
            })
        );
    }

    #[test]
    fn crash_info_absent_without_flag() {
        let result = TaskResult::success_with("crash_detection", json!({"crash_detected": false}));
        assert_eq!(crash_info(Some(&result)), None);
        assert_eq!(crash_info(None), None);
    }

    #[test]
    fn critical_findings_reads_count() {
        let result = TaskResult::success_with("security_scan", json!({"critical": 2, "high": 1}));
        assert_eq!(critical_findings(Some(&result)), 2);
        assert_eq!(critical_findings(None), 0);
    }

    #[test]
    fn startup_summary_includes_update_note_when_present() {
        let version_check = TaskResult::success_with(
            "version_check",
            json!({"update_available": true, "latest_version": "2.1.0"}),
        );
        let note = update_note(Some(&version_check));
        assert_eq!(
            startup_summary("2.0.0", note.as_deref(), "balanced"),
            "v2.0.0 | Update available: 2.1.0 | Preset: balanced"
        );
        assert_eq!(startup_summary("2.0.0", None, "verbose"), "v2.0.0 | Preset: verbose");
    }

    #[test]
    fn completion_summary_prefers_commit_hash() {
        let summary = completion_summary(Some("0123456789abcdef"), || panic!("not consulted"));
        assert_eq!(summary, "01234567");
        assert_eq!(completion_summary(None, || 4), "4 files");
        assert_eq!(completion_summary(None, || 0), "No changes to commit");
    }
}
