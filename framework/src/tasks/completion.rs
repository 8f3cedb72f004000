//! Bodies of the `completion` tasks.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::core::result::TaskResult;
use crate::core::task::TaskOutput;
use crate::io::security::{Severity, quick_scan, redact_dialogs};
use crate::io::session::{mark_completed, now_timestamp};
use crate::protocol::TaskKind;
use crate::tasks::ProjectContext;
use crate::tasks::startup::top_level_files;

fn success(kind: TaskKind, data: Value) -> Result<TaskOutput> {
    Ok(TaskResult::success_with(kind.name(), data).into())
}

fn skipped(kind: TaskKind, reason: &str) -> Result<TaskOutput> {
    Ok(TaskResult::skipped(kind.name(), reason).into())
}

/// Detect which build systems the project uses. Nothing is built.
pub fn build_check(ctx: &ProjectContext) -> Result<TaskOutput> {
    let root = &ctx.paths.root;
    let package_json = ctx.paths.package_json();
    let mut data = json!({
        "package_json": package_json.exists(),
        "makefile": root.join("Makefile").exists(),
        "cargo": root.join("Cargo.toml").exists(),
    });
    if package_json.exists() {
        let contents = fs::read_to_string(&package_json)
            .with_context(|| format!("read {}", package_json.display()))?;
        let manifest: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse {}", package_json.display()))?;
        let scripts = manifest.get("scripts");
        let has_script = |name: &str| scripts.and_then(|s| s.get(name)).is_some();
        data["has_build_script"] = Value::Bool(has_script("build"));
        data["has_test_script"] = Value::Bool(has_script("test"));
    }
    success(TaskKind::BuildCheck, data)
}

/// Make sure the export directory exists and scrub credentials from the
/// exported dialogs.
pub fn dialog_export(ctx: &ProjectContext) -> Result<TaskOutput> {
    let dir = &ctx.paths.dialog_dir;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let redactions = redact_dialogs(dir)?;
    if redactions > 0 {
        info!(redactions, "redacted credentials in dialog exports");
    }
    success(
        TaskKind::DialogExport,
        json!({
            "exported": top_level_files(dir, "md")?,
            "directory": dir.display().to_string(),
            "redactions": redactions,
        }),
    )
}

pub fn security_scan(ctx: &ProjectContext) -> Result<TaskOutput> {
    let report = quick_scan(&ctx.git)?;
    success(
        TaskKind::SecurityScan,
        json!({
            "total": report.total(),
            "critical": report.count(Severity::Critical),
            "high": report.count(Severity::High),
            "medium": report.count(Severity::Medium),
            "scanned_files": report.scanned_files,
        }),
    )
}

/// Report which project metafiles exist and need a refresh.
pub fn update_metafiles(ctx: &ProjectContext) -> Result<TaskOutput> {
    let metafiles = [
        ctx.paths.snapshot(),
        ctx.paths.todo(),
        ctx.paths.architecture(),
    ];
    let relative = |path: &Path| {
        path.strip_prefix(&ctx.paths.root)
            .unwrap_or(path)
            .display()
            .to_string()
    };
    let checked: Vec<String> = metafiles.iter().map(|path| relative(path.as_path())).collect();
    let existing: Vec<String> = metafiles
        .iter()
        .filter(|path| path.exists())
        .map(|path| relative(path.as_path()))
        .collect();
    success(
        TaskKind::UpdateMetafiles,
        json!({"checked": checked, "existing": existing, "timestamp": now_timestamp()}),
    )
}

/// Count the changed files that still need a code review.
pub fn review_check(ctx: &ProjectContext) -> Result<TaskOutput> {
    let status = ctx.git.status()?;
    if status.staged.is_empty() && status.unstaged.is_empty() {
        return skipped(TaskKind::ReviewCheck, "No changes to review");
    }
    success(
        TaskKind::ReviewCheck,
        json!({
            "files_to_review": status.staged.len() + status.unstaged.len(),
            "staged_files": status.staged,
            "unstaged_files": status.unstaged,
            "status": "review_required",
        }),
    )
}

/// Commit the working tree. When nothing is staged, every modified and
/// untracked file is staged first.
pub fn commit(ctx: &ProjectContext, message: Option<String>) -> Result<TaskOutput> {
    let kind = TaskKind::Commit {
        message: message.clone(),
    };
    let git = &ctx.git;
    if !git.has_uncommitted_changes()? {
        return skipped(kind, "No changes to commit");
    }
    let status = git.status()?;
    if status.staged.is_empty() {
        let to_stage: Vec<String> = status.unstaged.into_iter().chain(status.untracked).collect();
        debug!(files = to_stage.len(), "staging working tree changes");
        git.stage_files(&to_stage)?;
    }
    let message = match message.filter(|message| !message.trim().is_empty()) {
        Some(message) => message,
        None => format!("Update: {} file(s) changed", git.diff_stat()?.files),
    };
    let Some(hash) = git.commit(&message)? else {
        bail!("Commit failed - no hash returned");
    };
    info!(hash = %hash, "commit created");
    success(kind, json!({"hash": hash, "message": message}))
}

pub fn session_cleanup(ctx: &ProjectContext) -> Result<TaskOutput> {
    mark_completed(&ctx.paths.last_session, "Session completed successfully")?;
    success(TaskKind::SessionCleanup, json!({"status": "completed"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result::TaskStatus;
    use crate::io::config::EngineConfig;
    use crate::io::session::read_session;
    use crate::test_support::TestRepo;

    fn context(root: &Path) -> ProjectContext {
        ProjectContext::new(root, EngineConfig::default()).with_sessions_dir(None)
    }

    fn result(output: TaskOutput) -> TaskResult {
        match output {
            TaskOutput::Result(result) => result,
            TaskOutput::Value(value) => panic!("expected a built result, got {value}"),
        }
    }

    #[test]
    fn build_check_reads_package_scripts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context(temp.path());
        fs::write(temp.path().join("Cargo.toml"), "[package]\n").expect("write");
        fs::write(
            ctx.paths.package_json(),
            r#"{"scripts": {"build": "tsc"}}"#,
        )
        .expect("write");

        let check = result(build_check(&ctx).expect("run"));
        assert_eq!(check.field("cargo"), Some(&json!(true)));
        assert_eq!(check.field("makefile"), Some(&json!(false)));
        assert_eq!(check.field("has_build_script"), Some(&json!(true)));
        assert_eq!(check.field("has_test_script"), Some(&json!(false)));
    }

    #[test]
    fn dialog_export_redacts_tokens() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context(temp.path());
        fs::create_dir_all(&ctx.paths.dialog_dir).expect("mkdir");
        let export = ctx.paths.dialog_dir.join("session.md");
        fs::write(&export, "curl -H 'Authorization: Bearer abc.def-123'\n").expect("write");

        let exported = result(dialog_export(&ctx).expect("run"));
        assert_eq!(exported.field("exported"), Some(&json!(1)));
        assert_eq!(exported.field("redactions"), Some(&json!(1)));
        let contents = fs::read_to_string(&export).expect("read");
        assert!(contents.contains("Bearer [REDACTED]"));
    }

    #[test]
    fn metafiles_are_listed_relative_to_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context(temp.path());
        fs::create_dir_all(&ctx.paths.dev_docs_dir).expect("mkdir");
        fs::write(ctx.paths.snapshot(), "# snapshot\n").expect("write");

        let metafiles = result(update_metafiles(&ctx).expect("run"));
        assert_eq!(
            metafiles.field("checked"),
            Some(&json!(["dev-docs/snapshot.md", "dev-docs/to-do.md", "dev-docs/architecture.md"]))
        );
        assert_eq!(metafiles.field("existing"), Some(&json!(["dev-docs/snapshot.md"])));
    }

    #[test]
    fn review_skipped_on_clean_tree() {
        let repo = TestRepo::new().expect("repo");
        let ctx = context(repo.path());
        let review = result(review_check(&ctx).expect("run"));
        assert_eq!(review.status(), TaskStatus::Skipped);

        repo.write("README.md", "# changed\n").expect("write");
        let review = result(review_check(&ctx).expect("run"));
        assert_eq!(review.field("files_to_review"), Some(&json!(1)));
        assert_eq!(review.field("unstaged_files"), Some(&json!(["README.md"])));
    }

    #[test]
    fn commit_stages_everything_and_names_the_change() {
        let repo = TestRepo::new().expect("repo");
        let ctx = context(repo.path());
        repo.write("README.md", "# changed\n").expect("write");
        repo.write("src/new.rs", "fn main() {}\n").expect("write");

        let commit = result(commit(&ctx, None).expect("run"));
        assert_eq!(commit.status(), TaskStatus::Success);
        assert_eq!(commit.field("message"), Some(&json!("Update: 2 file(s) changed")));
        let hash = commit.field("hash").and_then(Value::as_str).expect("hash");
        assert_eq!(repo.git(&["rev-parse", "HEAD"]).expect("head").trim(), hash);
        assert!(ctx.git.status().expect("status").is_clean());
    }

    #[test]
    fn commit_uses_given_message_and_skips_clean_tree() {
        let repo = TestRepo::new().expect("repo");
        let ctx = context(repo.path());
        let skipped = result(commit(&ctx, Some("unused".to_string())).expect("run"));
        assert_eq!(skipped.status(), TaskStatus::Skipped);
        assert_eq!(skipped.field("reason"), Some(&json!("No changes to commit")));

        repo.write("notes.txt", "todo\n").expect("write");
        let done = result(commit(&ctx, Some("Add notes".to_string())).expect("run"));
        assert_eq!(done.field("message"), Some(&json!("Add notes")));
        let subject = repo.git(&["log", "-1", "--format=%s"]).expect("log");
        assert_eq!(subject.trim(), "Add notes");
    }

    #[test]
    fn review_and_commit_skip_outside_a_repo() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context(temp.path());
        fs::write(temp.path().join("notes.txt"), "draft\n").expect("write");

        let review = result(review_check(&ctx).expect("review"));
        assert_eq!(review.field("reason"), Some(&json!("No changes to review")));
        let commit = result(commit(&ctx, None).expect("commit"));
        assert_eq!(commit.field("reason"), Some(&json!("No changes to commit")));
    }

    #[test]
    fn session_cleanup_closes_the_session() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context(temp.path());
        session_cleanup(&ctx).expect("run");
        let session = read_session(&ctx.paths.last_session)
            .expect("read")
            .expect("session");
        assert!(!session.is_crashed());
    }
}
