//! The seam between the orchestrator and the task bodies.

use crate::core::task::{FailurePolicy, TaskDefinition};

/// Every task the protocols know how to schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    MigrationCleanup,
    CrashDetection,
    ConfigInit,
    ContextLoad,
    GitHooksInstall,
    CommitPolicyVerify,
    VersionCheck,
    SecurityCleanup,
    /// Startup check for sessions not yet exported.
    PendingDialogExport,
    SessionActivate,
    BuildCheck,
    /// Completion-time export of the current dialog.
    DialogExport,
    SecurityScan,
    UpdateMetafiles,
    ReviewCheck,
    Commit { message: Option<String> },
    SessionCleanup,
}

impl TaskKind {
    /// Task name as it appears in results and logs.
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::MigrationCleanup => "migration_cleanup",
            TaskKind::CrashDetection => "crash_detection",
            TaskKind::ConfigInit => "config_init",
            TaskKind::ContextLoad => "context_load",
            TaskKind::GitHooksInstall => "git_hooks_install",
            TaskKind::CommitPolicyVerify => "commit_policy_verify",
            TaskKind::VersionCheck => "version_check",
            TaskKind::SecurityCleanup => "security_cleanup",
            TaskKind::PendingDialogExport | TaskKind::DialogExport => "dialog_export",
            TaskKind::SessionActivate => "session_activate",
            TaskKind::BuildCheck => "build_check",
            TaskKind::SecurityScan => "security_scan",
            TaskKind::UpdateMetafiles => "update_metafiles",
            TaskKind::ReviewCheck => "review_check",
            TaskKind::Commit { .. } => "commit",
            TaskKind::SessionCleanup => "session_cleanup",
        }
    }

    /// Tasks whose failure must never fail a protocol.
    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            TaskKind::VersionCheck | TaskKind::BuildCheck | TaskKind::PendingDialogExport => {
                FailurePolicy::NonFatal
            }
            _ => FailurePolicy::Fatal,
        }
    }
}

/// Supplies task bodies and the few lookups the protocols need for summaries.
pub trait TaskCatalog {
    /// Build the definition for `kind`; its name must be `kind.name()`.
    fn definition(&self, kind: &TaskKind) -> TaskDefinition;

    /// Framework version shown in the startup summary.
    fn current_version(&self) -> String;

    /// Active configuration preset shown in the startup summary.
    fn active_preset(&self) -> String;

    /// Number of changed files, used when completion made no commit.
    fn changed_file_count(&self) -> usize;
}
