//! Task bodies that act on a real project directory.
//!
//! [`ProjectTasks`] is the production [`TaskCatalog`]: each definition it hands
//! out captures a shared [`ProjectContext`] and calls into `crate::io`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::warn;

use crate::core::task::{TaskDefinition, TaskOutput};
use crate::io::config::EngineConfig;
use crate::io::framework_config::{BUILTIN_VERSION, DEFAULT_PRESET, active_preset};
use crate::io::git::Git;
use crate::io::paths::FrameworkPaths;
use crate::io::session::read_session;
use crate::io::version::current_version;
use crate::protocol::{TaskCatalog, TaskKind};

pub mod completion;
pub mod startup;

/// Everything a task body needs to reach the project.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub paths: FrameworkPaths,
    pub git: Git,
    pub config: EngineConfig,
    /// Where the assistant stores its raw session transcripts (`*.jsonl`).
    pub sessions_dir: Option<PathBuf>,
}

impl ProjectContext {
    pub fn new(root: &Path, config: EngineConfig) -> Self {
        let sessions_dir = std::env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(".claude").join("projects"));
        Self {
            paths: FrameworkPaths::new(root),
            git: Git::new(root),
            config,
            sessions_dir,
        }
    }

    pub fn with_sessions_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.sessions_dir = dir;
        self
    }
}

/// [`TaskCatalog`] backed by the project files, git and the network.
#[derive(Debug, Clone)]
pub struct ProjectTasks {
    ctx: Arc<ProjectContext>,
}

impl ProjectTasks {
    pub fn new(ctx: ProjectContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &ProjectContext {
        &self.ctx
    }

    fn task<F>(&self, kind: &TaskKind, body: F) -> TaskDefinition
    where
        F: FnOnce(&ProjectContext) -> Result<TaskOutput> + Send + 'static,
    {
        let ctx = Arc::clone(&self.ctx);
        TaskDefinition::new(kind.name(), move || body(&ctx))
    }
}

impl TaskCatalog for ProjectTasks {
    fn definition(&self, kind: &TaskKind) -> TaskDefinition {
        match kind {
            TaskKind::MigrationCleanup => self.task(kind, startup::migration_cleanup),
            TaskKind::CrashDetection => {
                // Read now, before any body of the batch can rewrite the file.
                let snapshot = read_session(&self.ctx.paths.last_session);
                self.task(kind, move |_| startup::crash_detection(snapshot?))
            }
            TaskKind::ConfigInit => self.task(kind, startup::config_init),
            TaskKind::ContextLoad => self.task(kind, startup::context_load),
            TaskKind::GitHooksInstall => self.task(kind, startup::git_hooks_install),
            TaskKind::CommitPolicyVerify => self.task(kind, startup::commit_policy_verify),
            TaskKind::VersionCheck => self.task(kind, startup::version_check),
            TaskKind::SecurityCleanup => self.task(kind, startup::security_cleanup),
            TaskKind::PendingDialogExport => self.task(kind, startup::pending_dialog_export),
            TaskKind::SessionActivate => self.task(kind, startup::session_activate),
            TaskKind::BuildCheck => self.task(kind, completion::build_check),
            TaskKind::DialogExport => self.task(kind, completion::dialog_export),
            TaskKind::SecurityScan => self.task(kind, completion::security_scan),
            TaskKind::UpdateMetafiles => self.task(kind, completion::update_metafiles),
            TaskKind::ReviewCheck => self.task(kind, completion::review_check),
            TaskKind::Commit { message } => {
                let message = message.clone();
                self.task(kind, move |ctx| completion::commit(ctx, message))
            }
            TaskKind::SessionCleanup => self.task(kind, completion::session_cleanup),
        }
    }

    fn current_version(&self) -> String {
        current_version(&self.ctx.paths).unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "falling back to built-in version");
            BUILTIN_VERSION.to_string()
        })
    }

    fn active_preset(&self) -> String {
        active_preset(&self.ctx.paths).unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "falling back to default preset");
            DEFAULT_PRESET.to_string()
        })
    }

    fn changed_file_count(&self) -> usize {
        if !self.ctx.git.is_repo() {
            return 0;
        }
        match self.ctx.git.diff_stat() {
            Ok(stat) => stat.files,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "cannot count changed files");
                0
            }
        }
    }
}
