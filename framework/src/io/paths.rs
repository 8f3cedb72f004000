//! Canonical project paths.

use std::path::{Path, PathBuf};

/// Locations of every file the framework reads or writes, relative to a
/// project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkPaths {
    pub root: PathBuf,
    pub claude_dir: PathBuf,
    pub framework_config: PathBuf,
    pub settings: PathBuf,
    pub presets: PathBuf,
    pub last_session: PathBuf,
    pub migration_log: PathBuf,
    pub commit_policy: PathBuf,
    pub engine_config: PathBuf,
    pub logs_dir: PathBuf,
    pub dev_docs_dir: PathBuf,
    pub dialog_dir: PathBuf,
    pub git_hooks_dir: PathBuf,
}

impl FrameworkPaths {
    pub fn new(root: &Path) -> Self {
        let claude_dir = root.join(".claude");
        Self {
            root: root.to_path_buf(),
            framework_config: claude_dir.join(".framework-config"),
            settings: claude_dir.join("settings.json"),
            presets: claude_dir.join("presets.json"),
            last_session: claude_dir.join(".last_session"),
            migration_log: claude_dir.join("migration-log.json"),
            commit_policy: claude_dir.join("COMMIT_POLICY.md"),
            engine_config: claude_dir.join("framework.toml"),
            logs_dir: claude_dir.join("logs"),
            dev_docs_dir: root.join("dev-docs"),
            dialog_dir: root.join("dialog"),
            git_hooks_dir: root.join(".git").join("hooks"),
            claude_dir,
        }
    }

    pub fn snapshot(&self) -> PathBuf {
        self.dev_docs_dir.join("snapshot.md")
    }

    pub fn todo(&self) -> PathBuf {
        self.dev_docs_dir.join("to-do.md")
    }

    pub fn prd(&self) -> PathBuf {
        self.dev_docs_dir.join("prd.md")
    }

    pub fn architecture(&self) -> PathBuf {
        self.dev_docs_dir.join("architecture.md")
    }

    pub fn package_json(&self) -> PathBuf {
        self.root.join("package.json")
    }
}
