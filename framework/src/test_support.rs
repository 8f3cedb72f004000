//! Test-only helpers: a scripted task catalog and a scratch git repository.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::result::TaskResult;
use crate::core::task::{TaskDefinition, TaskOutput};
use crate::protocol::{TaskCatalog, TaskKind};

/// What a scripted task does when invoked.
#[derive(Debug, Clone)]
pub enum Script {
    /// Success carrying this JSON object as data.
    Data(Value),
    /// Body returns `Err` with this message.
    Fail(String),
    /// Body panics with this message.
    Panic(String),
}

/// [`TaskCatalog`] whose bodies follow per-name scripts and record every
/// invocation. Unscripted tasks succeed without data.
#[derive(Debug)]
pub struct ScriptedCatalog {
    scripts: HashMap<String, Script>,
    version: String,
    preset: String,
    changed_files: usize,
    invoked: Arc<Mutex<Vec<String>>>,
    requested: Mutex<Vec<TaskKind>>,
}

impl Default for ScriptedCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            version: "2.0.0".to_string(),
            preset: "verbose".to_string(),
            changed_files: 0,
            invoked: Arc::new(Mutex::new(Vec::new())),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(mut self, name: &str, script: Script) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }

    pub fn with_data(self, name: &str, data: Value) -> Self {
        self.with_script(name, Script::Data(data))
    }

    pub fn with_failure(self, name: &str, message: &str) -> Self {
        self.with_script(name, Script::Fail(message.to_string()))
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_preset(mut self, preset: &str) -> Self {
        self.preset = preset.to_string();
        self
    }

    pub fn with_changed_files(mut self, count: usize) -> Self {
        self.changed_files = count;
        self
    }

    /// Names of tasks whose bodies actually ran, in invocation order.
    pub fn invoked(&self) -> Vec<String> {
        self.invoked.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Kinds handed out by [`TaskCatalog::definition`], in request order.
    pub fn requested(&self) -> Vec<TaskKind> {
        self.requested
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }
}

impl TaskCatalog for ScriptedCatalog {
    fn definition(&self, kind: &TaskKind) -> TaskDefinition {
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(kind.clone());
        }
        let name = kind.name();
        let script = self.scripts.get(name).cloned();
        let invoked = Arc::clone(&self.invoked);
        TaskDefinition::new(name, move || {
            if let Ok(mut log) = invoked.lock() {
                log.push(name.to_string());
            }
            match script {
                None => Ok(TaskOutput::none()),
                Some(Script::Data(data)) => Ok(TaskResult::success_with(name, data).into()),
                Some(Script::Fail(message)) => Err(anyhow!(message)),
                Some(Script::Panic(message)) => panic!("{message}"),
            }
        })
    }

    fn current_version(&self) -> String {
        self.version.clone()
    }

    fn active_preset(&self) -> String {
        self.preset.clone()
    }

    fn changed_file_count(&self) -> usize {
        self.changed_files
    }
}

/// Scratch git repository with a committed initial state.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        let repo = Self { dir };
        repo.git(&["init", "-q", "-b", "main"])?;
        repo.git(&["config", "user.email", "dev@example.com"])?;
        repo.git(&["config", "user.name", "Framework Dev"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        repo.write("README.md", "# scratch\n")?;
        repo.git(&["add", "-A"])?;
        repo.git(&["commit", "-q", "-m", "initial"])?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the repo root, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Run git in the repo, failing on a non-zero exit.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
