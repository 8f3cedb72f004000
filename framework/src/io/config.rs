//! Engine configuration stored under `.claude/framework.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::executor::ParallelOptions;

/// Tuning knobs for protocol execution (TOML).
///
/// Every field is optional in the file; missing fields take the defaults
/// below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Concurrent workers for the startup batch.
    pub startup_workers: usize,

    /// Concurrent workers for completion phase 1.
    pub completion_workers: usize,

    /// Stop dispatching parallel tasks after the first error.
    pub fail_fast: bool,

    /// Per-task deadline in seconds. Unset means tasks may run indefinitely.
    pub task_timeout_secs: Option<u64>,

    /// Protocol log files older than this are removed. 0 keeps everything.
    pub log_max_age_days: u64,

    /// Endpoint returning the latest release as JSON (`{"version": "…"}`).
    pub update_check_url: Option<String>,

    pub update_check_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            startup_workers: 10,
            completion_workers: 3,
            fail_fast: false,
            task_timeout_secs: None,
            log_max_age_days: 7,
            update_check_url: None,
            update_check_timeout_secs: 5,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.startup_workers == 0 {
            bail!("startup_workers must be > 0");
        }
        if self.completion_workers == 0 {
            bail!("completion_workers must be > 0");
        }
        if self.task_timeout_secs == Some(0) {
            bail!("task_timeout_secs must be > 0 when set");
        }
        if self.update_check_timeout_secs == 0 {
            bail!("update_check_timeout_secs must be > 0");
        }
        if let Some(url) = &self.update_check_url
            && url.trim().is_empty()
        {
            bail!("update_check_url must not be blank");
        }
        Ok(())
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }

    pub fn startup_options(&self) -> ParallelOptions {
        ParallelOptions {
            max_workers: self.startup_workers,
            fail_fast: self.fail_fast,
            task_timeout: self.task_timeout(),
        }
    }

    pub fn completion_options(&self) -> ParallelOptions {
        ParallelOptions {
            max_workers: self.completion_workers,
            fail_fast: self.fail_fast,
            task_timeout: self.task_timeout(),
        }
    }
}

/// Load config from a TOML file; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

pub fn write_config(path: &Path, cfg: &EngineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}
