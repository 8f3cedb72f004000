//! Project-level framework configuration (`.claude/.framework-config`) and
//! user settings (`.claude/settings.json`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::io::paths::FrameworkPaths;

/// Version reported when neither config nor settings name one.
pub const BUILTIN_VERSION: &str = "2.0.0";

pub const DEFAULT_PRESET: &str = "verbose";

pub const VALID_PRESETS: &[&str] = &["paranoid", "balanced", "autopilot", "verbose", "silent"];

/// Presets that suppress success output.
pub const SILENT_PRESETS: &[&str] = &["silent", "autopilot"];

/// Contents of `.framework-config` (JSON). Keys this crate does not know
/// about are preserved on rewrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework_version: Option<String>,
    pub first_run_completed: bool,
    pub consent_version: String,
    pub last_update_check: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_preset: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Missing file yields the defaults.
pub fn load_framework_config(path: &Path) -> Result<FrameworkConfig> {
    if !path.exists() {
        return Ok(FrameworkConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

pub fn write_framework_config(path: &Path, config: &FrameworkConfig) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(config).context("serialize framework config")?;
    buf.push('\n');
    super::write_atomic(path, &buf)
}

/// `settings.json` as free-form JSON with dotted-key lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings(Value);

impl Default for Settings {
    fn default() -> Self {
        Self(json!({
            "framework": {"version": BUILTIN_VERSION},
            "preset": DEFAULT_PRESET,
            "execution": {"mode": DEFAULT_PRESET, "parallelism": true},
        }))
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(Self(value))
    }

    /// Look up `a.b.c` through nested objects.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        dotted
            .split('.')
            .try_fold(&self.0, |node, key| node.as_object()?.get(key))
    }

    pub fn get_str(&self, dotted: &str) -> Option<&str> {
        self.get(dotted).and_then(Value::as_str)
    }
}

/// Preset from the framework config, else settings, else `verbose`.
pub fn active_preset(paths: &FrameworkPaths) -> Result<String> {
    let config = load_framework_config(&paths.framework_config)?;
    if let Some(preset) = config.active_preset.filter(|preset| !preset.is_empty()) {
        return Ok(preset);
    }
    let settings = Settings::load(&paths.settings)?;
    Ok(settings
        .get_str("preset")
        .filter(|preset| !preset.is_empty())
        .unwrap_or(DEFAULT_PRESET)
        .to_string())
}

pub fn is_silent_preset(preset: &str) -> bool {
    SILENT_PRESETS.contains(&preset)
}

/// Persist `preset` as the active preset; unknown names are rejected.
pub fn set_active_preset(paths: &FrameworkPaths, preset: &str) -> Result<()> {
    if !VALID_PRESETS.contains(&preset) {
        bail!(
            "unknown preset '{preset}' (expected one of: {})",
            VALID_PRESETS.join(", ")
        );
    }
    let mut config = load_framework_config(&paths.framework_config)?;
    config.active_preset = Some(preset.to_string());
    write_framework_config(&paths.framework_config, &config)?;
    debug!(preset, "active preset updated");
    Ok(())
}

/// Named preset definition from `presets.json` (`{"presets": {name: {...}}}`).
pub fn preset_definition(paths: &FrameworkPaths, preset: &str) -> Result<Option<Value>> {
    if !paths.presets.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&paths.presets)
        .with_context(|| format!("read {}", paths.presets.display()))?;
    let presets: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", paths.presets.display()))?;
    Ok(presets
        .get("presets")
        .and_then(|all| all.get(preset))
        .cloned())
}
