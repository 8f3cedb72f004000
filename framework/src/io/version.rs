//! Framework version lookup and release checks.

use std::cmp::Ordering;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::io::config::EngineConfig;
use crate::io::framework_config::{BUILTIN_VERSION, Settings, load_framework_config};
use crate::io::paths::FrameworkPaths;
use crate::io::process::{DEFAULT_OUTPUT_LIMIT, run_with_timeout};

/// Version from `.framework-config`, else `settings.json`, else the built-in
/// version.
pub fn current_version(paths: &FrameworkPaths) -> Result<String> {
    let config = load_framework_config(&paths.framework_config)?;
    if let Some(version) = config.framework_version.filter(|v| !v.is_empty()) {
        return Ok(version);
    }
    let settings = Settings::load(&paths.settings)?;
    Ok(settings
        .get_str("framework.version")
        .filter(|v| !v.is_empty())
        .unwrap_or(BUILTIN_VERSION)
        .to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateCheck {
    pub current_version: String,
    pub update_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_version: Option<String>,
}

/// Compare the current version against the latest published release.
///
/// Without a configured `update_check_url` no lookup happens and no update is
/// reported.
#[instrument(skip_all)]
pub fn check_for_update(paths: &FrameworkPaths, config: &EngineConfig) -> Result<UpdateCheck> {
    let current = current_version(paths)?;
    let latest = match &config.update_check_url {
        Some(url) => fetch_latest(url, Duration::from_secs(config.update_check_timeout_secs))?,
        None => {
            debug!("no update_check_url configured");
            None
        }
    };
    let update_available = latest
        .as_deref()
        .is_some_and(|latest| compare_versions(latest, &current) == Ordering::Greater);
    Ok(UpdateCheck {
        current_version: current,
        update_available,
        latest_version: latest.filter(|_| update_available),
    })
}

/// Fetch the latest release through `curl`.
///
/// The body may be a release object (`tag_name`) or a plain `{"version": …}`.
pub fn fetch_latest(url: &str, timeout: Duration) -> Result<Option<String>> {
    let mut cmd = Command::new("curl");
    cmd.args(["-fsSL", "--max-time"])
        .arg(timeout.as_secs().max(1).to_string())
        .args(["-H", "Accept: application/vnd.github.v3+json"])
        .arg(url);
    let body = run_with_timeout(cmd, timeout + Duration::from_secs(1), DEFAULT_OUTPUT_LIMIT)?
        .into_stdout("curl")
        .with_context(|| format!("fetch {url}"))?;
    let release: Value =
        serde_json::from_str(&body).with_context(|| format!("parse release from {url}"))?;
    Ok(parse_release(&release))
}

fn parse_release(release: &Value) -> Option<String> {
    let raw = release
        .get("tag_name")
        .or_else(|| release.get("version"))
        .and_then(Value::as_str)?;
    let version = raw.strip_prefix('v').unwrap_or(raw).trim();
    (!version.is_empty()).then(|| version.to_string())
}

/// Numeric dotted-version comparison (`2.10.0 > 2.9.1`). Missing components
/// count as zero; versions with non-numeric components compare as strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (numeric_parts(a), numeric_parts(b)) {
        (Some(left), Some(right)) => {
            let len = left.len().max(right.len());
            let pad = |parts: &[u64], i: usize| parts.get(i).copied().unwrap_or(0);
            (0..len)
                .map(|i| pad(&left, i).cmp(&pad(&right, i)))
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
        }
        _ => a.cmp(b),
    }
}

fn numeric_parts(version: &str) -> Option<Vec<u64>> {
    version
        .trim()
        .trim_start_matches('v')
        .split('.')
        .map(|part| part.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn version_precedence() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = FrameworkPaths::new(temp.path());
        assert_eq!(current_version(&paths).expect("version"), BUILTIN_VERSION);

        fs::create_dir_all(&paths.claude_dir).expect("mkdir");
        fs::write(&paths.settings, r#"{"framework": {"version": "2.3.0"}}"#).expect("write");
        assert_eq!(current_version(&paths).expect("version"), "2.3.0");

        fs::write(&paths.framework_config, r#"{"framework_version": "2.4.1"}"#).expect("write");
        assert_eq!(current_version(&paths).expect("version"), "2.4.1");
    }

    #[test]
    fn compares_numerically() {
        assert_eq!(compare_versions("2.10.0", "2.9.1"), Ordering::Greater);
        assert_eq!(compare_versions("2.0", "2.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("v1.2.3", "1.2.4"), Ordering::Less);
        assert_eq!(compare_versions("2.1.0-beta", "2.1.0-alpha"), Ordering::Greater);
    }

    #[test]
    fn release_payload_variants() {
        assert_eq!(parse_release(&json!({"tag_name": "v2.1.0"})).as_deref(), Some("2.1.0"));
        assert_eq!(parse_release(&json!({"version": "2.2.0"})).as_deref(), Some("2.2.0"));
        assert_eq!(parse_release(&json!({"tag_name": ""})), None);
        assert_eq!(parse_release(&json!({})), None);
    }

    #[test]
    fn no_url_means_no_update() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = FrameworkPaths::new(temp.path());
        let check = check_for_update(&paths, &EngineConfig::default()).expect("check");
        assert_eq!(
            check,
            UpdateCheck {
                current_version: BUILTIN_VERSION.to_string(),
                update_available: false,
                latest_version: None,
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn file_url_release_is_compared() {
        if Command::new("curl").arg("--version").output().is_err() {
            return;
        }
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = FrameworkPaths::new(temp.path());
        let release = temp.path().join("latest.json");
        fs::write(&release, r#"{"tag_name": "v9.0.0"}"#).expect("write");
        let config = EngineConfig {
            update_check_url: Some(format!("file://{}", release.display())),
            ..EngineConfig::default()
        };

        let check = check_for_update(&paths, &config).expect("check");
        assert!(check.update_available);
        assert_eq!(check.latest_version.as_deref(), Some("9.0.0"));
    }
}
