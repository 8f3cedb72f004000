//! Git hook verification and installation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

const PRE_COMMIT: &str = include_str!("hook_scripts/pre-commit.sh");
const POST_COMMIT: &str = include_str!("hook_scripts/post-commit.sh");

/// Hooks the framework expects in every repository.
pub const REQUIRED_HOOKS: &[&str] = &["pre-commit", "post-commit"];

fn template(hook: &str) -> Option<&'static str> {
    match hook {
        "pre-commit" => Some(PRE_COMMIT),
        "post-commit" => Some(POST_COMMIT),
        _ => None,
    }
}

/// A hook counts as installed when the file exists and is executable.
pub fn is_installed(hooks_dir: &Path, hook: &str) -> bool {
    let Ok(metadata) = fs::metadata(hooks_dir.join(hook)) else {
        return false;
    };
    metadata.is_file() && is_executable(&metadata)
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    true
}

/// Installation state of every required hook.
pub fn verify_all(hooks_dir: &Path) -> BTreeMap<String, bool> {
    REQUIRED_HOOKS
        .iter()
        .map(|hook| (hook.to_string(), is_installed(hooks_dir, hook)))
        .collect()
}

/// Write the bundled template for `hook` and mark it executable.
pub fn install(hooks_dir: &Path, hook: &str) -> Result<()> {
    if !hooks_dir.is_dir() {
        bail!("hooks directory missing: {}", hooks_dir.display());
    }
    let Some(contents) = template(hook) else {
        bail!("no template for hook '{hook}'");
    };
    let path = hooks_dir.join(hook);
    fs::write(&path, contents).with_context(|| format!("write hook {}", path.display()))?;
    make_executable(&path)?;
    info!(hook, "installed git hook");
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions).with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Install every required hook that is missing; already installed hooks are
/// left untouched.
///
/// Returns which hooks are in place afterwards. A failed install is recorded
/// as `false` rather than aborting the remaining hooks.
pub fn install_all(hooks_dir: &Path) -> BTreeMap<String, bool> {
    REQUIRED_HOOKS
        .iter()
        .map(|hook| {
            let installed = is_installed(hooks_dir, hook)
                || match install(hooks_dir, hook) {
                    Ok(()) => true,
                    Err(err) => {
                        debug!(hook, error = %format!("{err:#}"), "hook install failed");
                        false
                    }
                };
            (hook.to_string(), installed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_hooks_are_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let status = verify_all(temp.path());
        assert_eq!(status.get("pre-commit"), Some(&false));
        assert_eq!(status.get("post-commit"), Some(&false));
    }

    #[test]
    fn install_all_writes_executable_templates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let results = install_all(temp.path());

        assert!(results.values().all(|installed| *installed));
        assert!(verify_all(temp.path()).values().all(|installed| *installed));
        let pre_commit = fs::read_to_string(temp.path().join("pre-commit")).expect("read");
        assert!(pre_commit.contains("BLOCKED_PATTERNS"));
    }

    #[test]
    fn existing_hook_is_not_overwritten() {
        let temp = tempfile::tempdir().expect("tempdir");
        install(temp.path(), "pre-commit").expect("install");
        fs::write(temp.path().join("pre-commit"), "#!/bin/sh\nexit 0\n").expect("write");
        #[cfg(unix)]
        make_executable(&temp.path().join("pre-commit")).expect("chmod");

        install_all(temp.path());
        assert_eq!(
            fs::read_to_string(temp.path().join("pre-commit")).expect("read"),
            "#!/bin/sh\nexit 0\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_hook_counts_as_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("post-commit"), "#!/bin/sh\n").expect("write");
        assert!(!is_installed(temp.path(), "post-commit"));
    }

    #[test]
    fn unknown_hook_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = install(temp.path(), "pre-push").expect_err("unknown");
        assert!(err.to_string().contains("no template"));
    }

    #[test]
    fn install_without_hooks_dir_fails_softly() {
        let temp = tempfile::tempdir().expect("tempdir");
        let results = install_all(&temp.path().join("missing"));
        assert!(results.values().all(|installed| !installed));
    }
}
