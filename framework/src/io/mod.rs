//! Side-effecting collaborators: filesystem state, git, subprocesses, logs.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

pub mod config;
pub mod framework_config;
pub mod git;
pub mod hooks;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod protocol_log;
pub mod security;
pub mod session;
pub mod version;

/// Replace `path` with `contents` via a uniquely named sibling temp file and
/// a rename. Concurrent writers never share a temp file; the last rename wins.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write temp file {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
