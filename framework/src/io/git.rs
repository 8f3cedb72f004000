//! Git adapter for the task bodies.
//!
//! Every call shells out to `git` in the project root; output is parsed from
//! the porcelain and numstat formats only.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, instrument};

/// Parsed `git status --porcelain -z` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Index-side status letter (`?` for untracked).
    pub index: char,
    /// Worktree-side status letter.
    pub worktree: char,
    pub path: String,
}

impl StatusEntry {
    pub fn is_staged(&self) -> bool {
        matches!(self.index, 'M' | 'A' | 'D' | 'R' | 'C')
    }

    pub fn is_unstaged(&self) -> bool {
        matches!(self.worktree, 'M' | 'D')
    }

    pub fn is_untracked(&self) -> bool {
        self.index == '?' && self.worktree == '?'
    }
}

/// Changed paths grouped the way the commit task consumes them. A path
/// modified in both index and worktree appears in both lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkingTreeStatus {
    pub staged: Vec<String>,
    pub unstaged: Vec<String>,
    pub untracked: Vec<String>,
}

impl WorkingTreeStatus {
    pub fn from_entries(entries: &[StatusEntry]) -> Self {
        let mut status = Self::default();
        for entry in entries {
            if entry.is_staged() {
                status.staged.push(entry.path.clone());
            }
            if entry.is_unstaged() {
                status.unstaged.push(entry.path.clone());
            }
            if entry.is_untracked() {
                status.untracked.push(entry.path.clone());
            }
        }
        status
    }

    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty() && self.untracked.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NumStat {
    pub files: usize,
    pub insertions: u64,
    pub deletions: u64,
}

impl NumStat {
    fn plus(self, other: NumStat) -> NumStat {
        NumStat {
            files: self.files + other.files,
            insertions: self.insertions + other.insertions,
            deletions: self.deletions + other.deletions,
        }
    }
}

/// `--numstat` totals for staged and unstaged changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStat {
    pub files: usize,
    pub insertions: u64,
    pub deletions: u64,
    pub staged: NumStat,
    pub unstaged: NumStat,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// True when the workdir is inside a git work tree. A missing `git`
    /// binary counts as "not a repo".
    pub fn is_repo(&self) -> bool {
        match self.run(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(output) => {
                output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true"
            }
            Err(err) => {
                debug!(error = %err, "git unavailable");
                false
            }
        }
    }

    /// Current branch, or `None` on a detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let out = self.run_capture(&["branch", "--show-current"])?;
        let name = out.trim();
        Ok((!name.is_empty()).then(|| name.to_string()))
    }

    /// All status entries including untracked files.
    pub fn status_entries(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain", "-z", "-uall"])?;
        parse_status_z(&out)
    }

    /// Grouped working tree status. Outside a repository the tree counts as
    /// clean.
    pub fn status(&self) -> Result<WorkingTreeStatus> {
        if !self.is_repo() {
            debug!("not a git repository, reporting a clean tree");
            return Ok(WorkingTreeStatus::default());
        }
        Ok(WorkingTreeStatus::from_entries(&self.status_entries()?))
    }

    pub fn has_uncommitted_changes(&self) -> Result<bool> {
        Ok(!self.status()?.is_clean())
    }

    #[instrument(skip_all)]
    pub fn diff_stat(&self) -> Result<DiffStat> {
        let staged = parse_numstat(&self.run_capture(&["diff", "--cached", "--numstat"])?);
        let unstaged = parse_numstat(&self.run_capture(&["diff", "--numstat"])?);
        let total = staged.plus(unstaged);
        debug!(files = total.files, "diff stat");
        Ok(DiffStat {
            files: total.files,
            insertions: total.insertions,
            deletions: total.deletions,
            staged,
            unstaged,
        })
    }

    pub fn stage_files(&self, files: &[String]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add", "--"];
        args.extend(files.iter().map(String::as_str));
        self.run_checked(&args)?;
        Ok(())
    }

    /// Commit what is staged and return the new HEAD hash.
    ///
    /// Returns `Ok(None)` without committing when nothing is staged.
    #[instrument(skip_all)]
    pub fn commit(&self, message: &str) -> Result<Option<String>> {
        if self.status()?.staged.is_empty() {
            debug!("nothing staged, skipping commit");
            return Ok(None);
        }
        self.run_checked(&["commit", "-m", message])?;
        let hash = self.run_capture(&["rev-parse", "HEAD"])?.trim().to_string();
        debug!(hash = %hash, "committed");
        Ok((!hash.is_empty()).then_some(hash))
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Parse NUL-separated porcelain output. Rename and copy entries are followed
/// by their source path, which is dropped.
fn parse_status_z(out: &str) -> Result<Vec<StatusEntry>> {
    let mut entries = Vec::new();
    let mut fields = out.split('\0').filter(|field| !field.is_empty());
    while let Some(field) = fields.next() {
        let entry = parse_status_entry(field)?;
        if matches!(entry.index, 'R' | 'C') {
            fields.next();
        }
        entries.push(entry);
    }
    Ok(entries)
}

fn parse_status_entry(field: &str) -> Result<StatusEntry> {
    let mut chars = field.chars();
    let (Some(index), Some(worktree), Some(' ')) = (chars.next(), chars.next(), chars.next()) else {
        return Err(anyhow!("unexpected porcelain entry: '{field}'"));
    };
    let path = chars.as_str();
    if path.is_empty() {
        return Err(anyhow!("porcelain entry missing path: '{field}'"));
    }
    Ok(StatusEntry {
        index,
        worktree,
        path: path.to_string(),
    })
}

/// Binary files report `-` for both counts; they still count as a file.
fn parse_numstat(out: &str) -> NumStat {
    let mut stat = NumStat::default();
    for line in out.lines() {
        let mut parts = line.split('\t');
        let (Some(added), Some(removed)) = (parts.next(), parts.next()) else {
            continue;
        };
        stat.files += 1;
        stat.insertions += added.parse::<u64>().unwrap_or(0);
        stat.deletions += removed.parse::<u64>().unwrap_or(0);
    }
    stat
}
