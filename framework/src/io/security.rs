//! Credential scanning and redaction of dialog exports.
//!
//! [`quick_scan`] looks at the files git reports as changed; [`full_scan`]
//! walks the whole project and also flags env files, credential-looking file
//! names and gaps in `.gitignore`.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::io::git::Git;

/// Files containing this marker (case-insensitive) are never reported.
pub const IGNORE_MARKER: &str = "security: ignore";

const MAX_MATCH_CHARS: usize = 50;

const SCANNABLE_EXTENSIONS: &[&str] = &[
    "js", "ts", "py", "java", "go", "rb", "php", "json", "yaml", "yml", "xml", "conf", "config",
    "env", "sh", "bash",
];

/// Directories [`full_scan`] never descends into.
const EXCLUDED_DIRS: &[&str] = &[
    "node_modules", ".git", "venv", ".venv", "__pycache__", "dist", "build", ".next", "coverage",
];
const EXCLUDED_PREFIX: &str = "security/reports";

const ENV_TEMPLATES: &[&str] = &[".env.example", ".env.template"];
const KEY_FILE_NAMES: &[&str] = &["id_rsa", "id_dsa", "id_ecdsa", "id_ed25519"];
const CREDENTIAL_NAME_PARTS: &[&str] = &["credentials", "secret", "password", "token"];
const CREDENTIAL_EXTENSIONS: &[&str] = &["pem", "key", "p12", "pfx", "jks"];
const GITIGNORE_PATTERNS: &[&str] = &[".env", "*.pem", "*.key", "credentials", "secrets"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

const CREDENTIAL_PATTERNS: &[(&str, &str, Severity)] = &[
    (r"sk-[a-zA-Z0-9]{32,}", "api_key", Severity::Critical),
    (r"sk_live_[a-zA-Z0-9]+", "stripe_key", Severity::Critical),
    (r"sk_test_[a-zA-Z0-9]+", "stripe_test_key", Severity::High),
    (r"pk_live_[a-zA-Z0-9]+", "stripe_key", Severity::Critical),
    (r"pk_test_[a-zA-Z0-9]+", "stripe_test_key", Severity::High),
    (r"ghp_[a-zA-Z0-9]{36}", "github_token", Severity::Critical),
    (r"gho_[a-zA-Z0-9]{36}", "github_oauth", Severity::Critical),
    (r"ghu_[a-zA-Z0-9]{36}", "github_user_token", Severity::Critical),
    (r"ghs_[a-zA-Z0-9]{36}", "github_server_token", Severity::Critical),
    (r"AKIA[0-9A-Z]{16}", "aws_access_key", Severity::Critical),
    (r#"password\s*[:=]\s*["'][^"']+["']"#, "hardcoded_password", Severity::High),
    (r#"api_key\s*[:=]\s*["'][^"']+["']"#, "hardcoded_api_key", Severity::High),
    (r#"secret\s*[:=]\s*["'][^"']+["']"#, "hardcoded_secret", Severity::High),
    (r#"token\s*[:=]\s*["'][^"']+["']"#, "hardcoded_token", Severity::High),
    (r#"private_key\s*[:=]\s*["'][^"']+["']"#, "hardcoded_private_key", Severity::Critical),
];

const REDACTIONS: &[(&str, &str)] = &[
    (r"sk-[a-zA-Z0-9]{32,}", "[REDACTED_API_KEY]"),
    (r"sk_live_[a-zA-Z0-9]+", "[REDACTED_STRIPE_KEY]"),
    (r"sk_test_[a-zA-Z0-9]+", "[REDACTED_STRIPE_KEY]"),
    (r"ghp_[a-zA-Z0-9]{36}", "[REDACTED_GITHUB_TOKEN]"),
    (r"AKIA[0-9A-Z]{16}", "[REDACTED_AWS_KEY]"),
    (r#"password\s*[:=]\s*["'][^"']+["']"#, r#"password = "[REDACTED]""#),
    (r#"api_key\s*[:=]\s*["'][^"']+["']"#, r#"api_key = "[REDACTED]""#),
    (r"Bearer [a-zA-Z0-9._-]+", "Bearer [REDACTED]"),
    (r"Basic [a-zA-Z0-9+/=]+", "Basic [REDACTED]"),
];

struct Rule {
    pattern: Regex,
    kind: &'static str,
    severity: Severity,
}

static RULES: LazyLock<Result<Vec<Rule>, regex::Error>> = LazyLock::new(|| {
    CREDENTIAL_PATTERNS
        .iter()
        .map(|&(pattern, kind, severity)| {
            Ok(Rule {
                pattern: Regex::new(&format!("(?i){pattern}"))?,
                kind,
                severity,
            })
        })
        .collect()
});

static REDACTION_RULES: LazyLock<Result<Vec<(Regex, &'static str)>, regex::Error>> =
    LazyLock::new(|| {
        REDACTIONS
            .iter()
            .map(|&(pattern, replacement)| Ok((Regex::new(pattern)?, replacement)))
            .collect()
    });

fn rules() -> Result<&'static [Rule]> {
    RULES
        .as_ref()
        .map(Vec::as_slice)
        .map_err(|err| anyhow!("invalid credential pattern: {err}"))
}

fn redaction_rules() -> Result<&'static [(Regex, &'static str)]> {
    REDACTION_RULES
        .as_ref()
        .map(Vec::as_slice)
        .map_err(|err| anyhow!("invalid redaction pattern: {err}"))
}

/// One suspected credential. File-level findings carry no line or match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    /// Matched text, truncated to 50 characters plus `...`.
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
    pub description: String,
}

impl Finding {
    fn for_file(file: &str, kind: &str, severity: Severity, description: String) -> Self {
        Self {
            file: file.to_string(),
            line: None,
            kind: kind.to_string(),
            severity,
            matched: None,
            description,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub findings: Vec<Finding>,
    pub scanned_files: usize,
}

impl ScanReport {
    pub fn total(&self) -> usize {
        self.findings.len()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|finding| finding.severity == severity)
            .count()
    }

    fn absorb(&mut self, findings: Vec<Finding>) {
        self.scanned_files += 1;
        self.findings.extend(findings);
    }
}

/// Scan one file's contents; `display` is the path reported in findings.
pub fn scan_file(path: &Path, display: &str) -> Result<Vec<Finding>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let content = String::from_utf8_lossy(&bytes);
    scan_text(&content, display)
}

fn scan_text(content: &str, display: &str) -> Result<Vec<Finding>> {
    if content.to_lowercase().contains(IGNORE_MARKER) {
        return Ok(Vec::new());
    }
    let mut findings = Vec::new();
    for rule in rules()? {
        for found in rule.pattern.find_iter(content) {
            findings.push(Finding {
                file: display.to_string(),
                line: Some(content[..found.start()].matches('\n').count() + 1),
                kind: rule.kind.to_string(),
                severity: rule.severity,
                matched: Some(truncate_match(found.as_str())),
                description: format!("Potential {} detected", rule.kind),
            });
        }
    }
    Ok(findings)
}

fn truncate_match(matched: &str) -> String {
    if matched.chars().count() <= MAX_MATCH_CHARS {
        return matched.to_string();
    }
    let head: String = matched.chars().take(MAX_MATCH_CHARS).collect();
    format!("{head}...")
}

fn is_scannable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SCANNABLE_EXTENSIONS.contains(&ext))
}

/// Scan staged and unstaged files with scannable extensions.
///
/// Outside a git repository there is nothing to scan. Unreadable files are
/// logged and skipped.
#[instrument(skip_all)]
pub fn quick_scan(git: &Git) -> Result<ScanReport> {
    let mut report = ScanReport::default();
    if !git.is_repo() {
        debug!("not a git repository, nothing to scan");
        return Ok(report);
    }
    let status = git.status()?;
    let candidates: BTreeSet<&String> = status.staged.iter().chain(&status.unstaged).collect();
    for relative in candidates {
        let path = git.workdir().join(relative);
        if !path.is_file() || !is_scannable(&path) {
            continue;
        }
        match scan_file(&path, relative) {
            Ok(findings) => report.absorb(findings),
            Err(err) => warn!(file = %relative, error = %format!("{err:#}"), "skipping unreadable file"),
        }
    }
    debug!(
        scanned = report.scanned_files,
        findings = report.total(),
        "quick scan finished"
    );
    Ok(report)
}

/// Result of [`full_scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FullScanReport {
    #[serde(flatten)]
    pub scan: ScanReport,
    pub env_files: Vec<String>,
    pub credential_files: Vec<String>,
}

/// Scan every project file outside the excluded directories.
///
/// `.env*` files (other than templates) are CRITICAL, credential-looking file
/// names are HIGH, and missing `.gitignore` patterns are MEDIUM. Files with a
/// scannable extension are also scanned for credential patterns.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn full_scan(root: &Path) -> Result<FullScanReport> {
    let mut report = FullScanReport::default();
    for relative in project_files(root)? {
        let display = relative.to_string_lossy().into_owned();
        let name = relative
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if is_env_file(&name) {
            report.scan.findings.push(Finding::for_file(
                &display,
                "env_file",
                Severity::Critical,
                ".env file detected".to_string(),
            ));
            report.env_files.push(display.clone());
        }
        if is_credential_file(&relative, &name) {
            report.scan.findings.push(Finding::for_file(
                &display,
                "credential_file",
                Severity::High,
                format!("Potential credential file: {name}"),
            ));
            report.credential_files.push(display.clone());
        }
        if !is_scannable(&relative) {
            continue;
        }
        match scan_file(&root.join(&relative), &display) {
            Ok(findings) => report.scan.absorb(findings),
            Err(err) => {
                let file = &display;
                warn!(file = %file, error = %format!("{err:#}"), "skipping unreadable file");
            }
        }
    }
    report.scan.findings.extend(check_gitignore(root)?);
    debug!(
        scanned = report.scan.scanned_files,
        findings = report.scan.total(),
        "full scan finished"
    );
    Ok(report)
}

/// MEDIUM findings for a missing `.gitignore` or missing security patterns
/// in it.
pub fn check_gitignore(root: &Path) -> Result<Vec<Finding>> {
    let path = root.join(".gitignore");
    if !path.exists() {
        return Ok(vec![Finding::for_file(
            ".gitignore",
            "missing_gitignore",
            Severity::Medium,
            "No .gitignore file found".to_string(),
        )]);
    }
    let contents = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    Ok(GITIGNORE_PATTERNS
        .iter()
        .filter(|pattern| !contents.contains(*pattern))
        .map(|pattern| {
            Finding::for_file(
                ".gitignore",
                "missing_pattern",
                Severity::Medium,
                format!("Missing security pattern: {pattern}"),
            )
        })
        .collect())
}

fn is_env_file(name: &str) -> bool {
    name.starts_with(".env") && !ENV_TEMPLATES.contains(&name)
}

fn is_credential_file(path: &Path, name: &str) -> bool {
    KEY_FILE_NAMES.contains(&name)
        || CREDENTIAL_NAME_PARTS.iter().any(|part| name.contains(part))
        || path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| CREDENTIAL_EXTENSIONS.contains(&ext))
}

fn is_excluded(relative: &Path) -> bool {
    relative.starts_with(EXCLUDED_PREFIX)
        || relative.components().any(|component| {
            component
                .as_os_str()
                .to_str()
                .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
        })
}

/// Regular files under `root`, relative to it and sorted. Symlinks are not
/// followed.
fn project_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![PathBuf::new()];
    while let Some(relative) = pending.pop() {
        let dir = root.join(&relative);
        let entries = fs::read_dir(&dir).with_context(|| format!("read dir {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read dir entry in {}", dir.display()))?;
            let child = relative.join(entry.file_name());
            if is_excluded(&child) {
                continue;
            }
            let file_type = entry
                .file_type()
                .with_context(|| format!("stat {}", root.join(&child).display()))?;
            if file_type.is_dir() {
                pending.push(child);
            } else if file_type.is_file() {
                found.push(child);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Redact credentials in every `*.md` under `dialog_dir`; returns the number
/// of replacements made.
#[instrument(skip_all, fields(dir = %dialog_dir.display()))]
pub fn redact_dialogs(dialog_dir: &Path) -> Result<usize> {
    if !dialog_dir.is_dir() {
        return Ok(0);
    }
    let rules = redaction_rules()?;
    let mut total = 0;
    for path in markdown_files(dialog_dir)? {
        let original =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let mut redacted = original.clone();
        for (pattern, replacement) in rules {
            let hits = pattern.find_iter(&redacted).count();
            if hits > 0 {
                redacted = pattern.replace_all(&redacted, *replacement).into_owned();
                total += hits;
            }
        }
        if redacted != original {
            fs::write(&path, redacted).with_context(|| format!("write {}", path.display()))?;
        }
    }
    Ok(total)
}

/// Recursively list `*.md` files under `dir`.
pub fn markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries =
            fs::read_dir(&current).with_context(|| format!("read dir {}", current.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("read dir entry in {}", current.display()))?
                .path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "md") {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}
