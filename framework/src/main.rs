//! `framework-core` CLI: runs the session protocols and prints JSON results.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing::warn;

use framework_core::core::result::{ProtocolResult, ProtocolStatus};
use framework_core::exit_codes;
use framework_core::io::config::{EngineConfig, load_config};
use framework_core::io::framework_config::{
    DEFAULT_PRESET, active_preset, is_silent_preset, load_framework_config, preset_definition,
    set_active_preset,
};
use framework_core::io::git::Git;
use framework_core::io::hooks;
use framework_core::io::paths::FrameworkPaths;
use framework_core::io::protocol_log::ProtocolLog;
use framework_core::io::security::{Severity, full_scan};
use framework_core::io::session::read_session;
use framework_core::io::version::{UpdateCheck, check_for_update, current_version};
use framework_core::logging;
use framework_core::protocol::{
    COMPLETION_PROTOCOL, CompletionOptions, Orchestrator, STARTUP_PROTOCOL, StartupOptions,
};
use framework_core::tasks::{ProjectContext, ProjectTasks};

#[derive(Parser)]
#[command(
    name = "framework-core",
    version,
    about = "Session protocols for AI-assisted development"
)]
struct Cli {
    /// Print nothing on success.
    #[arg(short, long, global = true)]
    silent: bool,

    /// Pretty-print JSON output.
    #[arg(short, long, global = true)]
    pretty: bool,

    /// Directory for protocol logs (default: `.claude/logs`).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Project root (default: current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the session startup protocol.
    ColdStart {
        /// Do not look for framework updates.
        #[arg(long)]
        skip_update: bool,
        /// Do not scan changed files for credentials.
        #[arg(long)]
        skip_security: bool,
    },
    /// Run the session completion protocol.
    Completion {
        /// Do not check for changes that need review.
        #[arg(long)]
        skip_review: bool,
        /// Do not create a commit.
        #[arg(long)]
        no_commit: bool,
        /// Commit message (default: generated from the diff).
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Print framework and session state.
    Status,
    /// Scan the whole project for credentials.
    Scan,
    /// Show the active preset, or switch to `NAME`.
    Preset { name: Option<String> },
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let payload = json!({"status": "error", "error": format!("{err:#}")});
            eprintln!("{payload}");
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let paths = FrameworkPaths::new(&root);
    let preset = active_preset(&paths).unwrap_or_else(|err| {
        eprintln!("warning: cannot resolve preset: {err:#}");
        DEFAULT_PRESET.to_string()
    });
    let silent = cli.silent || is_silent_preset(&preset);
    logging::init(silent);

    let config = load_config(&paths.engine_config)?;
    let log = ProtocolLog::new(
        cli.log_dir.clone().unwrap_or_else(|| paths.logs_dir.clone()),
        config.log_max_age_days,
    );

    match cli.command {
        Command::ColdStart {
            skip_update,
            skip_security,
        } => {
            let options = StartupOptions {
                skip_update_check: skip_update,
                skip_security_check: skip_security,
            };
            let orchestrator = orchestrator(&root, config);
            let result = orchestrator.run_startup(&options);
            finish(STARTUP_PROTOCOL, result, &log, silent, cli.pretty)
        }
        Command::Completion {
            skip_review,
            no_commit,
            message,
        } => {
            let options = CompletionOptions {
                skip_review,
                skip_commit: no_commit,
                commit_message: message,
            };
            let orchestrator = orchestrator(&root, config);
            let result = orchestrator.run_completion(&options);
            finish(COMPLETION_PROTOCOL, result, &log, silent, cli.pretty)
        }
        Command::Status => {
            print_json(&status(&paths, &config, &log, &preset)?, cli.pretty)?;
            Ok(exit_codes::OK)
        }
        Command::Scan => {
            let report = full_scan(&root)?;
            let summary = json!({
                "total": report.scan.total(),
                "critical": report.scan.count(Severity::Critical),
                "high": report.scan.count(Severity::High),
                "medium": report.scan.count(Severity::Medium),
            });
            let mut output = serde_json::to_value(&report).context("serialize scan report")?;
            output["summary"] = summary;
            print_json(&output, cli.pretty)?;
            Ok(exit_codes::OK)
        }
        Command::Preset { name: Some(name) } => {
            set_active_preset(&paths, &name)?;
            print_json(&json!({"preset": name}), cli.pretty)?;
            Ok(exit_codes::OK)
        }
        Command::Preset { name: None } => {
            let definition = preset_definition(&paths, &preset)?;
            print_json(
                &json!({"preset": preset, "preset_config": definition}),
                cli.pretty,
            )?;
            Ok(exit_codes::OK)
        }
    }
}

fn orchestrator(root: &Path, config: EngineConfig) -> Orchestrator<ProjectTasks> {
    let tasks = ProjectTasks::new(ProjectContext::new(root, config.clone()));
    Orchestrator::new(tasks, config)
}

/// Rotate and record the log, print the result, and map it to an exit code.
fn finish(
    protocol: &str,
    result: Result<ProtocolResult>,
    log: &ProtocolLog,
    silent: bool,
    pretty: bool,
) -> Result<i32> {
    if let Err(err) = log.rotate() {
        warn!(error = %format!("{err:#}"), "log rotation failed");
    }
    let result = match result {
        Ok(result) => result,
        Err(err) => {
            if let Err(log_err) = log.record_error(protocol, &format!("{err:#}")) {
                warn!(error = %format!("{log_err:#}"), "cannot record engine error");
            }
            return Err(err);
        }
    };
    if let Err(err) = log.record(&result) {
        warn!(error = %format!("{err:#}"), "cannot record protocol result");
    }
    if !(silent && result.status() == ProtocolStatus::Success) {
        println!("{}", result.to_json(pretty)?);
    }
    Ok(exit_codes::for_status(result.status()))
}

/// Days of protocol logs searched for failed tasks by `status`.
const RECENT_ERROR_DAYS: u64 = 7;

/// Snapshot of framework and session state for `status`.
fn status(
    paths: &FrameworkPaths,
    config: &EngineConfig,
    log: &ProtocolLog,
    preset: &str,
) -> Result<Value> {
    let update = check_for_update(paths, config).or_else(|err| {
        warn!(error = %format!("{err:#}"), "update check failed");
        current_version(paths).map(|current_version| UpdateCheck {
            current_version,
            update_available: false,
            latest_version: None,
        })
    })?;
    let session = read_session(&paths.last_session)?;
    let git = Git::new(&paths.root);
    let in_repo = git.is_repo();
    let hooks = in_repo.then(|| hooks::verify_all(&paths.git_hooks_dir));
    let branch = if in_repo { git.current_branch()? } else { None };
    let mut recent_errors = Vec::new();
    for protocol in [STARTUP_PROTOCOL, COMPLETION_PROTOCOL] {
        recent_errors.extend(log.recent_entries(protocol, RECENT_ERROR_DAYS, Some("error"))?);
    }
    Ok(json!({
        "version": update.current_version,
        "update_available": update.update_available,
        "latest_version": update.latest_version,
        "preset": preset,
        "preset_config": preset_definition(paths, preset)?,
        "crash_detected": session.as_ref().is_some_and(|session| session.is_crashed()),
        "last_session": session,
        "hooks": hooks,
        "branch": branch,
        "recent_errors": recent_errors,
        "config": load_framework_config(&paths.framework_config)?,
        "last_run": {
            (STARTUP_PROTOCOL): log.last_summary(STARTUP_PROTOCOL)?,
            (COMPLETION_PROTOCOL): log.last_summary(COMPLETION_PROTOCOL)?,
        },
    }))
}

fn print_json(value: &Value, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("serialize output")?;
    println!("{rendered}");
    Ok(())
}
