//! Startup protocol (`cold-start`): one parallel batch, then a decision.

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::outcome::{crash_info, startup_summary, summarize_errors, update_note};
use crate::core::result::{ProtocolResult, TaskResult};
use crate::executor::run_parallel;
use crate::io::prompt::render_recovery_prompt;
use crate::protocol::{Orchestrator, TaskCatalog, TaskKind, find};

pub const STARTUP_PROTOCOL: &str = "cold-start";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupOptions {
    pub skip_update_check: bool,
    pub skip_security_check: bool,
}

/// Task list for a startup run, in submission order.
pub fn startup_tasks(options: &StartupOptions) -> Vec<TaskKind> {
    let mut kinds = vec![
        TaskKind::MigrationCleanup,
        TaskKind::CrashDetection,
        TaskKind::ConfigInit,
        TaskKind::ContextLoad,
        TaskKind::GitHooksInstall,
        TaskKind::CommitPolicyVerify,
    ];
    if !options.skip_update_check {
        kinds.push(TaskKind::VersionCheck);
    }
    if !options.skip_security_check {
        kinds.push(TaskKind::SecurityCleanup);
    }
    kinds.push(TaskKind::PendingDialogExport);
    kinds.push(TaskKind::SessionActivate);
    kinds
}

impl<C: TaskCatalog> Orchestrator<C> {
    /// Run every startup task in parallel and decide the protocol status.
    ///
    /// A detected crash wins over errors: the caller must ask the user how to
    /// recover before anything else is reported.
    #[instrument(skip_all, fields(protocol = STARTUP_PROTOCOL))]
    pub fn run_startup(&self, options: &StartupOptions) -> Result<ProtocolResult> {
        let tasks = self.definitions(&startup_tasks(options));
        let results = run_parallel(tasks, &self.config.startup_options());

        if let Some(crash) = crash_info(find(&results, TaskKind::CrashDetection.name())) {
            info!(task = %crash.task, "previous session did not close");
            let prompt = render_recovery_prompt(&crash)?;
            return Ok(ProtocolResult::user_input_required(
                STARTUP_PROTOCOL,
                results,
                prompt,
            ));
        }

        let errors: Vec<&TaskResult> = results.iter().filter(|task| task.is_error()).collect();
        if !errors.is_empty() {
            let summary = format!(
                "Cold start completed with {} error(s): {}",
                errors.len(),
                summarize_errors(errors.iter().copied())
            );
            return Ok(ProtocolResult::error(STARTUP_PROTOCOL, results, summary));
        }

        let note = update_note(find(&results, TaskKind::VersionCheck.name()));
        let summary = startup_summary(
            &self.catalog.current_version(),
            note.as_deref(),
            &self.catalog.active_preset(),
        );
        Ok(ProtocolResult::success(STARTUP_PROTOCOL, results, summary))
    }
}
