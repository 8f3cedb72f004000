//! Completion protocol: parallel checks, a security gate, then ordered
//! finalization steps.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::outcome::{commit_hash, completion_summary, critical_findings, summarize_errors};
use crate::core::result::{ProtocolResult, TaskResult};
use crate::executor::{run_parallel, run_sequential};
use crate::protocol::{Orchestrator, TaskCatalog, TaskKind, find};

pub const COMPLETION_PROTOCOL: &str = "completion";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionOptions {
    pub skip_review: bool,
    pub skip_commit: bool,
    pub commit_message: Option<String>,
}

/// Phase 1, run in parallel.
pub fn check_tasks() -> Vec<TaskKind> {
    vec![
        TaskKind::BuildCheck,
        TaskKind::DialogExport,
        TaskKind::SecurityScan,
    ]
}

/// Phase 2, run in order; `session_cleanup` is always last.
pub fn finalize_tasks(options: &CompletionOptions) -> Vec<TaskKind> {
    let mut kinds = vec![TaskKind::UpdateMetafiles];
    if !options.skip_review {
        kinds.push(TaskKind::ReviewCheck);
    }
    if !options.skip_commit {
        kinds.push(TaskKind::Commit {
            message: options.commit_message.clone(),
        });
    }
    kinds.push(TaskKind::SessionCleanup);
    kinds
}

impl<C: TaskCatalog> Orchestrator<C> {
    /// Run the checks, stop on critical security findings, then finalize.
    #[instrument(skip_all, fields(protocol = COMPLETION_PROTOCOL))]
    pub fn run_completion(&self, options: &CompletionOptions) -> Result<ProtocolResult> {
        let checks = self.definitions(&check_tasks());
        let mut results = run_parallel(checks, &self.config.completion_options());

        let critical = critical_findings(find(&results, TaskKind::SecurityScan.name()));
        if critical > 0 {
            warn!(critical, "critical security findings, finalization not started");
            let summary =
                format!("CRITICAL security issues found: {critical}. Fix before committing.");
            return Ok(ProtocolResult::error(COMPLETION_PROTOCOL, results, summary));
        }

        let finalize = self.definitions(&finalize_tasks(options));
        results.extend(run_sequential(finalize, self.config.task_timeout()));

        let errors: Vec<&TaskResult> = results.iter().filter(|task| task.is_error()).collect();
        if !errors.is_empty() {
            let summary = format!(
                "Completion failed: {}",
                summarize_errors(errors.iter().copied())
            );
            return Ok(ProtocolResult::error(COMPLETION_PROTOCOL, results, summary));
        }

        let hash = commit_hash(find(&results, "commit"));
        let summary = completion_summary(hash, || self.catalog.changed_file_count());
        info!(summary = %summary, "completion finished");
        Ok(ProtocolResult::success(COMPLETION_PROTOCOL, results, summary))
    }
}
