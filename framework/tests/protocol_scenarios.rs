//! End-to-end protocol scenarios against a scripted task catalog.
//!
//! Each test drives a full `Orchestrator` run and checks the decision it
//! reaches, the tasks that actually ran, and the aggregated result.

use serde_json::{Value, json};

use framework_core::core::result::{ProtocolResult, ProtocolStatus, TaskStatus};
use framework_core::exit_codes;
use framework_core::io::config::EngineConfig;
use framework_core::io::paths::FrameworkPaths;
use framework_core::io::session::mark_completed;
use framework_core::protocol::{CompletionOptions, Orchestrator, StartupOptions};
use framework_core::tasks::{ProjectContext, ProjectTasks};
use framework_core::test_support::{Script, ScriptedCatalog, TestRepo};

fn run_startup(
    catalog: ScriptedCatalog,
    options: &StartupOptions,
) -> (Orchestrator<ScriptedCatalog>, ProtocolResult) {
    let orchestrator = Orchestrator::new(catalog, EngineConfig::default());
    let result = orchestrator.run_startup(options).expect("startup");
    (orchestrator, result)
}

#[test]
fn crashed_session_asks_the_user() {
    let catalog = ScriptedCatalog::new().with_data(
        "crash_detection",
        json!({
            "crash_detected": true,
            "crash_info": {"task": "Refactor parser", "timestamp": "2026-10-18T21:14:03+02:00"},
        }),
    );
    let (_, result) = run_startup(catalog, &StartupOptions::default());

    assert_eq!(result.status(), ProtocolStatus::UserInputRequired);
    assert_eq!(exit_codes::for_status(result.status()), exit_codes::USER_INPUT_REQUIRED);
    assert!(result.summary().is_none());
    let prompt = result.user_prompt().expect("prompt");
    assert!(prompt.starts_with("Previous session may have crashed."));
    assert!(prompt.contains("Last task: Refactor parser"));
    assert!(prompt.contains("Please choose an option."));

    let json: Value = serde_json::from_str(&result.to_json(false).expect("json")).expect("parse");
    assert_eq!(json["status"], "user_input_required");
    assert!(json.get("summary").is_none());
}

#[test]
fn nine_task_startup_reports_version_and_preset() {
    let catalog = ScriptedCatalog::new()
        .with_version("2.3.1")
        .with_preset("paranoid");
    let (orchestrator, result) = run_startup(
        catalog,
        &StartupOptions {
            skip_update_check: true,
            skip_security_check: false,
        },
    );

    assert_eq!(result.status(), ProtocolStatus::Success);
    assert_eq!(result.tasks().len(), 9);
    assert_eq!(result.summary(), Some("v2.3.1 | Preset: paranoid"));
    assert_eq!(orchestrator.catalog().invoked().len(), 9);
    assert!(result.task("version_check").is_none());
}

#[test]
fn total_duration_is_the_sum_of_task_durations() {
    let catalog = ScriptedCatalog::new()
        .with_script("context_load", Script::Panic("index out of bounds".to_string()))
        .with_failure("commit_policy_verify", "permission denied");
    let (_, result) = run_startup(catalog, &StartupOptions::default());

    let sum: u64 = result.tasks().iter().map(|task| task.duration_ms()).sum();
    assert_eq!(result.total_duration_ms(), sum);
    assert_eq!(result.status(), ProtocolStatus::Error);
    assert_eq!(result.error_count(), 2);
    let panicked = result.task("context_load").expect("context_load");
    assert!(
        panicked
            .error_message()
            .is_some_and(|message| message.contains("index out of bounds"))
    );
}

#[test]
fn critical_findings_block_the_commit() {
    let catalog = ScriptedCatalog::new().with_data(
        "security_scan",
        json!({"total": 3, "critical": 2, "high": 1, "medium": 0, "scanned_files": 4}),
    );
    let orchestrator = Orchestrator::new(catalog, EngineConfig::default());
    let result = orchestrator
        .run_completion(&CompletionOptions::default())
        .expect("completion");

    assert_eq!(result.status(), ProtocolStatus::Error);
    assert!(result.summary().expect("summary").contains('2'));
    let invoked = orchestrator.catalog().invoked();
    for phase_two in ["update_metafiles", "review_check", "commit", "session_cleanup"] {
        assert!(!invoked.iter().any(|name| name == phase_two), "{phase_two} ran");
    }
}

#[test]
fn failed_commit_skips_session_cleanup() {
    let catalog = ScriptedCatalog::new().with_failure("commit", "Commit failed - no hash returned");
    let orchestrator = Orchestrator::new(catalog, EngineConfig::default());
    let result = orchestrator
        .run_completion(&CompletionOptions::default())
        .expect("completion");

    assert_eq!(result.status(), ProtocolStatus::Error);
    assert_eq!(
        result.summary(),
        Some("Completion failed: commit: Commit failed - no hash returned")
    );
    let cleanup = result.task("session_cleanup").expect("session_cleanup");
    assert_eq!(cleanup.status(), TaskStatus::Skipped);
    assert!(
        !orchestrator
            .catalog()
            .invoked()
            .iter()
            .any(|name| name == "session_cleanup")
    );
}

fn task_outcomes(result: &ProtocolResult) -> Vec<(String, TaskStatus)> {
    let mut outcomes: Vec<_> = result
        .tasks()
        .iter()
        .map(|task| (task.name().to_string(), task.status()))
        .collect();
    outcomes.sort_by(|a, b| a.0.cmp(&b.0));
    outcomes
}

#[test]
fn repeated_cold_start_on_unchanged_project_is_stable() {
    let repo = TestRepo::new().expect("repo");
    let paths = FrameworkPaths::new(repo.path());
    let options = StartupOptions {
        skip_update_check: true,
        skip_security_check: false,
    };
    let run = || {
        let ctx = ProjectContext::new(repo.path(), EngineConfig::default()).with_sessions_dir(None);
        let orchestrator = Orchestrator::new(ProjectTasks::new(ctx), EngineConfig::default());
        let result = orchestrator.run_startup(&options).expect("startup");
        mark_completed(&paths.last_session, "between runs").expect("reset session");
        result
    };

    let first = run();
    let second = run();

    assert_eq!(first.status(), ProtocolStatus::Success);
    assert_eq!(second.status(), first.status());
    assert_eq!(second.summary(), first.summary());
    assert_eq!(task_outcomes(&second), task_outcomes(&first));
}
