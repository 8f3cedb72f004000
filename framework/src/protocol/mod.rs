//! Protocol orchestration.
//!
//! The [`Orchestrator`] asks its [`TaskCatalog`] for task definitions, hands
//! them to the executors, and folds the collected results into one
//! [`ProtocolResult`](crate::core::result::ProtocolResult). Two protocols
//! exist: startup (`cold-start`) in [`startup`] and `completion` in
//! [`completion`].

pub mod catalog;
pub mod completion;
pub mod startup;

pub use catalog::{TaskCatalog, TaskKind};
pub use completion::{COMPLETION_PROTOCOL, CompletionOptions};
pub use startup::{STARTUP_PROTOCOL, StartupOptions};

use crate::core::result::TaskResult;
use crate::core::task::TaskDefinition;
use crate::io::config::EngineConfig;

/// Runs protocols against a task catalog.
pub struct Orchestrator<C> {
    catalog: C,
    config: EngineConfig,
}

impl<C: TaskCatalog> Orchestrator<C> {
    pub fn new(catalog: C, config: EngineConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn definitions(&self, kinds: &[TaskKind]) -> Vec<TaskDefinition> {
        kinds
            .iter()
            .map(|kind| {
                self.catalog
                    .definition(kind)
                    .with_policy(kind.failure_policy())
            })
            .collect()
    }
}

fn find<'a>(results: &'a [TaskResult], name: &str) -> Option<&'a TaskResult> {
    results.iter().find(|task| task.name() == name)
}
