//! Protocol engine for an AI-assisted development workflow.
//!
//! Two protocols bracket a working session: `cold-start` prepares the project
//! and detects an unfinished previous session, `completion` scans, commits and
//! closes the session. The crate keeps a strict split:
//!
//! - **[`core`]**: Pure data model (tasks, results) and the readers the
//!   protocols branch on. No I/O.
//! - **[`executor`]**: Runs task batches in parallel or in order, containing
//!   every failure at the task boundary.
//! - **[`io`]**: Side-effecting collaborators (filesystem state, git,
//!   subprocesses, protocol logs).
//!
//! [`protocol`] wires the executors to a [`protocol::TaskCatalog`];
//! [`tasks`] is the catalog that acts on a real project.

pub mod core;
pub mod executor;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod protocol;
pub mod tasks;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
