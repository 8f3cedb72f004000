//! Deterministic, pure logic shared by the engine.
//!
//! Core modules must be free of I/O side effects. They define the task and
//! result data model and the readers the protocols use to branch.

pub mod outcome;
pub mod result;
pub mod task;
