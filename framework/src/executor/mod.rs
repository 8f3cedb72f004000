//! Batch executors.
//!
//! Both executors share the task boundary in [`boundary`]; they differ only in
//! scheduling and in how a failure affects the rest of the batch.

pub mod boundary;
pub mod parallel;
pub mod sequential;

pub use boundary::run_task;
pub use parallel::{ParallelOptions, run_parallel};
pub use sequential::run_sequential;
