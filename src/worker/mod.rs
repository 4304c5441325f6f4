//! # Worker Execution
//!
//! The shared task executor: one attempt in, one verdict out. Queue drivers
//! call it from their run loops; the eager path calls it inline. All
//! worker-side lifecycle hooks, events, retry classification, and terminal
//! dedup cleanup happen here so every execution path behaves identically.

pub mod executor;

// Re-export key types for convenience
pub use executor::{ExecutionVerdict, TaskExecutor};
