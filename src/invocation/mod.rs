//! # Invocation Layer
//!
//! The caller-facing side of the crate. An invocation is one logical request
//! to run a task; the coordinator drives it through uniqueness resolution,
//! time policy, and dispatch, and the invoker wraps that in the per-task
//! caller surface (`apply`, `apply_async`, `apply_async_on_commit`,
//! `apply_async_and_get_result`).

pub mod coordinator;
pub mod invoker;
pub mod options;

// Re-export key types for convenience
pub use coordinator::InvocationCoordinator;
pub use invoker::TaskInvoker;
pub use options::{ApplyOptions, Invocation, InvocationArgs};
