//! # Task Model
//!
//! Static task definitions, the registry that owns them, and the worker-side
//! execution surface: handler trait, per-attempt context, and lifecycle
//! hooks.
//!
//! ## Architecture
//!
//! - `definition`: immutable per-task configuration (uniqueness, queue,
//!   limits, retry policy)
//! - `registry`: name-keyed store of definitions with their handlers and
//!   hooks; definitions are frozen once registered
//! - `handler`: the `TaskHandler` trait plus a closure adapter
//! - `context`: per-attempt request context with the direct-invocation guard
//! - `hooks`: observability callbacks around the invocation and task
//!   lifecycle

pub mod context;
pub mod definition;
pub mod handler;
pub mod hooks;
pub mod registry;

// Re-export key types for convenience
pub use context::TaskContext;
pub use definition::TaskDefinition;
pub use handler::{FnTaskHandler, TaskError, TaskHandler, TaskResult};
pub use hooks::{LifecycleHooks, NoopLifecycleHooks};
pub use registry::{RegisteredTask, TaskRegistry};
