//! Structured error handling for the invocation layer.
//!
//! One top-level [`GateError`] carries everything a caller can observe from the
//! dispatch surface; modules keep their own narrower error enums and convert in
//! at the boundary where the taxonomy requires it.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::queue::TaskFailure;

/// Errors surfaced by the invocation layer.
#[derive(Debug, Error)]
pub enum GateError {
    /// Fatal misconfiguration: unique task without a resolvable stale time
    /// limit, direct handler invocation outside a worker context, re-entrant
    /// use of a consumed context, unknown task name, duplicate registration.
    /// Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A deferred handle was queried before its transaction committed. The
    /// caller asked too early, not the worker too slowly.
    #[error("Task has not been triggered yet")]
    NotYetTriggered,

    /// `get(timeout)` elapsed before the task reached a terminal state. The
    /// task keeps running; only the wait stopped.
    #[error("Timed out waiting for result of task {task_id}")]
    Timeout {
        task_id: Uuid,
        waited: Option<Duration>,
    },

    /// Cache or queue connectivity loss during dispatch, surfaced after one
    /// recovery attempt. Proceeding silently could violate the uniqueness
    /// invariant, so it never does.
    #[error("Transient infrastructure failure during {operation}: {reason}")]
    TransientInfrastructure { operation: String, reason: String },

    /// Worker-side failure, observed through `get()` when the caller chose to
    /// propagate it.
    #[error("Task {task_id} failed: {failure}")]
    Execution { task_id: Uuid, failure: TaskFailure },

    /// A commit-time dispatch failed after `apply_async_on_commit` already
    /// returned its handle; the failure is bound into the handle instead.
    #[error("Deferred dispatch failed: {0}")]
    DeferredDispatchFailed(String),

    /// Argument canonicalization or payload encoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GateError {
    /// Build the transient-infrastructure variant.
    pub fn transient(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        GateError::TransientInfrastructure {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call can ever succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GateError::NotYetTriggered
                | GateError::Timeout { .. }
                | GateError::TransientInfrastructure { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
