//! Lifecycle hooks
//!
//! Observability callbacks around the invocation and task lifecycle. Hooks
//! never influence control flow; the controller proceeds identically whatever
//! a hook does. Every method has a no-op default so implementations override
//! only what they observe.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::invocation::{Invocation, InvocationArgs};
use crate::queue::TaskFailure;

/// Callbacks invoked at fixed points of the lifecycle
///
/// Invocation-side hooks fire on the dispatching side; task-side hooks fire
/// from the worker execution path. On a terminal state exactly one of
/// `on_task_success` / `on_task_failure` fires per dispatch.
#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    /// An invocation was accepted by `apply`, before any dispatch decision
    async fn on_invocation_apply(&self, _invocation: &Invocation) {}

    /// A dispatch was handed to the queue with this task id
    async fn on_invocation_trigger(&self, _invocation: &Invocation, _task_id: Uuid) {}

    /// The invocation collapsed onto an already-running unique task
    async fn on_invocation_unique(&self, _invocation: &Invocation, _existing_task_id: Uuid) {}

    /// A caller's `get(timeout)` elapsed; fires before the timeout error
    /// surfaces so compensation can observe it
    async fn on_invocation_timeout(
        &self,
        _invocation_id: Uuid,
        _task_id: Uuid,
        _args: &InvocationArgs,
        _waited: Option<Duration>,
    ) {
    }

    /// A worker began an attempt
    async fn on_task_start(&self, _task_id: Uuid, _args: &InvocationArgs) {}

    /// An attempt failed and another is scheduled at `next_eta`
    async fn on_task_retry(
        &self,
        _task_id: Uuid,
        _args: &InvocationArgs,
        _failure: &TaskFailure,
        _next_eta: DateTime<Utc>,
    ) {
    }

    /// The task reached the Failed terminal state
    async fn on_task_failure(&self, _task_id: Uuid, _args: &InvocationArgs, _failure: &TaskFailure) {
    }

    /// The task reached the Succeeded terminal state
    async fn on_task_success(&self, _task_id: Uuid, _args: &InvocationArgs, _result: &Value) {}
}

/// Hooks implementation that observes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycleHooks;

#[async_trait]
impl LifecycleHooks for NoopLifecycleHooks {}
