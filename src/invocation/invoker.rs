//! Caller-facing invocation surface
//!
//! Thin facade over the [`InvocationCoordinator`] that fixes the sync/async
//! preference per entry point and folds terminal outcomes into results. All
//! scheduling, dedup, and dispatch behavior lives in the coordinator.

use std::time::Duration;

use crate::error::{GateError, Result};
use crate::handle::{DeferredHandle, DispatchHandle};
use crate::invocation::coordinator::InvocationCoordinator;
use crate::invocation::options::{ApplyOptions, InvocationArgs};
use crate::queue::TaskOutcome;

/// Entry points for submitting task invocations
#[derive(Debug, Clone)]
pub struct TaskInvoker {
    coordinator: InvocationCoordinator,
}

impl TaskInvoker {
    pub fn new(coordinator: InvocationCoordinator) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &InvocationCoordinator {
        &self.coordinator
    }

    /// Submit an invocation, preferring inline execution
    ///
    /// Runs the task on the caller's stack unless the caller explicitly set
    /// `is_async`; the returned handle is already finished in the inline case.
    pub async fn apply(
        &self,
        task_name: &str,
        args: InvocationArgs,
        mut options: ApplyOptions,
    ) -> Result<DispatchHandle> {
        options.is_async.get_or_insert(false);
        self.coordinator.apply(task_name, args, options).await
    }

    /// Submit an invocation, preferring queue dispatch
    pub async fn apply_async(
        &self,
        task_name: &str,
        args: InvocationArgs,
        mut options: ApplyOptions,
    ) -> Result<DispatchHandle> {
        options.is_async.get_or_insert(true);
        self.coordinator.apply(task_name, args, options).await
    }

    /// Submit an invocation that dispatches when the current transaction commits
    pub async fn apply_async_on_commit(
        &self,
        task_name: &str,
        args: InvocationArgs,
        mut options: ApplyOptions,
    ) -> Result<DeferredHandle> {
        options.is_async.get_or_insert(true);
        self.coordinator
            .apply_on_commit(task_name, args, options)
            .await
    }

    /// Dispatch and block on the outcome.
    ///
    /// An elapsed `timeout` surfaces as [`GateError::Timeout`] regardless of
    /// `propagate`; with `propagate`, a task failure surfaces as
    /// [`GateError::Execution`] instead of a `Failure` outcome.
    pub async fn apply_async_and_get_result(
        &self,
        task_name: &str,
        args: InvocationArgs,
        options: ApplyOptions,
        timeout: Option<Duration>,
        propagate: bool,
    ) -> Result<TaskOutcome> {
        let handle = self.apply_async(task_name, args, options).await?;
        let outcome = handle.wait(timeout).await?;

        if propagate {
            if let TaskOutcome::Failure { error } = &outcome {
                return Err(GateError::Execution {
                    task_id: handle.task_id(),
                    failure: error.clone(),
                });
            }
        }

        Ok(outcome)
    }

    /// Fire-and-forget dispatch at commit time
    pub async fn delay_on_commit(&self, task_name: &str, args: InvocationArgs) -> Result<()> {
        self.apply_async_on_commit(task_name, args, ApplyOptions::default())
            .await
            .map(|_| ())
    }
}
