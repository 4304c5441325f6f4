//! # Result Handles
//!
//! What callers hold after `apply`. A `DispatchHandle` wraps a live dispatch
//! (or an already-finished eager run) and exposes state, outcome, and a
//! bounded wait. A `DeferredHandle` stands in for a dispatch deferred to a
//! transaction commit: before the commit fires it holds nothing and `get`
//! fails with `NotYetTriggered`; after the commit the real handle is bound
//! into it and every call proxies through.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::constants::events;
use crate::error::{GateError, Result};
use crate::events::EventPublisher;
use crate::invocation::InvocationArgs;
use crate::queue::{DispatchState, QueueDriver, QueueError, TaskOutcome};
use crate::task::RegisteredTask;

#[derive(Clone)]
enum Backing {
    /// Live dispatch observed through the queue driver
    Driver(Arc<dyn QueueDriver>),
    /// Eager or synchronous run that already finished
    Finished(TaskOutcome),
}

/// Handle on a triggered dispatch
#[derive(Clone)]
pub struct DispatchHandle {
    invocation_id: Uuid,
    task_id: Uuid,
    task: Arc<RegisteredTask>,
    args: InvocationArgs,
    backing: Backing,
    events: EventPublisher,
}

impl DispatchHandle {
    pub(crate) fn for_driver(
        invocation_id: Uuid,
        task_id: Uuid,
        task: Arc<RegisteredTask>,
        args: InvocationArgs,
        driver: Arc<dyn QueueDriver>,
        events: EventPublisher,
    ) -> Self {
        Self {
            invocation_id,
            task_id,
            task,
            args,
            backing: Backing::Driver(driver),
            events,
        }
    }

    pub(crate) fn for_finished(
        invocation_id: Uuid,
        task_id: Uuid,
        task: Arc<RegisteredTask>,
        args: InvocationArgs,
        outcome: TaskOutcome,
        events: EventPublisher,
    ) -> Self {
        Self {
            invocation_id,
            task_id,
            task,
            args,
            backing: Backing::Finished(outcome),
            events,
        }
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn invocation_id(&self) -> Uuid {
        self.invocation_id
    }

    pub fn task_name(&self) -> &str {
        self.task.name()
    }

    /// Currently observed dispatch state
    pub async fn state(&self) -> Result<DispatchState> {
        match &self.backing {
            Backing::Driver(driver) => driver
                .state_of(self.task_id)
                .await
                .map_err(|e| GateError::transient("state query", e.to_string())),
            Backing::Finished(outcome) => Ok(outcome.state()),
        }
    }

    /// Terminal outcome, or `None` while the dispatch is in flight
    pub async fn outcome(&self) -> Result<Option<TaskOutcome>> {
        match &self.backing {
            Backing::Driver(driver) => driver
                .outcome_of(self.task_id)
                .await
                .map_err(|e| GateError::transient("outcome query", e.to_string())),
            Backing::Finished(outcome) => Ok(Some(outcome.clone())),
        }
    }

    /// True once the dispatch succeeded
    pub async fn successful(&self) -> Result<bool> {
        Ok(matches!(
            self.outcome().await?,
            Some(TaskOutcome::Success { .. })
        ))
    }

    /// True once the dispatch failed
    pub async fn failed(&self) -> Result<bool> {
        Ok(matches!(
            self.outcome().await?,
            Some(TaskOutcome::Failure { .. })
        ))
    }

    /// Wait for the terminal outcome without propagating task failure.
    ///
    /// A timeout runs the invocation-timeout hook before surfacing, so
    /// task-specific compensation observes it first.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<TaskOutcome> {
        match &self.backing {
            Backing::Finished(outcome) => Ok(outcome.clone()),
            Backing::Driver(driver) => {
                match driver.wait_for(self.task_id, timeout).await {
                    Ok(outcome) => Ok(outcome),
                    Err(QueueError::WaitTimeout(_)) => {
                        self.fire_timeout(timeout).await;
                        Err(GateError::Timeout {
                            task_id: self.task_id,
                            waited: timeout,
                        })
                    }
                    Err(other) => {
                        Err(GateError::transient("result wait", other.to_string()))
                    }
                }
            }
        }
    }

    /// Wait for the result value, propagating task failure as an error
    pub async fn get(&self, timeout: Option<Duration>) -> Result<serde_json::Value> {
        match self.wait(timeout).await? {
            TaskOutcome::Success { result } => Ok(result),
            TaskOutcome::Failure { error } => Err(GateError::Execution {
                task_id: self.task_id,
                failure: error,
            }),
        }
    }

    /// Run the timeout hook and event exactly once for this elapsed wait
    pub(crate) async fn fire_timeout(&self, waited: Option<Duration>) {
        debug!(
            task_id = %self.task_id,
            invocation_id = %self.invocation_id,
            waited_secs = waited.map(|w| w.as_secs()),
            "Result wait timed out"
        );

        self.task
            .hooks
            .on_invocation_timeout(self.invocation_id, self.task_id, &self.args, waited)
            .await;
        let _ = self
            .events
            .publish(
                events::INVOCATION_TIMEOUT,
                json!({
                    "invocation_id": self.invocation_id,
                    "task_id": self.task_id,
                    "task_name": self.task.name(),
                    "waited_seconds": waited.map(|w| w.as_secs_f64()),
                }),
            )
            .await;
    }
}

impl std::fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backing = match &self.backing {
            Backing::Driver(driver) => driver.name(),
            Backing::Finished(_) => "finished",
        };
        f.debug_struct("DispatchHandle")
            .field("invocation_id", &self.invocation_id)
            .field("task_id", &self.task_id)
            .field("task_name", &self.task.name())
            .field("backing", &backing)
            .finish()
    }
}

enum DeferredSlot {
    /// Commit has not fired yet
    Waiting,
    /// Commit fired and the dispatch was triggered
    Bound(DispatchHandle),
    /// Commit fired but the deferred dispatch failed
    Poisoned(String),
}

/// Handle on a dispatch deferred to a transaction commit
///
/// Cloning shares the slot, so the controller's commit callback binds the
/// triggered handle into every clone at once.
#[derive(Clone)]
pub struct DeferredHandle {
    slot: Arc<RwLock<DeferredSlot>>,
}

impl DeferredHandle {
    pub(crate) fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(DeferredSlot::Waiting)),
        }
    }

    pub(crate) fn bind(&self, handle: DispatchHandle) {
        *self.slot.write() = DeferredSlot::Bound(handle);
    }

    pub(crate) fn bind_error(&self, message: String) {
        *self.slot.write() = DeferredSlot::Poisoned(message);
    }

    /// True once the deferred dispatch has been triggered
    pub fn is_bound(&self) -> bool {
        matches!(&*self.slot.read(), DeferredSlot::Bound(_))
    }

    /// Queue-side task id, known only after binding
    pub fn task_id(&self) -> Option<Uuid> {
        match &*self.slot.read() {
            DeferredSlot::Bound(handle) => Some(handle.task_id()),
            _ => None,
        }
    }

    /// Currently observed state; `Waiting` until the commit fires
    pub async fn state(&self) -> Result<DispatchState> {
        match self.bound_handle() {
            Ok(Some(handle)) => handle.state().await,
            Ok(None) => Ok(DispatchState::Waiting),
            Err(_) => Ok(DispatchState::Failed),
        }
    }

    /// True once the deferred dispatch was triggered and succeeded
    pub async fn successful(&self) -> Result<bool> {
        match self.bound_handle() {
            Ok(Some(handle)) => handle.successful().await,
            Ok(None) | Err(_) => Ok(false),
        }
    }

    /// True once the dispatch failed, in the task or at commit time
    pub async fn failed(&self) -> Result<bool> {
        match self.bound_handle() {
            Ok(Some(handle)) => handle.failed().await,
            Ok(None) => Ok(false),
            Err(_) => Ok(true),
        }
    }

    /// Wait for the terminal outcome without propagating task failure
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<TaskOutcome> {
        self.require_bound()?.wait(timeout).await
    }

    /// Wait for the result value, propagating task failure as an error.
    ///
    /// Before the commit fires this fails immediately with `NotYetTriggered`;
    /// the caller asked too early, which is distinct from a timeout.
    pub async fn get(&self, timeout: Option<Duration>) -> Result<serde_json::Value> {
        self.require_bound()?.get(timeout).await
    }

    fn require_bound(&self) -> Result<DispatchHandle> {
        match self.bound_handle()? {
            Some(handle) => Ok(handle),
            None => Err(GateError::NotYetTriggered),
        }
    }

    fn bound_handle(&self) -> Result<Option<DispatchHandle>> {
        match &*self.slot.read() {
            DeferredSlot::Waiting => Ok(None),
            DeferredSlot::Bound(handle) => Ok(Some(handle.clone())),
            DeferredSlot::Poisoned(message) => {
                Err(GateError::DeferredDispatchFailed(message.clone()))
            }
        }
    }
}

impl std::fmt::Debug for DeferredHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.slot.read() {
            DeferredSlot::Waiting => "waiting",
            DeferredSlot::Bound(_) => "bound",
            DeferredSlot::Poisoned(_) => "poisoned",
        };
        f.debug_struct("DeferredHandle").field("slot", &state).finish()
    }
}
