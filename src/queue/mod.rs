//! # Queue Boundary
//!
//! Types and the driver trait at the boundary with the underlying task
//! queue. The controller hands a fully-resolved `DispatchRequest` to a
//! `QueueDriver` and observes the dispatch afterwards only through states
//! and outcomes; everything broker-specific lives behind the trait.
//!
//! `inprocess` provides the bundled driver: a single-process queue that
//! runs dispatches on the shared executor, honoring eta, expiry, and retry
//! verdicts. Production deployments implement `QueueDriver` against their
//! broker.

pub mod inprocess;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::invocation::InvocationArgs;

pub use inprocess::InProcessQueue;

/// Observable state of one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Not yet eligible to run: parked behind a future eta or an
    /// uncommitted transaction
    Waiting,
    /// Accepted by the queue, not yet picked up by a worker
    Pending,
    /// A worker is running an attempt
    Started,
    /// An attempt failed and another is scheduled
    Retrying,
    /// Terminal success
    Succeeded,
    /// Terminal failure
    Failed,
}

impl DispatchState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Check if a worker currently owns the dispatch
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started | Self::Retrying)
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Pending => write!(f, "pending"),
            Self::Started => write!(f, "started"),
            Self::Retrying => write!(f, "retrying"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DispatchState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "pending" => Ok(Self::Pending),
            "started" => Ok(Self::Started),
            "retrying" => Ok(Self::Retrying),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid dispatch state: {s}")),
        }
    }
}

/// Worker-side failure attached to a Failed dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub message: String,
    pub error_code: Option<String>,
}

impl TaskFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_code: Some(code.into()),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Terminal outcome of a dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    Success { result: serde_json::Value },
    Failure { error: TaskFailure },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn state(&self) -> DispatchState {
        match self {
            Self::Success { .. } => DispatchState::Succeeded,
            Self::Failure { .. } => DispatchState::Failed,
        }
    }
}

/// Fully-resolved dispatch handed to the queue
///
/// Countdown never appears here; the time policy folds it into `eta` before
/// dispatch so the queue sees a single temporal source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub task_id: Uuid,
    pub invocation_id: Uuid,
    pub task_name: String,
    pub args: InvocationArgs,
    pub queue: String,
    pub eta: DateTime<Utc>,
    pub expires: Option<DateTime<Utc>>,
    #[serde(default, with = "crate::utils::serde::duration_secs_opt")]
    pub time_limit: Option<Duration>,
    #[serde(default, with = "crate::utils::serde::duration_secs_opt")]
    pub stale_time_limit: Option<Duration>,
    /// 0-indexed attempt this dispatch starts at
    pub attempt: u32,
}

/// Errors at the queue boundary
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue connection failure: {0}")]
    Connection(String),

    #[error("Queue rejected dispatch: {0}")]
    Rejected(String),

    #[error("Queue does not know task {0}")]
    UnknownTask(Uuid),

    #[error("Timed out waiting for task {0}")]
    WaitTimeout(Uuid),
}

/// Broker abstraction the controller dispatches through
///
/// Implementations must tolerate eventual consistency on reads: a task id
/// this process dispatched may not be visible yet, so `state_of` reports
/// unknown ids as `Pending` rather than failing.
#[async_trait]
pub trait QueueDriver: Send + Sync {
    /// Hand one dispatch to the queue
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), QueueError>;

    /// Currently observed state of a dispatch
    async fn state_of(&self, task_id: Uuid) -> Result<DispatchState, QueueError>;

    /// Terminal outcome, or `None` while the dispatch is still in flight
    async fn outcome_of(&self, task_id: Uuid) -> Result<Option<TaskOutcome>, QueueError>;

    /// Block until the dispatch reaches a terminal state or the timeout
    /// elapses with `QueueError::WaitTimeout`
    async fn wait_for(
        &self,
        task_id: Uuid,
        timeout: Option<Duration>,
    ) -> Result<TaskOutcome, QueueError>;

    /// Recovery action after a connectivity failure, invoked once before the
    /// failure surfaces to the caller. Default does nothing.
    async fn reset(&self) -> Result<(), QueueError> {
        Ok(())
    }

    /// Driver name for diagnostics
    fn name(&self) -> &'static str;
}
