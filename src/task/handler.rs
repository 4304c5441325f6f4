//! Task handlers
//!
//! The `TaskHandler` trait is the worker-side execution surface. A handler
//! returns its result value, asks for a retry, or fails; the executor turns
//! that verdict into state transitions, hooks, and dedup cleanup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::invocation::InvocationArgs;
use crate::task::context::TaskContext;

/// Outcome of one handler run
pub type TaskResult = std::result::Result<Value, TaskError>;

/// Failure or retry request raised by a handler
#[derive(Debug, Error)]
pub enum TaskError {
    /// The attempt failed. Whether another attempt happens is decided by
    /// the task's retry policy, not by the handler.
    #[error("{message}")]
    Failure {
        message: String,
        error_code: Option<String>,
    },

    /// The handler explicitly requests a retry. An explicit eta overrides
    /// a countdown, and a countdown overrides the policy delay.
    #[error("retry requested")]
    Retry {
        countdown: Option<Duration>,
        eta: Option<DateTime<Utc>>,
        message: Option<String>,
    },
}

impl TaskError {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            error_code: None,
        }
    }

    pub fn failure_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            error_code: Some(code.into()),
        }
    }

    /// Retry with the delay the task's policy schedules for this attempt
    pub fn retry() -> Self {
        Self::Retry {
            countdown: None,
            eta: None,
            message: None,
        }
    }

    /// Retry after a fixed countdown, overriding the policy delay
    pub fn retry_in(countdown: Duration) -> Self {
        Self::Retry {
            countdown: Some(countdown),
            eta: None,
            message: None,
        }
    }

    /// Retry at an absolute instant, overriding everything else
    pub fn retry_at(eta: DateTime<Utc>) -> Self {
        Self::Retry {
            countdown: None,
            eta: Some(eta),
            message: None,
        }
    }
}

/// Worker-side execution logic for one task
///
/// Handlers run only through the guarded call path: `RegisteredTask::invoke`
/// claims the per-attempt context before `run`, so application code holding
/// a detached or spent context never reaches the handler.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, context: &TaskContext, args: &InvocationArgs) -> TaskResult;
}

/// Adapter turning an async closure over the arguments into a handler
///
/// Convenient for tasks that never read the context. Context-aware handlers
/// implement `TaskHandler` directly.
pub struct FnTaskHandler {
    run: Box<dyn Fn(InvocationArgs) -> BoxFuture<'static, TaskResult> + Send + Sync>,
}

impl FnTaskHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(InvocationArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            run: Box::new(move |args| Box::pin(f(args))),
        }
    }
}

#[async_trait]
impl TaskHandler for FnTaskHandler {
    async fn run(&self, _context: &TaskContext, args: &InvocationArgs) -> TaskResult {
        (self.run)(args.clone()).await
    }
}

impl std::fmt::Debug for FnTaskHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTaskHandler").finish()
    }
}
