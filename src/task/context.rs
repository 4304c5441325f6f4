//! Per-attempt task context
//!
//! Carries the identifiers a handler may read and enforces that handlers
//! only run inside the worker execution path. A context outside that path
//! is marked as called directly and can never be consumed; a worker context
//! is consumed exactly once, so replaying a handler through a stale context
//! also fails.

use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

use crate::error::{GateError, Result};

/// Request context for one task attempt
#[derive(Debug)]
pub struct TaskContext {
    /// Queue-side task id, stable across retries
    pub task_id: Uuid,
    /// Caller-side correlation id from the originating invocation
    pub invocation_id: Uuid,
    /// 0-indexed count of completed attempts before this one
    pub attempt: u32,
    called_directly: bool,
    consumed: AtomicBool,
}

impl TaskContext {
    /// Context for a worker-driven attempt. Only the executor builds these.
    pub(crate) fn for_worker(task_id: Uuid, invocation_id: Uuid, attempt: u32) -> Self {
        Self {
            task_id,
            invocation_id,
            attempt,
            called_directly: false,
            consumed: AtomicBool::new(false),
        }
    }

    /// Context as application code would hold it, outside any worker.
    /// Consuming it always fails; handlers must be reached through `apply`.
    pub fn detached() -> Self {
        Self {
            task_id: Uuid::new_v4(),
            invocation_id: Uuid::new_v4(),
            attempt: 0,
            called_directly: true,
            consumed: AtomicBool::new(false),
        }
    }

    /// True when this context came from the worker execution path
    pub fn is_worker_context(&self) -> bool {
        !self.called_directly
    }

    /// Claim this context for a handler run.
    ///
    /// Fails for directly-held contexts and for contexts already claimed by
    /// an earlier run.
    pub fn consume(&self) -> Result<()> {
        if self.called_directly {
            return Err(GateError::Configuration(
                "task handler invoked outside the worker execution context; \
                 use apply or apply_async instead of calling the handler"
                    .to_string(),
            ));
        }

        if self.consumed.swap(true, Ordering::SeqCst) {
            return Err(GateError::Configuration(format!(
                "task context for task {} was already consumed; \
                 handlers must not be replayed through a spent context",
                self.task_id
            )));
        }

        Ok(())
    }
}
