//! Task executor
//!
//! Runs one attempt of a dispatch and classifies the handler's verdict into
//! a terminal outcome or a scheduled retry. This is the single place where
//! terminal states are decided, which is what makes the dedup guarantee
//! hold: the dedup key for a unique task is cleared exactly once, here, when
//! its dispatch reaches Succeeded or Failed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::GateConfig;
use crate::constants::{events, system};
use crate::dedup::DedupMutex;
use crate::events::EventPublisher;
use crate::queue::{DispatchRequest, TaskFailure, TaskOutcome};
use crate::scheduling::time_policy::effective_eta;
use crate::task::{RegisteredTask, TaskContext, TaskError, TaskRegistry};

/// Result of one executed attempt
#[derive(Debug, Clone)]
pub enum ExecutionVerdict {
    /// The dispatch reached a terminal state
    Completed(TaskOutcome),
    /// Another attempt is scheduled at `eta`
    RetryAt {
        eta: DateTime<Utc>,
        next_attempt: u32,
    },
}

/// Shared worker-side executor
///
/// One instance serves every queue driver and the eager path; it owns no
/// per-dispatch state.
pub struct TaskExecutor {
    registry: Arc<TaskRegistry>,
    dedup: DedupMutex,
    events: EventPublisher,
    config: Arc<GateConfig>,
}

impl TaskExecutor {
    pub fn new(
        registry: Arc<TaskRegistry>,
        dedup: DedupMutex,
        events: EventPublisher,
        config: Arc<GateConfig>,
    ) -> Self {
        Self {
            registry,
            dedup,
            events,
            config,
        }
    }

    /// Run one attempt of `request` and classify the handler's verdict
    pub async fn execute(&self, request: &DispatchRequest, attempt: u32) -> ExecutionVerdict {
        let task = match self.registry.lookup(&request.task_name) {
            Some(task) => task,
            None => {
                error!(
                    task_id = %request.task_id,
                    task_name = %request.task_name,
                    "Dispatch names a task this worker does not know"
                );
                return ExecutionVerdict::Completed(TaskOutcome::Failure {
                    error: TaskFailure::with_code(
                        format!("task '{}' is not registered", request.task_name),
                        "unregistered",
                    ),
                });
            }
        };

        let context = TaskContext::for_worker(request.task_id, request.invocation_id, attempt);

        task.hooks.on_task_start(request.task_id, &request.args).await;
        self.publish(
            events::TASK_STARTED,
            json!({
                "task_id": request.task_id,
                "task_name": request.task_name,
                "attempt": attempt,
            }),
        )
        .await;

        debug!(
            task_id = %request.task_id,
            task_name = %request.task_name,
            attempt = attempt,
            "Running task attempt"
        );

        let run = match task.invoke(&context, &request.args).await {
            Ok(run) => run,
            Err(err) => {
                // A context built here always passes the guard; refuse the
                // attempt rather than run the handler outside it.
                return self
                    .finalize_failure(
                        &task,
                        request,
                        attempt,
                        TaskFailure::with_code(err.to_string(), "direct_call"),
                    )
                    .await;
            }
        };

        match run {
            Ok(result) => {
                task.hooks
                    .on_task_success(request.task_id, &request.args, &result)
                    .await;
                self.publish(
                    events::TASK_SUCCEEDED,
                    json!({
                        "task_id": request.task_id,
                        "task_name": request.task_name,
                        "attempt": attempt,
                    }),
                )
                .await;
                self.clear_dedup_entry(&task, request).await;

                info!(
                    task_id = %request.task_id,
                    task_name = %request.task_name,
                    "✅ Task succeeded"
                );
                ExecutionVerdict::Completed(TaskOutcome::Success { result })
            }
            Err(TaskError::Failure {
                message,
                error_code,
            }) => {
                let failure = TaskFailure {
                    message,
                    error_code,
                };
                self.finalize_failure(&task, request, attempt, failure).await
            }
            Err(TaskError::Retry {
                countdown,
                eta,
                message,
            }) => {
                self.classify_retry(&task, request, attempt, countdown, eta, message)
                    .await
            }
        }
    }

    /// Run attempts back to back until a terminal outcome.
    ///
    /// Used by the eager and synchronous paths; retry delays are ignored
    /// because there is no queue to park the dispatch in.
    pub async fn execute_inline(&self, request: &DispatchRequest) -> TaskOutcome {
        let mut attempt = request.attempt;
        loop {
            match self.execute(request, attempt).await {
                ExecutionVerdict::Completed(outcome) => return outcome,
                ExecutionVerdict::RetryAt { next_attempt, .. } => attempt = next_attempt,
            }
        }
    }

    /// Finalize a dispatch whose expires instant passed before pickup
    pub async fn expire(&self, request: &DispatchRequest) -> TaskOutcome {
        let failure = TaskFailure::with_code("task expired before execution", "expired");

        if let Some(task) = self.registry.lookup(&request.task_name) {
            task.hooks
                .on_task_failure(request.task_id, &request.args, &failure)
                .await;
            self.clear_dedup_entry(&task, request).await;
        }

        self.publish(
            events::TASK_EXPIRED,
            json!({
                "task_id": request.task_id,
                "task_name": request.task_name,
                "expires": request.expires,
            }),
        )
        .await;

        warn!(
            task_id = %request.task_id,
            task_name = %request.task_name,
            "Task expired before execution"
        );
        TaskOutcome::Failure { error: failure }
    }

    async fn classify_retry(
        &self,
        task: &Arc<RegisteredTask>,
        request: &DispatchRequest,
        attempt: u32,
        countdown: Option<std::time::Duration>,
        eta: Option<DateTime<Utc>>,
        message: Option<String>,
    ) -> ExecutionVerdict {
        let policy = task.definition.retry_policy.as_ref();

        // Attempts stay bounded even when the handler supplies its own
        // delay. Without a policy, explicit retries get a default cap.
        let max_retries = policy
            .map(|p| p.effective_max_retries())
            .unwrap_or(system::DEFAULT_MAX_RETRIES);
        if attempt >= max_retries {
            return self
                .finalize_failure(
                    task,
                    request,
                    attempt,
                    TaskFailure::with_code(
                        format!("max retries ({max_retries}) exceeded"),
                        "max_retries",
                    ),
                )
                .await;
        }

        let now = Utc::now();
        let next_eta = if eta.is_some() || countdown.is_some() {
            effective_eta(eta, countdown, now)
        } else {
            match policy.and_then(|p| p.next_retry_delay(attempt)) {
                Some(delay) => effective_eta(None, Some(delay), now),
                None => {
                    return self
                        .finalize_failure(
                            task,
                            request,
                            attempt,
                            TaskFailure::with_code(
                                "retry requested but no delay is scheduled for this attempt",
                                "retry_unscheduled",
                            ),
                        )
                        .await;
                }
            }
        };

        let failure = TaskFailure::new(
            message.unwrap_or_else(|| "retry requested".to_string()),
        );
        task.hooks
            .on_task_retry(request.task_id, &request.args, &failure, next_eta)
            .await;
        self.publish(
            events::TASK_RETRYING,
            json!({
                "task_id": request.task_id,
                "task_name": request.task_name,
                "attempt": attempt,
                "next_eta": next_eta,
            }),
        )
        .await;

        info!(
            task_id = %request.task_id,
            task_name = %request.task_name,
            attempt = attempt,
            next_eta = %next_eta,
            "🔄 Task retry scheduled"
        );
        ExecutionVerdict::RetryAt {
            eta: next_eta,
            next_attempt: attempt + 1,
        }
    }

    async fn finalize_failure(
        &self,
        task: &Arc<RegisteredTask>,
        request: &DispatchRequest,
        attempt: u32,
        failure: TaskFailure,
    ) -> ExecutionVerdict {
        task.hooks
            .on_task_failure(request.task_id, &request.args, &failure)
            .await;
        self.publish(
            events::TASK_FAILED,
            json!({
                "task_id": request.task_id,
                "task_name": request.task_name,
                "attempt": attempt,
                "error": failure.message,
                "error_code": failure.error_code,
            }),
        )
        .await;
        self.clear_dedup_entry(task, request).await;

        warn!(
            task_id = %request.task_id,
            task_name = %request.task_name,
            attempt = attempt,
            error = %failure,
            "❌ Task failed"
        );
        ExecutionVerdict::Completed(TaskOutcome::Failure { error: failure })
    }

    /// Release the dedup key once, on the terminal transition.
    ///
    /// Clearing an absent key is a no-op, so this is safe for eager runs
    /// that never reserved one. A backend failure here is logged loudly but
    /// does not change the outcome; the entry's TTL is the backstop.
    async fn clear_dedup_entry(&self, task: &Arc<RegisteredTask>, request: &DispatchRequest) {
        if !task.definition.unique {
            return;
        }

        let key = match task.definition.unique_key_generator.dedup_key(
            &self.config.dedup.key_prefix,
            &task.definition.name,
            &request.args,
        ) {
            Ok(key) => key,
            Err(err) => {
                error!(
                    task_id = %request.task_id,
                    task_name = %request.task_name,
                    error = %err,
                    "Could not derive dedup key for cleanup"
                );
                return;
            }
        };

        if let Err(err) = self.dedup.release(&key).await {
            error!(
                task_id = %request.task_id,
                task_name = %request.task_name,
                dedup_key = %key,
                error = %err,
                "Dedup release failed; entry will expire via its TTL"
            );
        }
    }

    async fn publish(&self, event: &str, context: serde_json::Value) {
        if let Err(err) = self.events.publish(event, context).await {
            warn!(event = event, error = %err, "Event publish failed");
        }
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("dedup", &self.dedup)
            .finish()
    }
}
