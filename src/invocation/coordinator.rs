//! # Invocation Coordinator
//!
//! Drives every invocation through the same pipeline regardless of how it was
//! submitted: accept, schedule, deduplicate, dispatch.
//!
//! ## Pipeline
//!
//! 1. **Accept**: resolve the task, freeze an `Invocation` record, fire the
//!    apply hook and event.
//! 2. **Schedule**: fold caller overrides, task definition, and global config
//!    into the effective ETA, time limit, stale time limit, and expiry.
//! 3. **Deduplicate**: for unique tasks, reserve the dedup key or collapse the
//!    invocation onto the task that already holds it.
//! 4. **Dispatch**: hand the frozen request to the queue driver, or run it
//!    inline when the caller (or eager mode) asks for synchronous execution.
//!
//! Deferred submission (`apply_on_commit`) runs accept immediately but parks
//! steps 2-4 behind the commit barrier, binding the resulting handle into the
//! `DeferredHandle` the caller already holds.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::GateConfig;
use crate::constants::{events, system};
use crate::dedup::DedupMutex;
use crate::error::{GateError, Result};
use crate::events::EventPublisher;
use crate::handle::{DeferredHandle, DispatchHandle};
use crate::invocation::options::{ApplyOptions, Invocation, InvocationArgs};
use crate::queue::{DispatchRequest, QueueDriver, QueueError};
use crate::scheduling::time_policy::{
    effective_eta, effective_expires, effective_stale_time_limit, effective_time_limit,
};
use crate::task::{RegisteredTask, TaskRegistry};
use crate::transaction::CommitBarrier;
use crate::worker::TaskExecutor;

/// How a unique-task reservation round ended
enum UniqueResolution {
    /// This invocation now owns the dedup key
    Reserved,
    /// Another live task already holds the key
    Existing(Uuid),
}

/// Central controller for the invocation pipeline
#[derive(Clone)]
pub struct InvocationCoordinator {
    registry: Arc<TaskRegistry>,
    driver: Arc<dyn QueueDriver>,
    executor: Arc<TaskExecutor>,
    dedup: DedupMutex,
    barrier: Arc<dyn CommitBarrier>,
    events: EventPublisher,
    config: Arc<GateConfig>,
}

impl InvocationCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<TaskRegistry>,
        driver: Arc<dyn QueueDriver>,
        executor: Arc<TaskExecutor>,
        dedup: DedupMutex,
        barrier: Arc<dyn CommitBarrier>,
        events: EventPublisher,
        config: Arc<GateConfig>,
    ) -> Self {
        Self {
            registry,
            driver,
            executor,
            dedup,
            barrier,
            events,
            config,
        }
    }

    /// Accept an invocation and carry it through to dispatch
    ///
    /// Returns a handle bound to the dispatched (or already-running, for
    /// collapsed unique invocations) task.
    pub async fn apply(
        &self,
        task_name: &str,
        args: InvocationArgs,
        options: ApplyOptions,
    ) -> Result<DispatchHandle> {
        let task = self.registry.get(task_name)?;
        let invocation = self.accept(&task, args, options).await;
        self.trigger(task, invocation).await
    }

    /// Accept an invocation now, dispatch it when the current transaction commits
    ///
    /// The returned handle is shared with the commit callback; it reports
    /// `NotYetTriggered` until the commit fires and binds it. If the
    /// transaction rolls back the callback is dropped and the handle stays
    /// unbound. With no transaction open the dispatch runs immediately.
    pub async fn apply_on_commit(
        &self,
        task_name: &str,
        args: InvocationArgs,
        options: ApplyOptions,
    ) -> Result<DeferredHandle> {
        let task = self.registry.get(task_name)?;
        let invocation = self.accept(&task, args, options).await;

        self.publish(
            events::INVOCATION_DEFERRED,
            json!({
                "invocation_id": invocation.invocation_id,
                "task_name": invocation.task_name,
            }),
        )
        .await;

        let handle = DeferredHandle::new();
        let bind_into = handle.clone();
        let coordinator = self.clone();
        let invocation_id = invocation.invocation_id;

        self.barrier
            .on_commit(Box::pin(async move {
                match coordinator.trigger(task, invocation).await {
                    Ok(dispatched) => bind_into.bind(dispatched),
                    Err(err) => {
                        error!(
                            invocation_id = %invocation_id,
                            error = %err,
                            "❌ Deferred dispatch failed at commit"
                        );
                        bind_into.bind_error(err.to_string());
                    }
                }
            }))
            .await?;

        Ok(handle)
    }

    /// Step 1: freeze the invocation record and announce it
    async fn accept(
        &self,
        task: &Arc<RegisteredTask>,
        args: InvocationArgs,
        options: ApplyOptions,
    ) -> Invocation {
        let invocation = Invocation {
            invocation_id: options.invocation_id.unwrap_or_else(Uuid::new_v4),
            task_name: task.definition.name.clone(),
            args,
            options,
            applied_at: Utc::now(),
        };

        debug!(
            invocation_id = %invocation.invocation_id,
            task_name = %invocation.task_name,
            "📨 Invocation accepted"
        );

        task.hooks.on_invocation_apply(&invocation).await;
        self.publish(
            events::INVOCATION_APPLIED,
            json!({
                "invocation_id": invocation.invocation_id,
                "task_name": invocation.task_name,
            }),
        )
        .await;

        invocation
    }

    /// Steps 2-4: schedule, deduplicate, and dispatch a frozen invocation
    pub(crate) async fn trigger(
        &self,
        task: Arc<RegisteredTask>,
        invocation: Invocation,
    ) -> Result<DispatchHandle> {
        let definition = &task.definition;
        let trigger_time = Utc::now();
        let task_id = invocation.options.task_id.unwrap_or_else(Uuid::new_v4);

        let time_limit = effective_time_limit(
            invocation.options.time_limit,
            definition.preferred_time_limit(),
            self.config.timing.default_task_time_limit(),
        );
        let eta = effective_eta(
            invocation.options.eta,
            invocation.options.countdown,
            trigger_time,
        );
        let stale_time_limit = effective_stale_time_limit(
            invocation.options.stale_time_limit,
            definition
                .stale_time_limit
                .or(self.config.timing.default_stale_time_limit()),
            time_limit,
            definition
                .max_queue_waiting_time
                .or(self.config.timing.default_max_queue_waiting_time()),
            definition.retry_policy.as_ref(),
        );
        let expires = effective_expires(
            invocation.options.expires,
            stale_time_limit,
            time_limit,
            trigger_time,
        );

        if definition.unique {
            // A unique task with no stale ceiling would hold its dedup key
            // forever after a worker crash. Reject the invocation outright,
            // eager mode included.
            let Some(stale) = stale_time_limit else {
                return Err(GateError::Configuration(format!(
                    "unique task '{}' has no resolvable stale time limit; set stale_time_limit \
                     or both time_limit and max_queue_waiting_time",
                    definition.name
                )));
            };

            if !self.config.execution.always_eager {
                let key = definition.unique_key_generator.dedup_key(
                    &self.config.dedup.key_prefix,
                    &definition.name,
                    &invocation.args,
                )?;

                if let UniqueResolution::Existing(existing) =
                    self.resolve_unique(&key, task_id, stale).await?
                {
                    info!(
                        invocation_id = %invocation.invocation_id,
                        task_name = %invocation.task_name,
                        existing_task_id = %existing,
                        "Invocation collapsed onto running unique task"
                    );
                    task.hooks.on_invocation_unique(&invocation, existing).await;
                    self.publish(
                        events::INVOCATION_UNIQUE,
                        json!({
                            "invocation_id": invocation.invocation_id,
                            "task_name": invocation.task_name,
                            "existing_task_id": existing,
                        }),
                    )
                    .await;

                    return Ok(DispatchHandle::for_driver(
                        invocation.invocation_id,
                        existing,
                        task.clone(),
                        invocation.args.clone(),
                        self.driver.clone(),
                        self.events.clone(),
                    ));
                }
            }
        }

        let queue = invocation
            .options
            .queue
            .clone()
            .or_else(|| definition.queue.clone())
            .unwrap_or_else(|| self.config.queue.default_queue.clone());

        let request = DispatchRequest {
            task_id,
            invocation_id: invocation.invocation_id,
            task_name: definition.name.clone(),
            args: invocation.args.clone(),
            queue,
            eta,
            expires,
            time_limit,
            stale_time_limit,
            attempt: 0,
        };

        let is_async = invocation.options.is_async.unwrap_or(true);
        if !is_async || self.config.execution.always_eager {
            return self.trigger_inline(task, invocation, request).await;
        }

        match self.driver.dispatch(request).await {
            Ok(()) => {}
            Err(QueueError::Connection(reason)) => {
                warn!(
                    task_id = %task_id,
                    driver = self.driver.name(),
                    error = %reason,
                    "Queue connection failed during dispatch, resetting driver"
                );
                // The fresh dedup reservation (if any) stays behind; the stale
                // TTL releases it if the caller never retries.
                if let Err(reset_err) = self.driver.reset().await {
                    warn!(error = %reset_err, "Driver reset failed");
                }
                return Err(GateError::transient("queue dispatch", reason));
            }
            Err(other) => {
                return Err(GateError::transient("queue dispatch", other.to_string()));
            }
        }

        task.hooks.on_invocation_trigger(&invocation, task_id).await;
        self.publish(
            events::INVOCATION_TRIGGERED,
            json!({
                "invocation_id": invocation.invocation_id,
                "task_name": invocation.task_name,
                "task_id": task_id,
                "eta": eta,
            }),
        )
        .await;

        info!(
            invocation_id = %invocation.invocation_id,
            task_name = %invocation.task_name,
            task_id = %task_id,
            "📤 Invocation dispatched"
        );

        Ok(DispatchHandle::for_driver(
            invocation.invocation_id,
            task_id,
            task,
            invocation.args,
            self.driver.clone(),
            self.events.clone(),
        ))
    }

    /// Run the request to completion on the caller's stack
    async fn trigger_inline(
        &self,
        task: Arc<RegisteredTask>,
        invocation: Invocation,
        request: DispatchRequest,
    ) -> Result<DispatchHandle> {
        task.hooks
            .on_invocation_trigger(&invocation, request.task_id)
            .await;
        self.publish(
            events::INVOCATION_TRIGGERED,
            json!({
                "invocation_id": invocation.invocation_id,
                "task_name": invocation.task_name,
                "task_id": request.task_id,
                "inline": true,
            }),
        )
        .await;

        let outcome = self.executor.execute_inline(&request).await;

        Ok(DispatchHandle::for_finished(
            invocation.invocation_id,
            request.task_id,
            task,
            invocation.args,
            outcome,
            self.events.clone(),
        ))
    }

    /// Reserve `key` for `task_id`, or report the task that already holds it
    ///
    /// A failed reservation followed by an empty read means the previous owner
    /// vanished between the two calls, so the next round retries the
    /// reservation. Bounded so a flapping backend cannot spin forever.
    async fn resolve_unique(
        &self,
        key: &str,
        task_id: Uuid,
        ttl: Duration,
    ) -> Result<UniqueResolution> {
        for _round in 0..system::MAX_RESERVATION_ROUNDS {
            let reserved = self
                .dedup
                .reserve(key, task_id, ttl)
                .await
                .map_err(|e| GateError::transient("dedup reserve", e.to_string()))?;
            if reserved {
                return Ok(UniqueResolution::Reserved);
            }

            match self
                .dedup
                .current_owner(key)
                .await
                .map_err(|e| GateError::transient("dedup read", e.to_string()))?
            {
                Some(owner) => return Ok(UniqueResolution::Existing(owner)),
                None => continue,
            }
        }

        Err(GateError::transient(
            "dedup reserve",
            format!(
                "reservation unresolved after {} rounds",
                system::MAX_RESERVATION_ROUNDS
            ),
        ))
    }

    async fn publish(&self, event_name: &str, context: serde_json::Value) {
        if let Err(e) = self.events.publish(event_name, context).await {
            warn!(event = event_name, error = %e, "Event publish failed");
        }
    }
}

impl std::fmt::Debug for InvocationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationCoordinator")
            .field("driver", &self.driver.name())
            .field("dedup", &self.dedup.backend_name())
            .field("registered_tasks", &self.registry.len())
            .finish()
    }
}
