//! In-process queue driver
//!
//! Runs every dispatch inside the current process on the shared executor.
//! Honors eta, expiry, and retry verdicts the way an external broker would:
//! each dispatch gets its own run loop that sleeps to the eta, drops expired
//! work through the expiry path, and re-schedules on retry verdicts.
//!
//! Rows are retained after completion so late `get()` calls still observe
//! outcomes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::queue::{DispatchRequest, DispatchState, QueueDriver, QueueError, TaskOutcome};
use crate::worker::{ExecutionVerdict, TaskExecutor};

struct DispatchRow {
    state_tx: watch::Sender<DispatchState>,
    outcome: RwLock<Option<TaskOutcome>>,
}

/// Single-process `QueueDriver` backed by the shared executor
pub struct InProcessQueue {
    executor: Arc<TaskExecutor>,
    rows: Arc<DashMap<Uuid, DispatchRow>>,
}

impl InProcessQueue {
    pub fn new(executor: Arc<TaskExecutor>) -> Self {
        Self {
            executor,
            rows: Arc::new(DashMap::new()),
        }
    }

    /// Number of dispatches this driver has accepted
    pub fn dispatched_count(&self) -> usize {
        self.rows.len()
    }

    async fn run_dispatch(
        executor: Arc<TaskExecutor>,
        rows: Arc<DashMap<Uuid, DispatchRow>>,
        request: DispatchRequest,
    ) {
        let task_id = request.task_id;
        let mut attempt = request.attempt;
        let mut next_eta = request.eta;

        loop {
            sleep_until(next_eta).await;

            // Expiry is checked at pickup, the way a broker drops messages
            // whose expires instant passed while queued.
            if request.expires.is_some_and(|expires| Utc::now() >= expires) {
                let outcome = executor.expire(&request).await;
                Self::finalize(&rows, task_id, outcome);
                return;
            }

            Self::set_state(&rows, task_id, DispatchState::Started);

            match executor.execute(&request, attempt).await {
                ExecutionVerdict::Completed(outcome) => {
                    Self::finalize(&rows, task_id, outcome);
                    return;
                }
                ExecutionVerdict::RetryAt { eta, next_attempt } => {
                    Self::set_state(&rows, task_id, DispatchState::Retrying);
                    attempt = next_attempt;
                    next_eta = eta;
                }
            }
        }
    }

    fn set_state(rows: &DashMap<Uuid, DispatchRow>, task_id: Uuid, state: DispatchState) {
        if let Some(row) = rows.get(&task_id) {
            row.state_tx.send_replace(state);
        }
    }

    fn finalize(rows: &DashMap<Uuid, DispatchRow>, task_id: Uuid, outcome: TaskOutcome) {
        let Some(row) = rows.get(&task_id) else {
            warn!(task_id = %task_id, "Finalizing a dispatch with no row");
            return;
        };

        let state = outcome.state();
        // Outcome must be visible before the state notification wakes waiters.
        *row.outcome.write() = Some(outcome);
        row.state_tx.send_replace(state);

        debug!(task_id = %task_id, state = %state, "Dispatch finalized");
    }
}

#[async_trait]
impl QueueDriver for InProcessQueue {
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), QueueError> {
        // Future etas park the dispatch; everything else is ready immediately
        let initial = if request.eta > Utc::now() {
            DispatchState::Waiting
        } else {
            DispatchState::Pending
        };
        let (state_tx, _) = watch::channel(initial);
        self.rows.insert(
            request.task_id,
            DispatchRow {
                state_tx,
                outcome: RwLock::new(None),
            },
        );

        debug!(
            task_id = %request.task_id,
            task_name = %request.task_name,
            queue = %request.queue,
            eta = %request.eta,
            "Dispatch accepted"
        );

        tokio::spawn(Self::run_dispatch(
            self.executor.clone(),
            self.rows.clone(),
            request,
        ));
        Ok(())
    }

    async fn state_of(&self, task_id: Uuid) -> Result<DispatchState, QueueError> {
        // Unknown ids read as Pending: the queue is eventually consistent
        // and a freshly-dispatched id may not be visible yet.
        Ok(self
            .rows
            .get(&task_id)
            .map(|row| *row.state_tx.borrow())
            .unwrap_or(DispatchState::Pending))
    }

    async fn outcome_of(&self, task_id: Uuid) -> Result<Option<TaskOutcome>, QueueError> {
        Ok(self
            .rows
            .get(&task_id)
            .and_then(|row| row.outcome.read().clone()))
    }

    async fn wait_for(
        &self,
        task_id: Uuid,
        timeout: Option<Duration>,
    ) -> Result<TaskOutcome, QueueError> {
        let mut receiver = self
            .rows
            .get(&task_id)
            .map(|row| row.state_tx.subscribe())
            .ok_or(QueueError::UnknownTask(task_id))?;

        let wait = async {
            loop {
                if receiver.borrow_and_update().is_terminal() {
                    break;
                }
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| QueueError::WaitTimeout(task_id))?,
            None => wait.await,
        }

        self.outcome_of(task_id)
            .await?
            .ok_or(QueueError::UnknownTask(task_id))
    }

    fn name(&self) -> &'static str {
        "in_process"
    }
}

async fn sleep_until(eta: DateTime<Utc>) {
    let remaining = (eta - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    if !remaining.is_zero() {
        tokio::time::sleep(remaining).await;
    }
}
