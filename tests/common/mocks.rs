//! Failure-injecting collaborators for exercising infrastructure error paths

#![allow(dead_code)] // Not every test binary uses every helper

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use taskgate_core::dedup::{AtomicCache, CacheError};
use taskgate_core::queue::{DispatchRequest, DispatchState, QueueDriver, QueueError, TaskOutcome};

/// Cache backend that is always down
#[derive(Debug, Default)]
pub struct UnavailableCache {
    calls: AtomicUsize,
}

impl UnavailableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("simulated outage".to_string()))
    }
}

#[async_trait]
impl AtomicCache for UnavailableCache {
    async fn reserve(
        &self,
        _key: &str,
        _task_id: Uuid,
        _ttl: Duration,
    ) -> Result<bool, CacheError> {
        self.fail()
    }

    async fn read(&self, _key: &str) -> Result<Option<Uuid>, CacheError> {
        self.fail()
    }

    async fn clear(&self, _key: &str) -> Result<(), CacheError> {
        self.fail()
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Driver that accepts everything and remembers the requests it saw, for
/// asserting on the shape of what reaches the queue
#[derive(Debug, Default)]
pub struct CapturingDriver {
    requests: parking_lot::Mutex<Vec<DispatchRequest>>,
}

impl CapturingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().clone()
    }

    pub fn last(&self) -> Option<DispatchRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl QueueDriver for CapturingDriver {
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), QueueError> {
        self.requests.lock().push(request);
        Ok(())
    }

    async fn state_of(&self, _task_id: Uuid) -> Result<DispatchState, QueueError> {
        Ok(DispatchState::Pending)
    }

    async fn outcome_of(&self, _task_id: Uuid) -> Result<Option<TaskOutcome>, QueueError> {
        Ok(None)
    }

    async fn wait_for(
        &self,
        task_id: Uuid,
        _timeout: Option<Duration>,
    ) -> Result<TaskOutcome, QueueError> {
        Err(QueueError::WaitTimeout(task_id))
    }

    fn name(&self) -> &'static str {
        "capturing"
    }
}

/// Driver that refuses every dispatch with a connection failure and records
/// how often it was asked to reset
#[derive(Debug, Default)]
pub struct DisconnectedDriver {
    dispatches: AtomicUsize,
    resets: AtomicUsize,
}

impl DisconnectedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch_attempts(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueDriver for DisconnectedDriver {
    async fn dispatch(&self, _request: DispatchRequest) -> Result<(), QueueError> {
        self.dispatches.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::Connection("broker unreachable".to_string()))
    }

    async fn state_of(&self, _task_id: Uuid) -> Result<DispatchState, QueueError> {
        Ok(DispatchState::Pending)
    }

    async fn outcome_of(&self, _task_id: Uuid) -> Result<Option<TaskOutcome>, QueueError> {
        Ok(None)
    }

    async fn wait_for(
        &self,
        task_id: Uuid,
        _timeout: Option<Duration>,
    ) -> Result<TaskOutcome, QueueError> {
        Err(QueueError::WaitTimeout(task_id))
    }

    async fn reset(&self) -> Result<(), QueueError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disconnected"
    }
}
