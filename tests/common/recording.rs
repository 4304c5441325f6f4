//! Lifecycle hook implementation that records every callback it sees

#![allow(dead_code)] // Not every test binary uses every helper

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use taskgate_core::invocation::{Invocation, InvocationArgs};
use taskgate_core::queue::TaskFailure;
use taskgate_core::task::LifecycleHooks;

/// Records hook invocations in call order
#[derive(Debug, Default)]
pub struct RecordingHooks {
    calls: Mutex<Vec<String>>,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hook names in the order they fired
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == name).count()
    }

    pub fn saw(&self, name: &str) -> bool {
        self.count(name) > 0
    }

    fn record(&self, name: &str) {
        self.calls.lock().push(name.to_string());
    }
}

#[async_trait]
impl LifecycleHooks for RecordingHooks {
    async fn on_invocation_apply(&self, _invocation: &Invocation) {
        self.record("invocation_apply");
    }

    async fn on_invocation_trigger(&self, _invocation: &Invocation, _task_id: Uuid) {
        self.record("invocation_trigger");
    }

    async fn on_invocation_unique(&self, _invocation: &Invocation, _existing_task_id: Uuid) {
        self.record("invocation_unique");
    }

    async fn on_invocation_timeout(
        &self,
        _invocation_id: Uuid,
        _task_id: Uuid,
        _args: &InvocationArgs,
        _waited: Option<Duration>,
    ) {
        self.record("invocation_timeout");
    }

    async fn on_task_start(&self, _task_id: Uuid, _args: &InvocationArgs) {
        self.record("task_start");
    }

    async fn on_task_retry(
        &self,
        _task_id: Uuid,
        _args: &InvocationArgs,
        _failure: &TaskFailure,
        _next_eta: DateTime<Utc>,
    ) {
        self.record("task_retry");
    }

    async fn on_task_failure(
        &self,
        _task_id: Uuid,
        _args: &InvocationArgs,
        _failure: &TaskFailure,
    ) {
        self.record("task_failure");
    }

    async fn on_task_success(&self, _task_id: Uuid, _args: &InvocationArgs, _result: &Value) {
        self.record("task_success");
    }
}
