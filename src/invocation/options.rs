//! Invocation data
//!
//! `InvocationArgs` carries the positional and keyword arguments as JSON;
//! `ApplyOptions` carries everything a caller may override per invocation;
//! `Invocation` is the read-only record the coordinator and hooks see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::scheduling::Expiry;

/// Positional and keyword arguments for one invocation
///
/// Canonically `args` is a JSON array and `kwargs` a JSON object; the dedup
/// key derivation canonicalizes both, so key order in `kwargs` never affects
/// uniqueness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationArgs {
    pub args: Value,
    pub kwargs: Value,
}

impl InvocationArgs {
    pub fn new(args: Value, kwargs: Value) -> Self {
        Self { args, kwargs }
    }

    pub fn empty() -> Self {
        Self {
            args: json!([]),
            kwargs: json!({}),
        }
    }

    pub fn positional(args: Value) -> Self {
        Self {
            args,
            kwargs: json!({}),
        }
    }

    pub fn keyword(kwargs: Value) -> Self {
        Self {
            args: json!([]),
            kwargs,
        }
    }
}

impl Default for InvocationArgs {
    fn default() -> Self {
        Self::empty()
    }
}

/// Caller-supplied options for one invocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyOptions {
    /// Queue-side task id; generated when absent
    pub task_id: Option<Uuid>,
    /// Correlation id; generated when absent, stable across dispatch retries
    pub invocation_id: Option<Uuid>,
    /// Earliest execution instant
    pub eta: Option<DateTime<Utc>>,
    /// Relative alternative to `eta`; folded into it at trigger time
    #[serde(default, with = "crate::utils::serde::duration_secs_opt")]
    pub countdown: Option<Duration>,
    /// Queue-side expiry
    pub expires: Option<Expiry>,
    /// Per-invocation time limit override
    #[serde(default, with = "crate::utils::serde::duration_secs_opt")]
    pub time_limit: Option<Duration>,
    /// Per-invocation stale time limit override
    #[serde(default, with = "crate::utils::serde::duration_secs_opt")]
    pub stale_time_limit: Option<Duration>,
    /// Queue name override
    pub queue: Option<String>,
    /// Dispatch through the queue (true) or execute inline (false).
    /// Defaults to the calling surface's preference.
    pub is_async: Option<bool>,
}

impl ApplyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task_id(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_invocation_id(mut self, invocation_id: Uuid) -> Self {
        self.invocation_id = Some(invocation_id);
        self
    }

    pub fn with_eta(mut self, eta: DateTime<Utc>) -> Self {
        self.eta = Some(eta);
        self
    }

    pub fn with_countdown(mut self, countdown: Duration) -> Self {
        self.countdown = Some(countdown);
        self
    }

    pub fn with_expires(mut self, expires: Expiry) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_stale_time_limit(mut self, limit: Duration) -> Self {
        self.stale_time_limit = Some(limit);
        self
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn with_is_async(mut self, is_async: bool) -> Self {
        self.is_async = Some(is_async);
        self
    }
}

/// One logical request to run a task, frozen once it enters the coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    pub invocation_id: Uuid,
    pub task_name: String,
    pub args: InvocationArgs,
    pub options: ApplyOptions,
    pub applied_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_constructors() {
        let empty = InvocationArgs::empty();
        assert_eq!(empty.args, json!([]));
        assert_eq!(empty.kwargs, json!({}));

        let positional = InvocationArgs::positional(json!([1, 2]));
        assert_eq!(positional.args, json!([1, 2]));
        assert_eq!(positional.kwargs, json!({}));

        let keyword = InvocationArgs::keyword(json!({"to": "x"}));
        assert_eq!(keyword.args, json!([]));
        assert_eq!(keyword.kwargs, json!({"to": "x"}));
    }

    #[test]
    fn options_builder_round_trip() {
        let options = ApplyOptions::new()
            .with_countdown(Duration::from_secs(30))
            .with_queue("notifications")
            .with_is_async(false);

        assert_eq!(options.countdown, Some(Duration::from_secs(30)));
        assert_eq!(options.queue.as_deref(), Some("notifications"));
        assert_eq!(options.is_async, Some(false));
        assert!(options.eta.is_none());
    }
}
