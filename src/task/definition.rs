//! Task definitions
//!
//! One `TaskDefinition` per logical task. Definitions are built once at
//! startup, handed to the registry, and never mutated afterwards; everything
//! the time policy and dedup layer need at dispatch time reads from here.

use std::sync::Arc;
use std::time::Duration;

use crate::dedup::key::{DefaultUniqueKeyGenerator, UniqueKeyGenerator};
use crate::scheduling::retry::RetryPolicy;

/// Static configuration for one logical task
#[derive(Clone)]
pub struct TaskDefinition {
    /// Unique task name; doubles as the registry key
    pub name: String,

    /// When true, concurrent invocations with identical arguments collapse
    /// to one underlying execution
    pub unique: bool,

    /// Queue override; `None` falls back to the configured default queue
    pub queue: Option<String>,

    /// Soft time limit, preferred over `time_limit` when resolving the
    /// effective limit
    pub soft_time_limit: Option<Duration>,

    /// Hard time limit
    pub time_limit: Option<Duration>,

    /// Expected worst-case time a dispatch waits in the queue before a
    /// worker picks it up; input to the derived stale time limit
    pub max_queue_waiting_time: Option<Duration>,

    /// Task-level stale time limit; overrides derivation
    pub stale_time_limit: Option<Duration>,

    /// Retry policy, or `None` for no automatic retries
    pub retry_policy: Option<RetryPolicy>,

    /// Dedup key derivation for unique tasks
    pub unique_key_generator: Arc<dyn UniqueKeyGenerator>,
}

impl TaskDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: false,
            queue: None,
            soft_time_limit: None,
            time_limit: None,
            max_queue_waiting_time: None,
            stale_time_limit: None,
            retry_policy: None,
            unique_key_generator: Arc::new(DefaultUniqueKeyGenerator),
        }
    }

    /// Mark the task unique
    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Route dispatches to a specific queue
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Set the soft time limit
    pub fn with_soft_time_limit(mut self, limit: Duration) -> Self {
        self.soft_time_limit = Some(limit);
        self
    }

    /// Set the hard time limit
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Set the expected worst-case queue waiting time
    pub fn with_max_queue_waiting_time(mut self, waiting: Duration) -> Self {
        self.max_queue_waiting_time = Some(waiting);
        self
    }

    /// Set an explicit stale time limit instead of deriving one
    pub fn with_stale_time_limit(mut self, limit: Duration) -> Self {
        self.stale_time_limit = Some(limit);
        self
    }

    /// Attach a retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Replace the default dedup key generator
    pub fn with_unique_key_generator(mut self, generator: Arc<dyn UniqueKeyGenerator>) -> Self {
        self.unique_key_generator = generator;
        self
    }

    /// The limit the time policy treats as this task's own: soft limit
    /// preferred, hard limit as fallback
    pub fn preferred_time_limit(&self) -> Option<Duration> {
        self.soft_time_limit.or(self.time_limit)
    }
}

impl std::fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("unique", &self.unique)
            .field("queue", &self.queue)
            .field("soft_time_limit", &self.soft_time_limit)
            .field("time_limit", &self.time_limit)
            .field("max_queue_waiting_time", &self.max_queue_waiting_time)
            .field("stale_time_limit", &self.stale_time_limit)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_all_fields() {
        let definition = TaskDefinition::new("send_email")
            .with_unique(true)
            .with_queue("notifications")
            .with_soft_time_limit(Duration::from_secs(30))
            .with_time_limit(Duration::from_secs(60))
            .with_max_queue_waiting_time(Duration::from_secs(5))
            .with_retry_policy(RetryPolicy::DelayList(vec![Duration::from_secs(10)]));

        assert_eq!(definition.name, "send_email");
        assert!(definition.unique);
        assert_eq!(definition.queue.as_deref(), Some("notifications"));
        assert_eq!(definition.soft_time_limit, Some(Duration::from_secs(30)));
        assert_eq!(definition.time_limit, Some(Duration::from_secs(60)));
    }

    #[test]
    fn preferred_time_limit_favors_soft_limit() {
        let definition = TaskDefinition::new("t")
            .with_soft_time_limit(Duration::from_secs(30))
            .with_time_limit(Duration::from_secs(60));
        assert_eq!(definition.preferred_time_limit(), Some(Duration::from_secs(30)));

        let hard_only = TaskDefinition::new("t").with_time_limit(Duration::from_secs(60));
        assert_eq!(hard_only.preferred_time_limit(), Some(Duration::from_secs(60)));

        let neither = TaskDefinition::new("t");
        assert_eq!(neither.preferred_time_limit(), None);
    }
}
