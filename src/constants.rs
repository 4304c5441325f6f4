//! # System Constants
//!
//! Lifecycle event names and system-wide defaults that define the operational
//! boundaries of the invocation layer.

/// Lifecycle events published on the broadcast channel alongside the per-task
/// observer hooks.
pub mod events {
    // Invocation lifecycle (requester side)
    pub const INVOCATION_APPLIED: &str = "invocation.applied";
    pub const INVOCATION_TRIGGERED: &str = "invocation.triggered";
    pub const INVOCATION_UNIQUE: &str = "invocation.unique";
    pub const INVOCATION_TIMEOUT: &str = "invocation.timeout";
    pub const INVOCATION_DEFERRED: &str = "invocation.deferred";

    // Task lifecycle (worker side)
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_SUCCEEDED: &str = "task.succeeded";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_RETRYING: &str = "task.retrying";
    pub const TASK_EXPIRED: &str = "task.expired";
}

/// System-wide defaults applied when neither the caller nor the task
/// definition provides a value.
pub mod system {
    /// Retry bound for handler-requested retries on tasks with no configured
    /// retry policy.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Capacity of the broadcast event channel when the configuration does not
    /// override it.
    pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

    /// Queue used when neither the apply options nor the task definition name
    /// one.
    pub const DEFAULT_QUEUE: &str = "default";

    /// Upper bound on reservation rounds when an owning dedup entry vanishes
    /// between a failed reserve and the follow-up read.
    pub const MAX_RESERVATION_ROUNDS: u32 = 32;
}
