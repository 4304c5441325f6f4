//! # Lifecycle Events
//!
//! In-process broadcast channel carrying invocation and task lifecycle
//! events. Subscribers observe applies, triggers, dedup hits, timeouts, and
//! worker-side state changes without being wired into the dispatch path.

pub mod publisher;

// Re-export key types for convenience
pub use publisher::{EventPublisher, PublishError, PublishedEvent};
