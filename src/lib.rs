#![allow(clippy::doc_markdown)] // Allow technical terms like ETAs, UUIDs in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Taskgate Core
//!
//! Client-side invocation layer in front of a distributed task queue: unique-task
//! deduplication, transaction-deferred dispatch, and scheduling-time policy
//! (ETAs, time limits, staleness ceilings, expiry) applied before anything
//! reaches the queue.
//!
//! ## Overview
//!
//! Taskgate sits between application code and whatever actually runs tasks. It
//! does not execute work itself (beyond an inline mode for tests and eager
//! setups); it decides *whether* and *when* a dispatch happens:
//!
//! - **Unique tasks** collapse concurrent invocations with identical arguments
//!   onto one running task through an atomic reservation cache, with a derived
//!   staleness ceiling so a crashed worker can never wedge a key forever.
//! - **Deferred dispatch** parks an invocation behind a transaction-commit
//!   barrier so work tied to uncommitted data is never sent; a rollback simply
//!   drops it.
//! - **Time policy** folds caller overrides, task definition, and global
//!   configuration into one effective ETA, time limit, stale time limit, and
//!   expiry per dispatch.
//! - **List-indexed retry backoff** lets operators encode arbitrary backoff
//!   curves as a plain delay list, one entry per attempt.
//!
//! ## Architecture
//!
//! Every invocation flows through the same pipeline in
//! [`invocation::InvocationCoordinator`]: accept, schedule, deduplicate,
//! dispatch. The queue itself is behind [`queue::QueueDriver`]; the dedup cache
//! behind [`dedup::AtomicCache`]; the transactional datastore behind
//! [`transaction::CommitBarrier`]. In-memory implementations of all three ship
//! with the crate and back the test suite.
//!
//! ## Module Organization
//!
//! - [`invocation`] - Coordinator pipeline and the caller-facing [`invocation::TaskInvoker`]
//! - [`task`] - Task definitions, handlers, lifecycle hooks, registry
//! - [`dedup`] - Atomic reservation cache and unique-key derivation
//! - [`scheduling`] - Pure time-policy and retry-backoff functions
//! - [`queue`] - Queue driver boundary and the in-process driver
//! - [`worker`] - Attempt execution, retry classification, expiry handling
//! - [`handle`] - Result handles for dispatched and deferred invocations
//! - [`transaction`] - Commit barrier and the in-process transaction gate
//! - [`config`] - Layered configuration management
//! - [`events`] - Lifecycle event publishing
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use taskgate_core::config::GateConfig;
//! use taskgate_core::dedup::{DedupMutex, InMemoryCache};
//! use taskgate_core::events::EventPublisher;
//! use taskgate_core::invocation::{
//!     ApplyOptions, InvocationArgs, InvocationCoordinator, TaskInvoker,
//! };
//! use taskgate_core::queue::InProcessQueue;
//! use taskgate_core::task::{TaskDefinition, TaskRegistry};
//! use taskgate_core::transaction::AutoCommit;
//! use taskgate_core::worker::TaskExecutor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(GateConfig::default());
//! let events = EventPublisher::default();
//! let registry = Arc::new(TaskRegistry::new());
//!
//! registry.register_fn(
//!     TaskDefinition::new("notifications.send")
//!         .with_unique(true)
//!         .with_time_limit(Duration::from_secs(30))
//!         .with_max_queue_waiting_time(Duration::from_secs(10)),
//!     |_args| async move { Ok(serde_json::json!({ "delivered": true })) },
//! )?;
//!
//! let dedup = DedupMutex::new(Arc::new(InMemoryCache::new()));
//! let executor = Arc::new(TaskExecutor::new(
//!     registry.clone(),
//!     dedup.clone(),
//!     events.clone(),
//!     config.clone(),
//! ));
//! let queue = Arc::new(InProcessQueue::new(executor.clone()));
//! let coordinator = InvocationCoordinator::new(
//!     registry,
//!     queue,
//!     executor,
//!     dedup,
//!     Arc::new(AutoCommit),
//!     events,
//!     config,
//! );
//! let invoker = TaskInvoker::new(coordinator);
//!
//! let handle = invoker
//!     .apply_async(
//!         "notifications.send",
//!         InvocationArgs::keyword(serde_json::json!({ "user_id": 42 })),
//!         ApplyOptions::default(),
//!     )
//!     .await?;
//! let result = handle.get(Some(Duration::from_secs(5))).await?;
//! println!("task finished with {result}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! The in-process queue, cache, and transaction gate make the full pipeline
//! testable without external services:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # All tests
//! ```

pub mod config;
pub mod constants;
pub mod dedup;
pub mod error;
pub mod events;
pub mod handle;
pub mod invocation;
pub mod logging;
pub mod queue;
pub mod scheduling;
pub mod task;
pub mod transaction;
pub mod utils;
pub mod worker;

pub use config::{ConfigManager, GateConfig};
pub use dedup::{AtomicCache, DedupMutex, InMemoryCache};
pub use error::{GateError, Result};
pub use events::EventPublisher;
pub use handle::{DeferredHandle, DispatchHandle};
pub use invocation::{
    ApplyOptions, Invocation, InvocationArgs, InvocationCoordinator, TaskInvoker,
};
pub use queue::{
    DispatchRequest, DispatchState, InProcessQueue, QueueDriver, TaskFailure, TaskOutcome,
};
pub use scheduling::{Expiry, RetryPolicy};
pub use task::{LifecycleHooks, TaskDefinition, TaskError, TaskHandler, TaskRegistry};
pub use transaction::{AutoCommit, CommitBarrier, TransactionGate};
pub use worker::TaskExecutor;
// Re-export constants events with different name to avoid conflict
pub use constants::events as system_events;
