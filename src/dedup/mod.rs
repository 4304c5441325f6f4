//! # Unique-Task Deduplication
//!
//! Cache-backed mutual exclusion for unique tasks. Concurrent invocations
//! with identical arguments collapse to one underlying execution: the first
//! to atomically reserve the dedup key owns the dispatch, later ones receive
//! a reference to the existing one.
//!
//! ## Architecture
//!
//! - `cache`: the `AtomicCache` capability trait plus an in-process
//!   implementation; production deployments inject a shared backend
//! - `mutex`: the typed veneer the controller talks to, adding logging and
//!   loud failure on an unreachable backend
//! - `key`: deterministic dedup-key derivation from task name and arguments
//!
//! The cache entry's TTL is the invocation's stale time limit, so a key
//! orphaned by a crashed worker releases itself once the task could no
//! longer legitimately be running.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use taskgate_core::dedup::{DedupMutex, InMemoryCache};
//! use uuid::Uuid;
//!
//! # tokio_test::block_on(async {
//! let dedup = DedupMutex::new(Arc::new(InMemoryCache::new()));
//! let owner = Uuid::new_v4();
//! let ttl = Duration::from_secs(60);
//!
//! // First reservation wins, the duplicate observes the existing owner
//! assert!(dedup.reserve("reports.daily:abc", owner, ttl).await.unwrap());
//! assert!(!dedup.reserve("reports.daily:abc", Uuid::new_v4(), ttl).await.unwrap());
//! assert_eq!(dedup.current_owner("reports.daily:abc").await.unwrap(), Some(owner));
//! # });
//! ```

pub mod cache;
pub mod key;
pub mod mutex;

// Re-export key types for convenience
pub use cache::{AtomicCache, CacheError, InMemoryCache};
pub use key::{DefaultUniqueKeyGenerator, UniqueKeyGenerator};
pub use mutex::DedupMutex;
