//! Atomic cache capability
//!
//! The uniqueness guarantee rests entirely on the backend's atomic
//! "set if absent" primitive. Implementations add no locking of their own.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Errors from the cache backend
///
/// Any error here is fatal to the current dispatch attempt. Falling back to
/// "always unique" or "never unique" when the backend is unreachable would
/// break the uniqueness invariant, so callers must surface these.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend unreachable: {0}")]
    Unavailable(String),

    #[error("Cache operation failed: {0}")]
    Operation(String),
}

/// Atomic "set if absent" store used for dedup entries
///
/// Implementations for shared backends (Redis SET NX PX, Memcached add)
/// map directly onto this contract.
#[async_trait]
pub trait AtomicCache: Send + Sync {
    /// Atomically store `task_id` under `key` with the given TTL unless a
    /// live entry already exists. Returns true when this call created the
    /// entry, meaning the caller now owns the key.
    async fn reserve(&self, key: &str, task_id: Uuid, ttl: Duration) -> Result<bool, CacheError>;

    /// Read the task id currently holding `key`, if any
    async fn read(&self, key: &str) -> Result<Option<Uuid>, CacheError>;

    /// Remove the entry for `key`. Clearing an absent key is a no-op.
    async fn clear(&self, key: &str) -> Result<(), CacheError>;

    /// Backend name for diagnostics
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy)]
struct ReservedEntry {
    task_id: Uuid,
    expires_at: Instant,
}

impl ReservedEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process cache backend
///
/// Suitable for tests and single-process deployments. Expiry is lazy: an
/// expired entry is treated as absent and evicted on the next touch of its
/// key, which is enough because the dedup protocol only ever asks about
/// specific keys.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, ReservedEntry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, counting not-yet-evicted expired ones
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AtomicCache for InMemoryCache {
    async fn reserve(&self, key: &str, task_id: Uuid, ttl: Duration) -> Result<bool, CacheError> {
        let now = Instant::now();
        let entry = ReservedEntry {
            task_id,
            expires_at: now + ttl,
        };

        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    Ok(false)
                } else {
                    occupied.insert(entry);
                    Ok(true)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(entry);
                Ok(true)
            }
        }
    }

    async fn read(&self, key: &str) -> Result<Option<Uuid>, CacheError> {
        let now = Instant::now();
        let current = self.entries.get(key).map(|entry| *entry.value());

        match current {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.task_id)),
            Some(_) => {
                self.entries.remove_if(key, |_, entry| !entry.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn clear(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
