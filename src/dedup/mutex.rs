//! Typed veneer over the atomic cache
//!
//! Adds structured logging around the three dedup operations and nothing
//! else. Backend failures pass through loudly; the controller decides how
//! they surface to callers.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::dedup::cache::{AtomicCache, CacheError};

/// Controller-facing handle on the dedup cache
#[derive(Clone)]
pub struct DedupMutex {
    cache: Arc<dyn AtomicCache>,
}

impl DedupMutex {
    pub fn new(cache: Arc<dyn AtomicCache>) -> Self {
        Self { cache }
    }

    /// Attempt to take ownership of `key` for `task_id`.
    ///
    /// Returns true when this call reserved the key. The TTL is the
    /// invocation's stale time limit so an orphaned key self-releases.
    pub async fn reserve(
        &self,
        key: &str,
        task_id: Uuid,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let reserved = self.cache.reserve(key, task_id, ttl).await.map_err(|e| {
            warn!(
                backend = self.cache.name(),
                dedup_key = %key,
                error = %e,
                "Dedup reserve failed"
            );
            e
        })?;

        debug!(
            backend = self.cache.name(),
            dedup_key = %key,
            task_id = %task_id,
            reserved = reserved,
            ttl_secs = ttl.as_secs(),
            "Dedup reserve"
        );
        Ok(reserved)
    }

    /// Read the task id currently owning `key`, if any
    pub async fn current_owner(&self, key: &str) -> Result<Option<Uuid>, CacheError> {
        self.cache.read(key).await.map_err(|e| {
            warn!(
                backend = self.cache.name(),
                dedup_key = %key,
                error = %e,
                "Dedup read failed"
            );
            e
        })
    }

    /// Release `key` after its task reached a terminal state.
    ///
    /// Idempotent; releasing an absent key is a no-op.
    pub async fn release(&self, key: &str) -> Result<(), CacheError> {
        self.cache.clear(key).await.map_err(|e| {
            warn!(
                backend = self.cache.name(),
                dedup_key = %key,
                error = %e,
                "Dedup release failed"
            );
            e
        })?;

        debug!(
            backend = self.cache.name(),
            dedup_key = %key,
            "Dedup key released"
        );
        Ok(())
    }

    /// Backend name for diagnostics
    pub fn backend_name(&self) -> &'static str {
        self.cache.name()
    }
}

impl std::fmt::Debug for DedupMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupMutex")
            .field("backend", &self.cache.name())
            .finish()
    }
}
