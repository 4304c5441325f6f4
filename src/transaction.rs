//! # Transaction Gate
//!
//! Deferral of dispatch to a transaction commit boundary. The controller
//! never talks to a database; it hands a commit callback to a
//! `CommitBarrier` and the application decides when (or whether) commits
//! happen. `TransactionGate` is the bundled barrier for applications that
//! manage transaction scopes in code; `AutoCommit` is the barrier for
//! applications with no transactions at all.

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;

/// Work to run when the surrounding transaction commits
pub type CommitCallback = BoxFuture<'static, ()>;

/// Boundary that decides when deferred dispatch callbacks run
#[async_trait]
pub trait CommitBarrier: Send + Sync {
    /// Run `callback` once the current transaction commits; drop it if the
    /// transaction rolls back. With no transaction open, run it immediately.
    async fn on_commit(&self, callback: CommitCallback) -> Result<()>;
}

/// Barrier for callers without transactions; callbacks run immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoCommit;

#[async_trait]
impl CommitBarrier for AutoCommit {
    async fn on_commit(&self, callback: CommitCallback) -> Result<()> {
        callback.await;
        Ok(())
    }
}

struct GateState {
    depth: u32,
    /// Callbacks with the nesting depth they were queued at, so an inner
    /// rollback discards only its own
    queued: Vec<(u32, CommitCallback)>,
}

/// Depth-counted transaction scope with commit-time callback flushing
///
/// `begin`/`commit`/`rollback` mirror nested transaction scopes. Callbacks
/// queue in order and flush in that order when the outermost scope commits.
/// A rollback discards the callbacks queued at or below its depth; callbacks
/// queued in outer scopes survive, matching savepoint semantics.
pub struct TransactionGate {
    inner: Mutex<GateState>,
}

impl TransactionGate {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GateState {
                depth: 0,
                queued: Vec::new(),
            }),
        }
    }

    /// Open a (possibly nested) transaction scope
    pub fn begin(&self) {
        let mut state = self.inner.lock();
        state.depth += 1;
        debug!(depth = state.depth, "Transaction scope opened");
    }

    /// Commit the innermost scope. Queued callbacks run, in queue order,
    /// only when this closes the outermost scope.
    pub async fn commit(&self) {
        let to_run = {
            let mut state = self.inner.lock();
            if state.depth == 0 {
                warn!("commit without an open transaction scope");
                return;
            }
            state.depth -= 1;
            if state.depth == 0 {
                std::mem::take(&mut state.queued)
            } else {
                Vec::new()
            }
        };

        if !to_run.is_empty() {
            debug!(callbacks = to_run.len(), "Flushing commit callbacks");
        }
        for (_, callback) in to_run {
            callback.await;
        }
    }

    /// Roll back the innermost scope, discarding callbacks it queued
    pub fn rollback(&self) {
        let mut state = self.inner.lock();
        if state.depth == 0 {
            warn!("rollback without an open transaction scope");
            return;
        }

        let depth = state.depth;
        let before = state.queued.len();
        state.queued.retain(|(queued_at, _)| *queued_at < depth);
        state.depth -= 1;

        debug!(
            depth = state.depth,
            dropped = before - state.queued.len(),
            "Transaction scope rolled back"
        );
    }

    /// Current nesting depth
    pub fn depth(&self) -> u32 {
        self.inner.lock().depth
    }

    /// True while any scope is open
    pub fn in_transaction(&self) -> bool {
        self.depth() > 0
    }
}

impl Default for TransactionGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommitBarrier for TransactionGate {
    async fn on_commit(&self, callback: CommitCallback) -> Result<()> {
        let immediate = {
            let mut state = self.inner.lock();
            if state.depth > 0 {
                let depth = state.depth;
                state.queued.push((depth, callback));
                None
            } else {
                Some(callback)
            }
        };

        if let Some(callback) = immediate {
            callback.await;
        }
        Ok(())
    }
}

impl std::fmt::Debug for TransactionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("TransactionGate")
            .field("depth", &state.depth)
            .field("queued", &state.queued.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn recording_callback(log: &Arc<Mutex<Vec<usize>>>, id: usize) -> CommitCallback {
        let log = log.clone();
        Box::pin(async move {
            log.lock().push(id);
        })
    }

    #[tokio::test]
    async fn without_transaction_callbacks_run_immediately() {
        let gate = TransactionGate::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = counter.clone();
        gate.on_commit(Box::pin(async move {
            c.fetch_add(1, Ordering::SeqCst);
        }))
        .await
        .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn callbacks_flush_in_order_on_commit() {
        let gate = TransactionGate::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        gate.begin();
        gate.on_commit(recording_callback(&log, 1)).await.unwrap();
        gate.on_commit(recording_callback(&log, 2)).await.unwrap();
        assert!(log.lock().is_empty());

        gate.commit().await;
        assert_eq!(*log.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn rollback_drops_queued_callbacks() {
        let gate = TransactionGate::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        gate.begin();
        gate.on_commit(recording_callback(&log, 1)).await.unwrap();
        gate.rollback();

        assert!(log.lock().is_empty());
        assert!(!gate.in_transaction());

        // A later transaction is unaffected by the dropped callback
        gate.begin();
        gate.on_commit(recording_callback(&log, 2)).await.unwrap();
        gate.commit().await;
        assert_eq!(*log.lock(), vec![2]);
    }

    #[tokio::test]
    async fn nested_commit_defers_to_outermost() {
        let gate = TransactionGate::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        gate.begin();
        gate.begin();
        gate.on_commit(recording_callback(&log, 1)).await.unwrap();
        gate.commit().await;
        assert!(log.lock().is_empty());

        gate.commit().await;
        assert_eq!(*log.lock(), vec![1]);
    }

    #[tokio::test]
    async fn inner_rollback_spares_outer_callbacks() {
        let gate = TransactionGate::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        gate.begin();
        gate.on_commit(recording_callback(&log, 1)).await.unwrap();

        gate.begin();
        gate.on_commit(recording_callback(&log, 2)).await.unwrap();
        gate.rollback();

        gate.commit().await;
        assert_eq!(*log.lock(), vec![1]);
    }

    #[tokio::test]
    async fn unbalanced_calls_are_tolerated() {
        let gate = TransactionGate::new();
        gate.commit().await;
        gate.rollback();
        assert_eq!(gate.depth(), 0);
    }
}
