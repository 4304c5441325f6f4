//! Wired-up invocation gate backed entirely by in-process components

#![allow(dead_code)] // Not every test binary uses every helper

use std::sync::Arc;
use std::time::Duration;

use taskgate_core::config::GateConfig;
use taskgate_core::dedup::{AtomicCache, DedupMutex, InMemoryCache};
use taskgate_core::events::EventPublisher;
use taskgate_core::invocation::{InvocationCoordinator, TaskInvoker};
use taskgate_core::queue::{InProcessQueue, QueueDriver};
use taskgate_core::task::{TaskDefinition, TaskRegistry};
use taskgate_core::transaction::{CommitBarrier, TransactionGate};
use taskgate_core::worker::TaskExecutor;

/// Everything a test needs to drive the full pipeline in one process
pub struct TestGate {
    pub config: Arc<GateConfig>,
    pub events: EventPublisher,
    pub registry: Arc<TaskRegistry>,
    pub cache: Arc<InMemoryCache>,
    pub queue: Arc<InProcessQueue>,
    pub gate: Arc<TransactionGate>,
    pub executor: Arc<TaskExecutor>,
    pub invoker: TaskInvoker,
}

impl TestGate {
    pub fn new() -> Self {
        Self::with_config(GateConfig::default())
    }

    /// Gate with `always_eager` forced on
    pub fn eager() -> Self {
        let mut config = GateConfig::default();
        config.execution.always_eager = true;
        Self::with_config(config)
    }

    pub fn with_config(config: GateConfig) -> Self {
        let cache = Arc::new(InMemoryCache::new());
        Self::assemble(config, cache.clone(), None, cache)
    }

    /// Gate whose dedup cache is replaced by an arbitrary backend
    pub fn with_cache(cache: Arc<dyn AtomicCache>) -> Self {
        Self::assemble(GateConfig::default(), cache, None, Arc::new(InMemoryCache::new()))
    }

    /// Gate whose queue driver is replaced by an arbitrary driver
    pub fn with_driver(driver: Arc<dyn QueueDriver>) -> Self {
        let cache = Arc::new(InMemoryCache::new());
        Self::assemble(GateConfig::default(), cache.clone(), Some(driver), cache)
    }

    fn assemble(
        config: GateConfig,
        cache: Arc<dyn AtomicCache>,
        driver: Option<Arc<dyn QueueDriver>>,
        typed_cache: Arc<InMemoryCache>,
    ) -> Self {
        let config = Arc::new(config);
        let events = EventPublisher::default();
        let registry = Arc::new(TaskRegistry::new());
        let dedup = DedupMutex::new(cache);
        let executor = Arc::new(TaskExecutor::new(
            registry.clone(),
            dedup.clone(),
            events.clone(),
            config.clone(),
        ));
        let queue = Arc::new(InProcessQueue::new(executor.clone()));
        let driver: Arc<dyn QueueDriver> = driver.unwrap_or_else(|| queue.clone() as _);
        let gate = Arc::new(TransactionGate::new());
        let barrier: Arc<dyn CommitBarrier> = gate.clone();
        let coordinator = InvocationCoordinator::new(
            registry.clone(),
            driver,
            executor.clone(),
            dedup,
            barrier,
            events.clone(),
            config.clone(),
        );
        let invoker = TaskInvoker::new(coordinator);

        Self {
            config,
            events,
            registry,
            cache: typed_cache,
            queue,
            gate,
            executor,
            invoker,
        }
    }
}

impl Default for TestGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Definition with limits that derive a stale time limit, so unique tasks work
pub fn definition_with_limits(name: &str) -> TaskDefinition {
    TaskDefinition::new(name)
        .with_time_limit(Duration::from_secs(60))
        .with_max_queue_waiting_time(Duration::from_secs(5))
}

/// Unique-task definition with a derivable stale time limit
pub fn unique_definition(name: &str) -> TaskDefinition {
    definition_with_limits(name).with_unique(true)
}
