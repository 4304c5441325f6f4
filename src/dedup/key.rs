//! Dedup key derivation
//!
//! The same task name and canonically-serialized arguments must always yield
//! the same key, across processes and across time. Keys are UUIDv5 over a
//! namespace-prefixed string, so installations sharing one cache backend
//! cannot collide as long as their prefixes differ.

use uuid::Uuid;

use crate::error::Result;
use crate::invocation::InvocationArgs;
use crate::utils::serde::canonical_payload;

/// Derives the dedup cache key for a unique task invocation
///
/// Custom generators can fold in request-scoped state (tenant ids, for
/// example) as long as they stay deterministic for arguments that should
/// collapse to one execution.
pub trait UniqueKeyGenerator: Send + Sync {
    fn dedup_key(&self, prefix: &str, task_name: &str, args: &InvocationArgs) -> Result<String>;
}

/// Default generator: UUIDv5 over `prefix:task_name:canonical(args, kwargs)`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUniqueKeyGenerator;

impl UniqueKeyGenerator for DefaultUniqueKeyGenerator {
    fn dedup_key(&self, prefix: &str, task_name: &str, args: &InvocationArgs) -> Result<String> {
        let payload = canonical_payload(&(&args.args, &args.kwargs))?;
        let name = format!("{prefix}:{task_name}:{payload}");
        Ok(Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes()).to_string())
    }
}
