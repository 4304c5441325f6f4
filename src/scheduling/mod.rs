//! # Scheduling
//!
//! Temporal policy for dispatch decisions. `time_policy` holds the pure
//! functions that resolve effective ETA, time limit, staleness deadline, and
//! expiry for one invocation; `retry` holds the per-task retry policy and the
//! delay lookup used by the worker between attempts.

pub mod retry;
pub mod time_policy;

pub use retry::RetryPolicy;
pub use time_policy::{
    effective_eta, effective_expires, effective_stale_time_limit, effective_time_limit, Expiry,
};
