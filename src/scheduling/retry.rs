//! # Retry Policy
//!
//! Per-task retry configuration. A task either carries an ordered delay list,
//! where attempt N waits `list[N]` and the list length bounds the attempts, or
//! a flat policy with one delay and an explicit retry cap. The two shapes are
//! mutually exclusive by construction; a task never mixes them.
//!
//! List-indexed backoff lets operators encode arbitrary non-geometric curves
//! (fast-then-slow, for example) without a formula.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy attached to a task definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// Attempt N (0-indexed) waits `delays[N]`; attempts beyond the list get
    /// no automatic delay and the task fails
    DelayList(Vec<Duration>),

    /// Every retry waits the same delay, up to `max_retries` attempts
    Flat { delay: Duration, max_retries: u32 },
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` when retries are exhausted.
    ///
    /// `attempt` counts completed attempts, so the first retry asks with
    /// `attempt == 0`.
    pub fn next_retry_delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            RetryPolicy::DelayList(delays) => delays.get(attempt as usize).copied(),
            RetryPolicy::Flat { delay, max_retries } => {
                (attempt < *max_retries).then_some(*delay)
            }
        }
    }

    /// Maximum number of retries this policy will ever schedule
    pub fn effective_max_retries(&self) -> u32 {
        match self {
            RetryPolicy::DelayList(delays) => delays.len() as u32,
            RetryPolicy::Flat { max_retries, .. } => *max_retries,
        }
    }

    /// True once `attempt` completed attempts leave no further retry
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.effective_max_retries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_policy() -> RetryPolicy {
        RetryPolicy::DelayList(vec![
            Duration::from_secs(10),
            Duration::from_secs(30),
            Duration::from_secs(90),
        ])
    }

    #[test]
    fn delay_list_indexes_by_attempt() {
        let policy = list_policy();
        assert_eq!(policy.next_retry_delay(0), Some(Duration::from_secs(10)));
        assert_eq!(policy.next_retry_delay(1), Some(Duration::from_secs(30)));
        assert_eq!(policy.next_retry_delay(2), Some(Duration::from_secs(90)));
    }

    #[test]
    fn delay_list_exhausts_at_list_length() {
        let policy = list_policy();
        assert_eq!(policy.next_retry_delay(3), None);
        assert_eq!(policy.effective_max_retries(), 3);
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
    }

    #[test]
    fn flat_policy_repeats_until_cap() {
        let policy = RetryPolicy::Flat {
            delay: Duration::from_secs(5),
            max_retries: 2,
        };
        assert_eq!(policy.next_retry_delay(0), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_retry_delay(1), Some(Duration::from_secs(5)));
        assert_eq!(policy.next_retry_delay(2), None);
        assert!(policy.is_exhausted(2));
    }

    #[test]
    fn empty_delay_list_never_retries() {
        let policy = RetryPolicy::DelayList(vec![]);
        assert_eq!(policy.next_retry_delay(0), None);
        assert!(policy.is_exhausted(0));
    }
}
