//! # Time Policy
//!
//! Pure, stateless computation of the temporal fields attached to a dispatch.
//! Every function here is invoked once per invocation at the decision point;
//! `trigger_time` is the wall-clock instant of that decision. Nothing in this
//! module reads the clock or any other ambient state, which keeps the
//! precedence rules directly testable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::scheduling::retry::RetryPolicy;

/// Caller-supplied expiry, either as an absolute instant or relative to the
/// trigger time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expiry {
    /// Expire at an absolute instant
    At(DateTime<Utc>),
    /// Expire this long after the trigger time
    After(Duration),
}

/// Resolve the effective ETA for a dispatch.
///
/// A countdown always wins and is folded into an absolute instant here, so
/// downstream code never sees both; an explicit eta is used as given; with
/// neither, the task is dispatched as soon as possible.
pub fn effective_eta(
    eta: Option<DateTime<Utc>>,
    countdown: Option<Duration>,
    trigger_time: DateTime<Utc>,
) -> DateTime<Utc> {
    match (countdown, eta) {
        (Some(countdown), _) => add_duration(trigger_time, countdown),
        (None, Some(eta)) => eta,
        (None, None) => trigger_time,
    }
}

/// Resolve the effective hard time limit for a dispatch.
///
/// Precedence: caller override, then the task's own limit, then the
/// installation-wide default. `None` means the worker enforces no limit.
pub fn effective_time_limit(
    explicit: Option<Duration>,
    task_limit: Option<Duration>,
    global_default: Option<Duration>,
) -> Option<Duration> {
    explicit.or(task_limit).or(global_default)
}

/// Resolve the staleness deadline for a dispatch.
///
/// After this much time the dedup key must be considered orphaned and
/// released even if the task never reported completion; a crashed worker
/// must not block identical invocations forever. When neither an explicit
/// value nor a task default exists, the deadline is derived as a ceiling
/// over every attempt the retry policy could schedule:
///
/// - delay list: `(time_limit + max_queue_waiting_time) * N + 1s + sum(delays)`
///   where N is the number of scheduled delays
/// - flat policy: `(time_limit + max_queue_waiting_time + delay) * max_retries
///   + time_limit + max_queue_waiting_time`
/// - no retries: `time_limit + max_queue_waiting_time`
///
/// Returns `None` when no value is configured and the derivation inputs are
/// incomplete; callers decide whether that is fatal (it is for unique tasks).
pub fn effective_stale_time_limit(
    explicit: Option<Duration>,
    task_default: Option<Duration>,
    time_limit: Option<Duration>,
    max_queue_waiting_time: Option<Duration>,
    retry_policy: Option<&RetryPolicy>,
) -> Option<Duration> {
    if explicit.is_some() {
        return explicit;
    }
    if task_default.is_some() {
        return task_default;
    }

    let (time_limit, waiting) = match (time_limit, max_queue_waiting_time) {
        (Some(tl), Some(w)) => (tl, w),
        _ => return None,
    };

    let per_attempt = time_limit + waiting;
    let derived = match retry_policy {
        Some(RetryPolicy::DelayList(delays)) => {
            let total_delay: Duration = delays.iter().sum();
            per_attempt * delays.len() as u32 + Duration::from_secs(1) + total_delay
        }
        Some(RetryPolicy::Flat { delay, max_retries }) => {
            (per_attempt + *delay) * *max_retries + per_attempt
        }
        None => per_attempt,
    };

    Some(derived)
}

/// Resolve the queue-side expiry instant for a dispatch.
///
/// An explicit expiry wins. Otherwise, when both the staleness deadline and
/// the time limit are known, the dispatch expires once remaining queue time
/// could no longer fit a full execution: `trigger_time + (stale - time_limit)`.
/// A stale limit below the time limit degenerates to immediate expiry rather
/// than a panic.
pub fn effective_expires(
    explicit: Option<Expiry>,
    stale_time_limit: Option<Duration>,
    time_limit: Option<Duration>,
    trigger_time: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match explicit {
        Some(Expiry::At(instant)) => Some(instant),
        Some(Expiry::After(delta)) => Some(add_duration(trigger_time, delta)),
        None => match (stale_time_limit, time_limit) {
            (Some(stale), Some(limit)) => {
                Some(add_duration(trigger_time, stale.saturating_sub(limit)))
            }
            _ => None,
        },
    }
}

/// Add a std Duration to an instant, saturating instead of panicking on
/// overflow.
fn add_duration(instant: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|delta| instant.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
