//! Retry scheduling observed through the full dispatch loop

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use taskgate_core::invocation::{ApplyOptions, InvocationArgs};
use taskgate_core::queue::TaskOutcome;
use taskgate_core::scheduling::RetryPolicy;
use taskgate_core::task::{FnTaskHandler, TaskDefinition, TaskError};

use common::{unique_definition, RecordingHooks, TestGate};

const WAIT: Option<Duration> = Some(Duration::from_secs(5));

/// Register a task that retries until `succeed_at` attempts have failed
fn register_flaky(
    gate: &TestGate,
    definition: TaskDefinition,
    succeed_at: u32,
    hooks: Arc<RecordingHooks>,
) -> Arc<AtomicU32> {
    let executions = Arc::new(AtomicU32::new(0));
    let counter = executions.clone();
    gate.registry
        .register_with_hooks(
            definition,
            Arc::new(FnTaskHandler::new(move |_args| {
                let counter = counter.clone();
                async move {
                    let run = counter.fetch_add(1, Ordering::SeqCst);
                    if run < succeed_at {
                        Err(TaskError::retry())
                    } else {
                        Ok(json!({ "attempts": run + 1 }))
                    }
                }
            })),
            hooks,
        )
        .unwrap();
    executions
}

#[tokio::test(flavor = "multi_thread")]
async fn delay_list_schedules_each_attempt() {
    let gate = TestGate::new();
    let hooks = RecordingHooks::new();
    let executions = register_flaky(
        &gate,
        TaskDefinition::new("retry.list").with_retry_policy(RetryPolicy::DelayList(vec![
            Duration::from_millis(20),
            Duration::from_millis(30),
        ])),
        2,
        hooks.clone(),
    );

    let started = Instant::now();
    let handle = gate
        .invoker
        .apply_async("retry.list", InvocationArgs::empty(), ApplyOptions::default())
        .await
        .unwrap();

    let outcome = handle.wait(WAIT).await.unwrap();
    assert_eq!(
        outcome,
        TaskOutcome::Success {
            result: json!({ "attempts": 3 })
        }
    );
    assert_eq!(executions.load(Ordering::SeqCst), 3);
    assert_eq!(hooks.count("task_retry"), 2);
    assert!(
        started.elapsed() >= Duration::from_millis(50),
        "retried too fast: {:?}",
        started.elapsed()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_delay_list_fails_with_max_retries() {
    let gate = TestGate::new();
    let hooks = RecordingHooks::new();
    let executions = register_flaky(
        &gate,
        TaskDefinition::new("retry.exhausted")
            .with_retry_policy(RetryPolicy::DelayList(vec![Duration::from_millis(10)])),
        u32::MAX,
        hooks.clone(),
    );

    let handle = gate
        .invoker
        .apply_async(
            "retry.exhausted",
            InvocationArgs::empty(),
            ApplyOptions::default(),
        )
        .await
        .unwrap();

    match handle.wait(WAIT).await.unwrap() {
        TaskOutcome::Failure { error } => {
            assert_eq!(error.error_code.as_deref(), Some("max_retries"));
        }
        other => panic!("expected exhaustion failure, got {other:?}"),
    }

    // One scheduled retry, then the bound cut it off
    assert_eq!(executions.load(Ordering::SeqCst), 2);
    assert_eq!(hooks.count("task_retry"), 1);
    assert_eq!(hooks.count("task_failure"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn flat_policy_retries_up_to_max() {
    let gate = TestGate::new();
    let hooks = RecordingHooks::new();
    let executions = register_flaky(
        &gate,
        TaskDefinition::new("retry.flat").with_retry_policy(RetryPolicy::Flat {
            delay: Duration::from_millis(10),
            max_retries: 2,
        }),
        u32::MAX,
        hooks.clone(),
    );

    let handle = gate
        .invoker
        .apply_async("retry.flat", InvocationArgs::empty(), ApplyOptions::default())
        .await
        .unwrap();

    assert!(matches!(
        handle.wait(WAIT).await.unwrap(),
        TaskOutcome::Failure { .. }
    ));
    assert_eq!(executions.load(Ordering::SeqCst), 3);
    assert_eq!(hooks.count("task_retry"), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn explicit_countdown_works_without_a_policy() {
    let gate = TestGate::new();
    let executions = Arc::new(AtomicU32::new(0));
    let counter = executions.clone();
    gate.registry
        .register_fn(TaskDefinition::new("retry.countdown"), move |_args| {
            let counter = counter.clone();
            async move {
                let run = counter.fetch_add(1, Ordering::SeqCst);
                if run < 2 {
                    Err(TaskError::retry_in(Duration::from_millis(15)))
                } else {
                    Ok(json!("recovered"))
                }
            }
        })
        .unwrap();

    let handle = gate
        .invoker
        .apply_async(
            "retry.countdown",
            InvocationArgs::empty(),
            ApplyOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(handle.get(WAIT).await.unwrap(), json!("recovered"));
    assert_eq!(executions.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn policyless_retry_without_delay_fails_unscheduled() {
    let gate = TestGate::new();
    let executions = register_flaky(
        &gate,
        TaskDefinition::new("retry.unscheduled"),
        u32::MAX,
        RecordingHooks::new(),
    );

    let handle = gate
        .invoker
        .apply_async(
            "retry.unscheduled",
            InvocationArgs::empty(),
            ApplyOptions::default(),
        )
        .await
        .unwrap();

    match handle.wait(WAIT).await.unwrap() {
        TaskOutcome::Failure { error } => {
            assert_eq!(error.error_code.as_deref(), Some("retry_unscheduled"));
        }
        other => panic!("expected unscheduled failure, got {other:?}"),
    }
    assert_eq!(executions.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn retry_keeps_the_dedup_key_reserved() {
    let gate = TestGate::new();
    let hooks = RecordingHooks::new();
    let executions = register_flaky(
        &gate,
        unique_definition("retry.unique")
            .with_retry_policy(RetryPolicy::DelayList(vec![Duration::from_millis(150)])),
        1,
        hooks.clone(),
    );

    let args = InvocationArgs::keyword(json!({ "job": "nightly" }));
    let first = gate
        .invoker
        .apply_async("retry.unique", args.clone(), ApplyOptions::default())
        .await
        .unwrap();

    // Wait until the first attempt has failed and the retry is parked
    for _ in 0..50 {
        if executions.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(executions.load(Ordering::SeqCst), 1);

    // Key is still held between attempts, so identical invocations collapse
    let second = gate
        .invoker
        .apply_async("retry.unique", args, ApplyOptions::default())
        .await
        .unwrap();
    assert_eq!(second.task_id(), first.task_id());
    assert_eq!(hooks.count("invocation_unique"), 1);

    assert!(matches!(
        first.wait(WAIT).await.unwrap(),
        TaskOutcome::Success { .. }
    ));
    assert_eq!(executions.load(Ordering::SeqCst), 2);
    assert!(gate.cache.is_empty(), "dedup entry survived completion");
}

#[tokio::test(flavor = "multi_thread")]
async fn eager_retries_run_back_to_back() {
    let gate = TestGate::eager();
    let executions = register_flaky(
        &gate,
        TaskDefinition::new("retry.eager").with_retry_policy(RetryPolicy::DelayList(vec![
            Duration::from_secs(3600),
            Duration::from_secs(3600),
        ])),
        2,
        RecordingHooks::new(),
    );

    let started = Instant::now();
    let handle = gate
        .invoker
        .apply_async("retry.eager", InvocationArgs::empty(), ApplyOptions::default())
        .await
        .unwrap();

    // Hour-long delays are ignored inline
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(handle.successful().await.unwrap());
    assert_eq!(executions.load(Ordering::SeqCst), 3);
}
