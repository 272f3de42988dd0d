use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskdag::{
    Executable, Scheduler, SchedulerConfig, TaskContext, TaskError, TaskId, TaskSpec, TaskStatus,
};

fn config() -> SchedulerConfig {
    SchedulerConfig {
        max_concurrent_tasks: 4,
        task_timeout_default: Duration::from_secs(5),
        retry_delay: Duration::from_millis(10),
        event_buffer: 64,
    }
}

async fn wait_for_terminal(scheduler: &Scheduler, id: TaskId) -> TaskStatus {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = scheduler.task_status(id).unwrap();
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {id} to reach a terminal state"))
}

/// Executable that fails the first `failures` attempts, then succeeds.
fn flaky_exec(attempts: &Arc<AtomicU32>, failures: u32) -> Arc<dyn Executable> {
    let attempts = Arc::clone(attempts);
    Arc::new(move |_ctx: TaskContext| {
        let attempts = attempts.clone();
        async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < failures {
                Err(anyhow::anyhow!("attempt {n} failed"))
            } else {
                Ok(serde_json::json!({ "attempt": n }))
            }
        }
    })
}

#[tokio::test]
async fn exhausted_retries_end_in_failed_after_exactly_n_plus_one_attempts() {
    let scheduler = Scheduler::new(config()).unwrap();
    let attempts = Arc::new(AtomicU32::new(0));

    let spec = TaskSpec {
        name: "always-fails".to_string(),
        max_retries: 2,
        ..TaskSpec::default()
    };
    let id = scheduler.create_task(spec).unwrap();
    scheduler.submit(id, flaky_exec(&attempts, u32::MAX)).unwrap();

    assert_eq!(wait_for_terminal(&scheduler, id).await, TaskStatus::Failed);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    let task = scheduler.task_info(id).unwrap();
    assert_eq!(task.retry_count, 2);
    assert!(matches!(task.error, Some(TaskError::Execution(_))));
    assert!(task.completed_at.is_some());

    let result = scheduler.task_result(id).unwrap().unwrap();
    assert!(!result.success);
    assert_eq!(result.metadata["attempt"], serde_json::json!(2));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn transient_failures_recover_within_the_retry_budget() {
    let scheduler = Scheduler::new(config()).unwrap();
    let attempts = Arc::new(AtomicU32::new(0));

    let spec = TaskSpec {
        name: "flaky".to_string(),
        max_retries: 3,
        ..TaskSpec::default()
    };
    let id = scheduler.create_task(spec).unwrap();
    scheduler.submit(id, flaky_exec(&attempts, 2)).unwrap();

    assert_eq!(wait_for_terminal(&scheduler, id).await, TaskStatus::Completed);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);

    let task = scheduler.task_info(id).unwrap();
    assert_eq!(task.retry_count, 2);
    assert_eq!(task.result, Some(serde_json::json!({ "attempt": 2 })));
    assert!(task.error.is_none(), "success clears the transient error");

    scheduler.shutdown().await;
}

#[tokio::test]
async fn retry_waits_for_the_configured_delay() {
    let mut cfg = config();
    cfg.retry_delay = Duration::from_millis(80);
    let scheduler = Scheduler::new(cfg).unwrap();
    let attempts = Arc::new(AtomicU32::new(0));

    let spec = TaskSpec {
        name: "flaky".to_string(),
        max_retries: 1,
        ..TaskSpec::default()
    };
    let started = Instant::now();
    let id = scheduler.create_task(spec).unwrap();
    scheduler.submit(id, flaky_exec(&attempts, 1)).unwrap();

    assert_eq!(wait_for_terminal(&scheduler, id).await, TaskStatus::Completed);
    assert!(
        started.elapsed() >= Duration::from_millis(80),
        "second attempt ran before the retry delay elapsed"
    );

    scheduler.shutdown().await;
}

#[tokio::test]
async fn timeout_is_enforced_and_does_not_wait_for_the_task() {
    let scheduler = Scheduler::new(config()).unwrap();

    let spec = TaskSpec {
        name: "sleepy".to_string(),
        timeout: Some(Duration::from_millis(50)),
        ..TaskSpec::default()
    };
    let id = scheduler.create_task(spec).unwrap();

    let started = Instant::now();
    scheduler
        .submit(
            id,
            Arc::new(|_ctx: TaskContext| async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                anyhow::Ok(serde_json::Value::Null)
            }),
        )
        .unwrap();

    assert_eq!(wait_for_terminal(&scheduler, id).await, TaskStatus::Failed);
    assert!(
        started.elapsed() < Duration::from_millis(400),
        "failure must come from the 50ms timeout, not the 500ms sleep"
    );

    let task = scheduler.task_info(id).unwrap();
    assert_eq!(task.error, Some(TaskError::Timeout(Duration::from_millis(50))));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn default_timeout_from_config_applies_when_spec_has_none() {
    let mut cfg = config();
    cfg.task_timeout_default = Duration::from_millis(50);
    let scheduler = Scheduler::new(cfg).unwrap();

    let id = scheduler.create_task(TaskSpec::named("sleepy")).unwrap();
    scheduler
        .submit(
            id,
            Arc::new(|_ctx: TaskContext| async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                anyhow::Ok(serde_json::Value::Null)
            }),
        )
        .unwrap();

    assert_eq!(wait_for_terminal(&scheduler, id).await, TaskStatus::Failed);
    assert!(matches!(
        scheduler.task_info(id).unwrap().error,
        Some(TaskError::Timeout(_))
    ));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn timed_out_attempts_are_retried_like_any_failure() {
    let scheduler = Scheduler::new(config()).unwrap();
    let attempts = Arc::new(AtomicU32::new(0));

    let spec = TaskSpec {
        name: "slow-then-fast".to_string(),
        max_retries: 1,
        timeout: Some(Duration::from_millis(50)),
        ..TaskSpec::default()
    };
    let id = scheduler.create_task(spec).unwrap();

    let counter = Arc::clone(&attempts);
    scheduler
        .submit(
            id,
            Arc::new(move |_ctx: TaskContext| {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        // First attempt blows through the timeout.
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                    anyhow::Ok(serde_json::Value::Null)
                }
            }),
        )
        .unwrap();

    assert_eq!(wait_for_terminal(&scheduler, id).await, TaskStatus::Completed);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(scheduler.task_info(id).unwrap().retry_count, 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn one_failing_task_does_not_disturb_others() {
    let scheduler = Scheduler::new(config()).unwrap();

    let bad = scheduler.create_task(TaskSpec::named("bad")).unwrap();
    let good = scheduler.create_task(TaskSpec::named("good")).unwrap();

    scheduler
        .submit(
            bad,
            Arc::new(|_ctx: TaskContext| async move {
                Err::<serde_json::Value, _>(anyhow::anyhow!("boom"))
            }),
        )
        .unwrap();
    scheduler
        .submit(
            good,
            Arc::new(|_ctx: TaskContext| async move { anyhow::Ok(serde_json::json!(1)) }),
        )
        .unwrap();

    assert_eq!(wait_for_terminal(&scheduler, bad).await, TaskStatus::Failed);
    assert_eq!(wait_for_terminal(&scheduler, good).await, TaskStatus::Completed);

    scheduler.shutdown().await;
}
