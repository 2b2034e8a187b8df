use std::time::{Duration, Instant};

use jiff::SignedDuration;

use super::*;
use crate::{
    config::SliceLimits,
    models::{JobStatus, PlanStatus},
    provision::ProvisionCall,
    shutdown::Shutdown,
    testing::{at, planned, planned_with, settings, window, TestEnv},
};

async fn first_due(env: &TestEnv, adjusted_minutes: i64) -> DueJob {
    env.store
        .query_plans_due(at(adjusted_minutes), SignedDuration::from_mins(5))
        .await
        .unwrap()
        .into_iter()
        .next()
        .expect("a job should be due")
}

async fn wait_for_runs(env: &TestEnv, count: usize) {
    for _ in 0..200 {
        if env.provisioner.workloads().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("provisioner never saw {count} runs");
}

#[tokio::test]
async fn test_execute_plan_walks_the_whole_chain() {
    let env = TestEnv::new(10).await;
    let plan_id = env.import(vec![planned("node-a", 0, 150)]).await[0];
    let due = first_due(&env, 10).await;

    let outcome = env
        .executor(settings(), Cancellation::never())
        .execute_plan(due)
        .await
        .expect("Execution failed");

    assert_eq!(outcome.end, PlanEnd::Completed);
    assert_eq!(outcome.jobs_done, 3);
    assert_eq!(outcome.jobs_failed, 0);

    // The first job is prorated for the ten minutes already elapsed
    let budgets: Vec<SignedDuration> = env
        .provisioner
        .workloads()
        .iter()
        .map(|w| w.duration)
        .collect();
    assert_eq!(
        budgets,
        vec![
            SignedDuration::from_mins(50),
            SignedDuration::from_mins(60),
            SignedDuration::from_mins(30)
        ]
    );
    let invoices: Vec<f64> = env
        .provisioner
        .workloads()
        .iter()
        .map(|w| (w.invoice_amount * 1e6).round() / 1e6)
        .collect();
    assert_eq!(invoices, vec![50.0, 60.0, 30.0]);
    assert!(env.provisioner.workloads().iter().all(|w| w.node_id == "node-a"));
    assert_eq!(env.provisioner.outstanding_units(), 0);

    let plan = env.store.get_plan(plan_id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
    assert!(plan.jobs.iter().all(|j| j.status == JobStatus::Done));
}

#[tokio::test]
async fn test_failed_job_is_recorded_and_chain_continues() {
    let env = TestEnv::new(10).await;
    let plan_id = env.import(vec![planned("node-a", 0, 150)]).await[0];
    env.provisioner.push_exit_code(2);

    let outcome = env
        .executor(settings(), Cancellation::never())
        .execute_plan(first_due(&env, 10).await)
        .await
        .unwrap();

    assert_eq!(outcome.jobs_failed, 1);
    assert_eq!(outcome.jobs_done, 2);
    assert_eq!(outcome.end, PlanEnd::Completed);

    let plan = env.store.get_plan(plan_id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(plan.jobs[0].status, JobStatus::Failed);
    assert!(plan.jobs[0]
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("code 2")));
    assert_eq!(plan.jobs[1].status, JobStatus::Done);
    // Failures are not retried
    assert_eq!(env.provisioner.workloads().len(), 3);
}

#[tokio::test]
async fn test_acquire_failure_marks_job_failed() {
    let env = TestEnv::new(10).await;
    let plan_id = env.import(vec![planned("node-a", 0, 60)]).await[0];
    env.provisioner.set_acquire_error(Some("no capacity"));

    let outcome = env
        .executor(settings(), Cancellation::never())
        .execute_plan(first_due(&env, 10).await)
        .await
        .unwrap();

    assert_eq!(outcome.jobs_failed, 1);
    assert!(env.provisioner.workloads().is_empty());

    let plan = env.store.get_plan(plan_id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
    assert!(plan.jobs[0]
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("no capacity")));
}

#[tokio::test]
async fn test_job_below_minimum_at_dispatch_is_not_started() {
    // Jobs of 60 and 5 minutes; the second is handed over with 2 minutes left
    let env = TestEnv::new(63).await;
    let plan_id = env.import(vec![planned("node-a", 0, 65)]).await[0];
    let late = env
        .store
        .query_next_job(plan_id, 0, at(63))
        .await
        .unwrap()
        .expect("second job exists");

    let outcome = env
        .executor(settings(), Cancellation::never())
        .execute_plan(late)
        .await
        .unwrap();

    assert_eq!(outcome.jobs_failed, 1);
    assert!(env.provisioner.calls().is_empty());

    let plan = env.store.get_plan(plan_id).await.unwrap().unwrap();
    assert_eq!(plan.jobs[1].status, JobStatus::Failed);
    assert!(plan.jobs[1]
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("below the minimum")));
    assert_eq!(plan.status, PlanStatus::Completed);
}

#[tokio::test]
async fn test_cancellation_resets_running_job_and_keeps_plan_active() {
    let env = TestEnv::new(10).await;
    let plan_id = env.import(vec![planned("node-a", 0, 150)]).await[0];
    env.provisioner.hold_runs(true);

    let shutdown = Shutdown::new();
    let executor = env.executor(settings(), shutdown.cancellation());
    let due = first_due(&env, 10).await;
    let handle = tokio::spawn(async move { executor.execute_plan(due).await });

    wait_for_runs(&env, 1).await;
    shutdown.trigger();

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome.end, PlanEnd::Interrupted);
    assert_eq!(outcome.jobs_done, 0);
    assert_eq!(env.provisioner.outstanding_units(), 0);

    let plan = env.store.get_plan(plan_id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Active);
    assert!(plan.jobs.iter().all(|j| j.status == JobStatus::Pending));

    // The interrupted job is due again for the next process
    let due = env
        .store
        .query_plans_due(at(10), SignedDuration::from_mins(5))
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
}

#[tokio::test]
async fn test_unit_acquired_during_shutdown_is_released() {
    let env = TestEnv::new(10).await;
    let plan_id = env.import(vec![planned("node-a", 0, 60)]).await[0];
    env.provisioner
        .set_acquire_delay(Some(Duration::from_millis(300)));

    let shutdown = Shutdown::new();
    let executor = env.executor(settings(), shutdown.cancellation());
    let due = first_due(&env, 10).await;
    let handle = tokio::spawn(async move { executor.execute_plan(due).await });

    // Cancel while the acquire is still in flight
    for _ in 0..200 {
        if !env.provisioner.calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    shutdown.trigger();

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome.end, PlanEnd::Interrupted);
    assert!(env.provisioner.workloads().is_empty());
    assert_eq!(env.provisioner.outstanding_units(), 0);
    assert!(env
        .provisioner
        .calls()
        .iter()
        .any(|call| matches!(call, ProvisionCall::Release { .. })));

    let plan = env.store.get_plan(plan_id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Active);
    assert_eq!(plan.jobs[0].status, JobStatus::Pending);
}

#[tokio::test]
async fn test_release_follows_every_run() {
    let env = TestEnv::new(10).await;
    env.import(vec![planned("node-a", 0, 120)]).await;

    env.executor(settings(), Cancellation::never())
        .execute_plan(first_due(&env, 10).await)
        .await
        .unwrap();

    let kinds: Vec<&str> = env
        .provisioner
        .calls()
        .iter()
        .map(|call| match call {
            ProvisionCall::Acquire { .. } => "acquire",
            ProvisionCall::Run { .. } => "run",
            ProvisionCall::Release { .. } => "release",
            ProvisionCall::Connect | ProvisionCall::Disconnect => "lifecycle",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["acquire", "run", "release", "acquire", "run", "release"]
    );
}

fn millisecond_settings() -> ExecutorSettings {
    ExecutorSettings {
        time_lag: SignedDuration::ZERO,
        minimum_duration: SignedDuration::from_millis(10),
        image: "alpine:latest".to_string(),
    }
}

/// Two-job plan starting at `at(0)`, on a clock that stands still at
/// `at(0) + 50ms`, so the first job ends early and the executor has to wait
/// out the gap to the second job's start.
async fn early_finish_env(total_ms: i64, maximum_ms: i64) -> (TestEnv, u64, DueJob) {
    let env = TestEnv::new(0).await.with_still_clock();
    let now = at(0) + SignedDuration::from_millis(50);
    env.clock.set(now);

    let plan = planned_with(
        window("node-a", at(0), at(0) + SignedDuration::from_millis(total_ms), 4.0),
        SliceLimits {
            minimum: SignedDuration::from_millis(10),
            maximum: SignedDuration::from_millis(maximum_ms),
        },
    );
    let plan_id = env.import(vec![plan]).await[0];
    let due = env
        .store
        .query_plans_due(now, SignedDuration::from_millis(10))
        .await
        .unwrap()
        .remove(0);
    (env, plan_id, due)
}

#[tokio::test]
async fn test_executor_waits_for_next_job_start() {
    let (env, plan_id, due) = early_finish_env(400, 200).await;

    let started = Instant::now();
    let outcome = env
        .executor(millisecond_settings(), Cancellation::never())
        .execute_plan(due)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(140));
    assert_eq!(outcome.jobs_done, 2);
    let budgets: Vec<SignedDuration> = env
        .provisioner
        .workloads()
        .iter()
        .map(|w| w.duration)
        .collect();
    // Dispatched before its start, the second job keeps its nominal budget
    assert_eq!(
        budgets,
        vec![
            SignedDuration::from_millis(150),
            SignedDuration::from_millis(200)
        ]
    );

    let plan = env.store.get_plan(plan_id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
}

#[tokio::test]
async fn test_cancellation_during_wait_leaves_next_job_pending() {
    let (env, plan_id, due) = early_finish_env(2_000, 1_000).await;

    let shutdown = Shutdown::new();
    let executor = env.executor(millisecond_settings(), shutdown.cancellation());
    let handle = tokio::spawn(async move { executor.execute_plan(due).await });

    wait_for_runs(&env, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.trigger();

    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("executor should stop promptly")
        .unwrap()
        .unwrap();
    assert_eq!(outcome.end, PlanEnd::Interrupted);
    assert_eq!(outcome.jobs_done, 1);
    assert_eq!(env.provisioner.workloads().len(), 1);

    let plan = env.store.get_plan(plan_id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Active);
    assert_eq!(plan.jobs[0].status, JobStatus::Done);
    assert_eq!(plan.jobs[1].status, JobStatus::Pending);
}

#[test]
fn test_run_timeout_adds_five_percent() {
    assert_eq!(
        run_timeout(SignedDuration::from_secs(100)),
        Duration::from_secs(105)
    );
}

#[test]
fn test_plan_outcome_display() {
    let outcome = PlanOutcome {
        plan_id: 7,
        node_id: "node-a".to_string(),
        jobs_done: 2,
        jobs_failed: 1,
        end: PlanEnd::Completed,
    };
    assert_eq!(outcome.to_string(), "plan 7 (node-a) completed: 2 done, 1 failed");
}
