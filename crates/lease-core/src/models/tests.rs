use jiff::{SignedDuration, Timestamp};

use super::*;

fn ts(second: i64) -> Timestamp {
    Timestamp::from_second(second).unwrap()
}

fn job(start: i64, minutes: i64, invoice_amount: f64) -> Job {
    Job {
        id: 7,
        plan_id: 3,
        order_index: 1,
        start_at: ts(start),
        duration: SignedDuration::from_mins(minutes),
        invoice_amount,
        status: JobStatus::Pending,
        last_error: None,
        updated_at: ts(start),
    }
}

#[test]
fn test_plan_status_round_trips_through_str() {
    for status in [PlanStatus::Pending, PlanStatus::Active, PlanStatus::Completed] {
        assert_eq!(status.as_str().parse::<PlanStatus>(), Ok(status));
    }
    assert!("archived".parse::<PlanStatus>().is_err());
}

#[test]
fn test_plan_status_only_moves_forward() {
    assert!(PlanStatus::Pending < PlanStatus::Active);
    assert!(PlanStatus::Active < PlanStatus::Completed);
    assert!(PlanStatus::Completed.predecessors().contains(&PlanStatus::Active));
    assert!(!PlanStatus::Active.predecessors().contains(&PlanStatus::Completed));
}

#[test]
fn test_job_status_parsing_is_case_insensitive() {
    assert_eq!("RUNNING".parse::<JobStatus>(), Ok(JobStatus::Running));
    assert_eq!("failed".parse::<JobStatus>(), Ok(JobStatus::Failed));
    assert!(JobStatus::Done.is_terminal());
    assert!(!JobStatus::Running.is_terminal());
}

#[test]
fn test_job_end_and_remaining() {
    let job = job(0, 10, 1.0);
    assert_eq!(job.end_at(), ts(600));
    assert_eq!(job.remaining_at(ts(420)), SignedDuration::from_mins(3));
    assert!(job.remaining_at(ts(900)).is_negative());
}

#[test]
fn test_hand_off_prorates_remaining_time() {
    let job = job(0, 60, 12.0);
    let hand_off = job.hand_off(ts(20 * 60));
    assert_eq!(hand_off.duration, SignedDuration::from_mins(40));
    assert!((hand_off.invoice_amount - 8.0).abs() < 1e-9);
}

#[test]
fn test_hand_off_is_clamped_to_the_slice() {
    let job = job(3600, 60, 12.0);

    // Before the slice starts: never more than the nominal slice.
    let early = job.hand_off(ts(0));
    assert_eq!(early.duration, SignedDuration::from_mins(60));
    assert!((early.invoice_amount - 12.0).abs() < 1e-9);

    // After the slice ends: nothing left.
    let late = job.hand_off(ts(3 * 3600));
    assert_eq!(late.duration, SignedDuration::ZERO);
    assert_eq!(late.invoice_amount, 0.0);
}

#[test]
fn test_due_job_carries_plan_fields() {
    let due = DueJob::new("node-a".into(), "gpu".into(), job(0, 60, 6.0), ts(30 * 60));
    assert_eq!(due.plan_id, 3);
    assert_eq!(due.order_index(), 1);
    assert_eq!(due.adjusted_duration, SignedDuration::from_mins(30));
    assert!((due.adjusted_invoice_amount - 3.0).abs() < 1e-9);
}

#[test]
fn test_window_total_duration() {
    let window = AllocationWindow {
        node_id: "node-a".into(),
        start_at: ts(100),
        stop_at: ts(250),
        invoice_amount: 1.0,
        compute_class: "gpu".into(),
    };
    assert_eq!(window.total_duration(), SignedDuration::from_secs(150));
}
