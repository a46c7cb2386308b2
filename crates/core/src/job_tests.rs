// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use serde_json::json;
use yare::parameterized;

fn make_job(clock: &FakeClock) -> Job {
    Job::new(
        "job-1",
        "text",
        PayloadRef::new("blob://scan-1"),
        json!({"text": "hello"}),
        clock,
    )
}

fn succeed(job: &Job, phase_count: usize, clock: &FakeClock) -> Job {
    let (job, _) = job
        .transition(
            JobEvent::PhaseSucceeded {
                phase_count,
                context: job.context.clone(),
                ai_output: None,
            },
            clock,
        )
        .unwrap();
    job
}

#[test]
fn new_job_is_created_at_cursor_zero() {
    let clock = FakeClock::new();
    let job = make_job(&clock);
    assert_eq!(job.status, JobStatus::Created);
    assert_eq!(job.cursor, 0);
    assert_eq!(job.revision, 0);
    assert_eq!(job.context, job.input);
    assert!(job.ai_output.is_none());
}

#[test]
fn start_moves_to_in_progress_and_bumps_revision() {
    let clock = FakeClock::new();
    let job = make_job(&clock);
    clock.advance(Duration::from_secs(5));

    let (started, events) = job.transition(JobEvent::Start, &clock).unwrap();
    assert_eq!(started.status, JobStatus::InProgress);
    assert_eq!(started.revision, 1);
    assert_eq!(started.updated_at, clock.now());
    assert_eq!(started.created_at, job.created_at);
    assert_eq!(events, vec![Event::JobStarted { id: job.id.clone() }]);
}

#[test]
fn phases_advance_cursor_until_ready() {
    let clock = FakeClock::new();
    let (job, _) = make_job(&clock).transition(JobEvent::Start, &clock).unwrap();

    let job = succeed(&job, 2, &clock);
    assert_eq!(job.status, JobStatus::InProgress);
    assert_eq!(job.cursor, 1);

    let job = succeed(&job, 2, &clock);
    assert_eq!(job.status, JobStatus::ReadyForFinalProcessing);
    assert_eq!(job.cursor, 2);
}

#[test]
fn phase_success_commits_context_and_output() {
    let clock = FakeClock::new();
    let (job, _) = make_job(&clock).transition(JobEvent::Start, &clock).unwrap();

    let (job, events) = job
        .transition(
            JobEvent::PhaseSucceeded {
                phase_count: 1,
                context: json!({"text": "HELLO"}),
                ai_output: Some(json!({"label": "greeting"})),
            },
            &clock,
        )
        .unwrap();
    assert_eq!(job.context, json!({"text": "HELLO"}));
    assert_eq!(job.ai_output, Some(json!({"label": "greeting"})));
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::JobReady { .. })));
}

#[test]
fn phase_success_past_last_phase_is_rejected() {
    let clock = FakeClock::new();
    let (job, _) = make_job(&clock).transition(JobEvent::Start, &clock).unwrap();
    let mut job = job;
    job.cursor = 3;

    let err = job
        .transition(
            JobEvent::PhaseSucceeded {
                phase_count: 3,
                context: json!({}),
                ai_output: None,
            },
            &clock,
        )
        .unwrap_err();
    assert!(matches!(err, TransitionError::CursorOutOfRange { .. }));
}

#[test]
fn clarification_pauses_without_moving_cursor() {
    let clock = FakeClock::new();
    let (job, _) = make_job(&clock).transition(JobEvent::Start, &clock).unwrap();
    let job = succeed(&job, 3, &clock);

    let (paused, events) = job
        .transition(JobEvent::ClarificationRequested { requests: 2 }, &clock)
        .unwrap();
    assert_eq!(paused.status, JobStatus::PendingClarification);
    assert_eq!(paused.cursor, 1);
    assert_eq!(
        events,
        vec![Event::JobPaused {
            id: job.id.clone(),
            cursor: 1,
            requests: 2
        }]
    );
}

#[test]
fn clarification_with_no_requests_is_illegal() {
    let clock = FakeClock::new();
    let (job, _) = make_job(&clock).transition(JobEvent::Start, &clock).unwrap();
    assert!(job
        .transition(JobEvent::ClarificationRequested { requests: 0 }, &clock)
        .is_err());
}

#[test]
fn resume_then_reevaluate_same_phase() {
    let clock = FakeClock::new();
    let (job, _) = make_job(&clock).transition(JobEvent::Start, &clock).unwrap();
    let (paused, _) = job
        .transition(JobEvent::ClarificationRequested { requests: 1 }, &clock)
        .unwrap();

    let (resumed, _) = paused.transition(JobEvent::Resume, &clock).unwrap();
    assert_eq!(resumed.status, JobStatus::InProgress);
    assert_eq!(resumed.cursor, 0);

    let done = succeed(&resumed, 1, &clock);
    assert_eq!(done.status, JobStatus::ReadyForFinalProcessing);
}

#[test]
fn paused_job_can_advance_directly_to_ready() {
    let clock = FakeClock::new();
    let (job, _) = make_job(&clock).transition(JobEvent::Start, &clock).unwrap();
    let (paused, _) = job
        .transition(JobEvent::ClarificationRequested { requests: 1 }, &clock)
        .unwrap();

    let ready = succeed(&paused, 1, &clock);
    assert_eq!(ready.status, JobStatus::ReadyForFinalProcessing);
}

#[test]
fn finalize_records_corrected_output() {
    let clock = FakeClock::new();
    let (job, _) = make_job(&clock).transition(JobEvent::Start, &clock).unwrap();
    let ready = succeed(&job, 1, &clock);

    let (done, events) = ready
        .transition(
            JobEvent::Finalize {
                corrected_output: Some(json!({"label": "farewell"})),
            },
            &clock,
        )
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.corrected_output, Some(json!({"label": "farewell"})));
    assert!(matches!(events[0], Event::JobCompleted { .. }));
}

#[test]
fn failure_records_phase_and_reason() {
    let clock = FakeClock::new();
    let (job, _) = make_job(&clock).transition(JobEvent::Start, &clock).unwrap();

    let (failed, events) = job
        .transition(
            JobEvent::Fail {
                phase: Some("extract".to_string()),
                reason: "boom".to_string(),
            },
            &clock,
        )
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(
        failed.error,
        Some(JobError {
            phase: Some("extract".to_string()),
            message: "boom".to_string()
        })
    );
    assert!(matches!(events[0], Event::JobFailed { .. }));
}

#[test]
fn terminal_jobs_reject_every_event() {
    let clock = FakeClock::new();
    let (job, _) = make_job(&clock)
        .transition(
            JobEvent::Fail {
                phase: None,
                reason: "nope".to_string(),
            },
            &clock,
        )
        .unwrap();

    for event in [
        JobEvent::Start,
        JobEvent::Resume,
        JobEvent::ClarificationRequested { requests: 1 },
        JobEvent::Finalize {
            corrected_output: None,
        },
        JobEvent::Fail {
            phase: None,
            reason: "again".to_string(),
        },
    ] {
        let err = job.transition(event, &clock).unwrap_err();
        assert!(matches!(err, TransitionError::Illegal { .. }));
    }
}

#[parameterized(
    created_to_in_progress = { JobStatus::Created, JobStatus::InProgress, true },
    created_to_failed = { JobStatus::Created, JobStatus::Failed, true },
    created_to_ready = { JobStatus::Created, JobStatus::ReadyForFinalProcessing, false },
    in_progress_loop = { JobStatus::InProgress, JobStatus::InProgress, true },
    in_progress_to_pending = { JobStatus::InProgress, JobStatus::PendingClarification, true },
    in_progress_to_ready = { JobStatus::InProgress, JobStatus::ReadyForFinalProcessing, true },
    in_progress_to_completed = { JobStatus::InProgress, JobStatus::Completed, false },
    pending_to_in_progress = { JobStatus::PendingClarification, JobStatus::InProgress, true },
    pending_to_ready = { JobStatus::PendingClarification, JobStatus::ReadyForFinalProcessing, true },
    pending_to_completed = { JobStatus::PendingClarification, JobStatus::Completed, false },
    ready_to_completed = { JobStatus::ReadyForFinalProcessing, JobStatus::Completed, true },
    ready_to_in_progress = { JobStatus::ReadyForFinalProcessing, JobStatus::InProgress, false },
    completed_to_failed = { JobStatus::Completed, JobStatus::Failed, false },
    failed_to_in_progress = { JobStatus::Failed, JobStatus::InProgress, false },
)]
fn transition_graph(from: JobStatus, to: JobStatus, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[parameterized(
    created = { "created", JobStatus::Created },
    in_progress = { "in_progress", JobStatus::InProgress },
    pending = { "pending_clarification", JobStatus::PendingClarification },
    ready = { "ready_for_final_processing", JobStatus::ReadyForFinalProcessing },
    completed = { "completed", JobStatus::Completed },
    failed = { "failed", JobStatus::Failed },
)]
fn status_names_round_trip(name: &str, status: JobStatus) {
    assert_eq!(status.name(), name);
    assert_eq!(name.parse::<JobStatus>().unwrap(), status);
    assert_eq!(
        serde_json::to_string(&status).unwrap(),
        format!("\"{}\"", name)
    );
}

#[test]
fn unknown_status_fails_to_parse() {
    assert_eq!(
        "paused".parse::<JobStatus>(),
        Err(TransitionError::UnknownStatus("paused".to_string()))
    );
}

#[test]
fn progress_is_clamped_and_expires() {
    let clock = FakeClock::new();
    let job = make_job(&clock).with_progress("extracting", 250, &clock);
    let ttl = Duration::from_secs(3600);

    let progress = job.current_progress(clock.now(), ttl).unwrap();
    assert_eq!(progress.percent, 100);
    assert_eq!(progress.message, "extracting");

    clock.advance(Duration::from_secs(3601));
    assert!(job.current_progress(clock.now(), ttl).is_none());
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Step {
        Start,
        Succeed,
        Clarify,
        Resume,
        Fail,
        Finalize,
    }

    fn arb_step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Start),
            Just(Step::Succeed),
            Just(Step::Clarify),
            Just(Step::Resume),
            Just(Step::Fail),
            Just(Step::Finalize),
        ]
    }

    fn to_event(step: &Step, job: &Job, phase_count: usize) -> JobEvent {
        match step {
            Step::Start => JobEvent::Start,
            Step::Succeed => JobEvent::PhaseSucceeded {
                phase_count,
                context: job.context.clone(),
                ai_output: None,
            },
            Step::Clarify => JobEvent::ClarificationRequested { requests: 1 },
            Step::Resume => JobEvent::Resume,
            Step::Fail => JobEvent::Fail {
                phase: None,
                reason: "injected".to_string(),
            },
            Step::Finalize => JobEvent::Finalize {
                corrected_output: None,
            },
        }
    }

    proptest! {
        #[test]
        fn every_accepted_transition_follows_the_graph(
            steps in proptest::collection::vec(arb_step(), 0..40),
            phase_count in 1usize..5,
        ) {
            let clock = FakeClock::new();
            let mut job = make_job(&clock);

            for step in steps.iter() {
                let event = to_event(step, &job, phase_count);
                if let Ok((next, _)) = job.transition(event, &clock) {
                    prop_assert!(job.status.can_transition_to(next.status));
                    prop_assert!(next.cursor >= job.cursor);
                    prop_assert!(next.cursor <= phase_count);
                    prop_assert_eq!(next.revision, job.revision + 1);
                    job = next;
                }
            }
        }
    }
}
