// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restarting after a crash resumes at the stored cursor

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn committed_phases_never_run_twice() {
    let dir = TempDir::new().unwrap();
    let clock = FakeClock::new();
    let first = Arc::new(Step::new("first"));
    let second = Arc::new(Step::new("second"));

    // The process dies while the third phase is running
    let mut crashing = PipelineRegistry::new();
    crashing
        .register(
            Pipeline::new("steps")
                .shared_phase(first.clone())
                .shared_phase(second.clone())
                .phase(Hang),
        )
        .unwrap();
    let store = file_store(&dir);
    let job = executor(&store, &clock)
        .submit("steps", PayloadRef::new("blob://in"), json!({}))
        .unwrap();
    let interrupted = tokio::time::timeout(
        Duration::from_millis(50),
        executor(&store, &clock).run(&crashing, &job.id),
    )
    .await;
    assert!(interrupted.is_err());
    drop(crashing);

    let stored = file_store(&dir).load_job(&job.id).unwrap();
    assert_eq!(stored.job.status, JobStatus::InProgress);
    assert_eq!(stored.job.cursor, 2);

    // A new process with a healthy third phase picks up from the cursor
    let third = Step::new("third");
    let third_runs = Arc::clone(&third.runs);
    let mut healthy = PipelineRegistry::new();
    healthy
        .register(
            Pipeline::new("steps")
                .shared_phase(first.clone())
                .shared_phase(second.clone())
                .phase(third),
        )
        .unwrap();
    let restarted = file_store(&dir);
    let outcome = executor(&restarted, &clock)
        .run(&healthy, &job.id)
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::Ready);
    assert_eq!(first.runs.load(Ordering::SeqCst), 1);
    assert_eq!(second.runs.load(Ordering::SeqCst), 1);
    assert_eq!(third_runs.load(Ordering::SeqCst), 1);
    assert_eq!(
        restarted.load_job(&job.id).unwrap().job.context,
        json!({ "done": ["first", "second", "third"] })
    );
}
