// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A job pauses for a human and resumes once the request is resolved

use crate::prelude::*;
use similar_asserts::assert_eq;

fn review_registry() -> PipelineRegistry {
    let mut registry = PipelineRegistry::new();
    registry
        .register(
            Pipeline::new("review")
                .phase(Infer(json!({ "a": "1O", "b": "2", "unsure": ["a"] })))
                .phase(
                    HumanInTheLoopPhase::new("check")
                        .with_detector(Unsure("a"))
                        .with_detector(Satisfied),
                ),
        )
        .unwrap();
    registry
}

#[tokio::test]
async fn one_ambiguity_pauses_then_resolution_unblocks() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let clock = FakeClock::new();
    let executor = executor(&store, &clock);
    let registry = review_registry();

    let job = executor
        .submit("review", PayloadRef::new("blob://scan"), json!({}))
        .unwrap();
    let outcome = executor.run(&registry, &job.id).await.unwrap();
    assert_eq!(outcome, RunOutcome::AwaitingClarification { open: 1 });

    let record = store.load_job(&job.id).unwrap();
    assert_eq!(record.job.status, JobStatus::PendingClarification);
    assert_eq!(record.job.cursor, 1);
    let open: Vec<_> = record.open_requests().cloned().collect();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].detector, "a");
    assert_eq!(open[0].fields, json!({ "field": "a" }));

    let resolved = executor.resolve(&open[0].id, json!("10")).unwrap();
    assert!(resolved.unblocked());

    // A fresh handle on the same directory sees the resolution
    let reopened = file_store(&dir);
    let outcome = crate::prelude::executor(&reopened, &clock)
        .run(&registry, &job.id)
        .await
        .unwrap();
    assert_eq!(outcome, RunOutcome::Ready);

    let record = reopened.load_job(&job.id).unwrap();
    assert_eq!(record.job.status, JobStatus::ReadyForFinalProcessing);
    assert_eq!(record.job.cursor, 2);
    assert_eq!(
        record.job.ai_output,
        Some(json!({ "a": "10", "b": "2", "unsure": [] }))
    );

    let statuses: Vec<(JobStatus, usize)> = reopened
        .history(&job.id)
        .unwrap()
        .iter()
        .map(|h| (h.status, h.cursor))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (JobStatus::Created, 0),
            (JobStatus::InProgress, 0),
            (JobStatus::InProgress, 1),
            (JobStatus::PendingClarification, 1),
            (JobStatus::InProgress, 1),
            (JobStatus::ReadyForFinalProcessing, 2),
        ]
    );
    for pair in statuses.windows(2) {
        assert!(pair[0].0.can_transition_to(pair[1].0));
    }
}

#[tokio::test]
async fn corrections_export_after_final_processing() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let clock = FakeClock::new();
    let executor = executor(&store, &clock);
    let registry = review_registry();
    let job = executor
        .submit("review", PayloadRef::new("blob://scan"), json!({}))
        .unwrap();
    executor.run(&registry, &job.id).await.unwrap();
    let request = store.next_open_clarification().unwrap().unwrap();
    executor.resolve(&request.id, json!("10")).unwrap();
    executor.run(&registry, &job.id).await.unwrap();

    let desk = foundry_engine::CorrectionDesk::new(Arc::clone(&store), clock.clone());
    desk.save_correction(&job.id, json!({ "a": "10", "b": "20" }))
        .unwrap();
    assert_eq!(
        store.load_job(&job.id).unwrap().job.status,
        JobStatus::Completed
    );

    let exported = desk
        .export(foundry_core::CorrectionStatus::ApprovedForFinetuning)
        .unwrap();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].source, PayloadRef::new("blob://scan"));
    assert_eq!(exported[0].corrected_output, json!({ "a": "10", "b": "20" }));
}
