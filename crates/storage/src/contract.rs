// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behaviour every store must share; run against each backend

use crate::{CheckpointStore, JobRecord, JobStore, LeaseStore, StorageError};
use foundry_core::{
    Checkpoint, ClarificationDraft, ClarificationRequest, Clock, CorrectionRecord,
    CorrectionStatus, FakeClock, HolderId, Job, JobEvent, JobId, JobStatus, LeaseConfig,
    PayloadRef, TaskId,
};
use serde_json::json;
use std::time::Duration;

pub fn make_job(id: &str, clock: &FakeClock) -> Job {
    Job::new(id, "text", PayloadRef::new(format!("blob://{}", id)), json!({}), clock)
}

fn start(record: &mut JobRecord, clock: &FakeClock) -> Result<(), StorageError> {
    let (job, _) = record.job.transition(JobEvent::Start, clock)?;
    record.job = job;
    Ok(())
}

pub fn insert_and_load<S: JobStore>(store: &S) {
    let clock = FakeClock::new();
    let job = make_job("job-1", &clock);
    store.insert_job(&job).unwrap();

    let record = store.load_job(&job.id).unwrap();
    assert_eq!(record.job, job);
    assert!(record.clarifications.is_empty());

    let err = store.insert_job(&job).unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists { .. }));
    let err = store.load_job(&JobId::new("nope")).unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

pub fn list_is_oldest_first<S: JobStore>(store: &S) {
    let clock = FakeClock::new();
    store.insert_job(&make_job("b-later", &clock)).unwrap();
    clock.set(clock.now() - chrono::TimeDelta::seconds(10));
    store.insert_job(&make_job("a-earlier", &clock)).unwrap();

    let ids: Vec<String> = store
        .list_jobs()
        .unwrap()
        .into_iter()
        .map(|r| r.job.id.to_string())
        .collect();
    assert_eq!(ids, vec!["a-earlier", "b-later"]);
}

pub fn find_by_prefix<S: JobStore>(store: &S) {
    let clock = FakeClock::new();
    store.insert_job(&make_job("abc-1", &clock)).unwrap();
    store.insert_job(&make_job("abd-2", &clock)).unwrap();

    assert_eq!(store.find_job("abc").unwrap().job.id.as_str(), "abc-1");
    assert_eq!(store.find_job("abd-2").unwrap().job.id.as_str(), "abd-2");
    assert!(matches!(
        store.find_job("ab").unwrap_err(),
        StorageError::Ambiguous { count: 2, .. }
    ));
    assert!(matches!(
        store.find_job("zz").unwrap_err(),
        StorageError::NotFound { .. }
    ));
}

pub fn update_records_history<S: JobStore>(store: &S) {
    let clock = FakeClock::new();
    let job = make_job("job-1", &clock);
    store.insert_job(&job).unwrap();

    let record = store
        .update_job(&job.id, &mut |record| start(record, &clock))
        .unwrap();
    assert_eq!(record.job.status, JobStatus::InProgress);

    // Progress-only updates keep the revision and add no history
    store
        .update_job(&job.id, &mut |record| {
            record.job.progress = None;
            Ok(())
        })
        .unwrap();

    let history = store.history(&job.id).unwrap();
    let steps: Vec<(JobStatus, u64)> = history.iter().map(|h| (h.status, h.revision)).collect();
    assert_eq!(
        steps,
        vec![(JobStatus::Created, 0), (JobStatus::InProgress, 1)]
    );
}

pub fn failed_update_writes_nothing<S: JobStore>(store: &S) {
    let clock = FakeClock::new();
    let job = make_job("job-1", &clock);
    store.insert_job(&job).unwrap();

    let err = store
        .update_job(&job.id, &mut |record| {
            start(record, &clock)?;
            Err(StorageError::Conflict {
                id: record.job.id.clone(),
                expected: 0,
                actual: 1,
            })
        })
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict { .. }));
    assert_eq!(store.load_job(&job.id).unwrap().job, job);
    assert_eq!(store.history(&job.id).unwrap().len(), 1);
}

pub fn clarification_feed<S: JobStore>(store: &S) {
    let clock = FakeClock::new();
    let first = make_job("job-1", &clock);
    let second = make_job("job-2", &clock);
    store.insert_job(&first).unwrap();
    store.insert_job(&second).unwrap();

    let raise = |job_id: &JobId, id: &str| {
        ClarificationRequest::open(
            id,
            job_id.clone(),
            "review",
            "low-confidence",
            ClarificationDraft::new("REVIEW_OCR", json!({"field": id})),
            &clock,
        )
    };

    let early = raise(&second.id, "clr-early");
    clock.advance(Duration::from_secs(1));
    let late = raise(&first.id, "clr-late");
    store
        .update_job(&first.id, &mut |r| {
            r.clarifications.push(late.clone());
            Ok(())
        })
        .unwrap();
    store
        .update_job(&second.id, &mut |r| {
            r.clarifications.push(early.clone());
            Ok(())
        })
        .unwrap();

    let all = store.clarifications(None).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id.as_str(), "clr-early");
    assert_eq!(store.clarifications(Some(&first.id)).unwrap().len(), 1);
    assert_eq!(
        store.next_open_clarification().unwrap().unwrap().id.as_str(),
        "clr-early"
    );

    let (resolved, _) = early.resolve(json!({"ok": true}), &clock).unwrap();
    store
        .update_job(&second.id, &mut |r| {
            if let Some(slot) = r.clarification_mut(&resolved.id) {
                *slot = resolved.clone();
            }
            Ok(())
        })
        .unwrap();
    assert_eq!(
        store.next_open_clarification().unwrap().unwrap().id.as_str(),
        "clr-late"
    );
    assert!(store.find_clarification(&resolved.id).unwrap().resolution.is_some());
}

pub fn corrections_filter_by_status<S: JobStore>(store: &S) {
    let clock = FakeClock::new();
    for (id, status) in [
        ("job-1", CorrectionStatus::ApprovedForFinetuning),
        ("job-2", CorrectionStatus::Rejected),
        ("job-3", CorrectionStatus::ApprovedForFinetuning),
    ] {
        let job = make_job(id, &clock);
        store.insert_job(&job).unwrap();
        store
            .update_job(&job.id, &mut |r| {
                r.correction = Some(CorrectionRecord {
                    job_id: r.job.id.clone(),
                    source: r.job.payload.clone(),
                    original_output: None,
                    corrected_output: json!({"id": id}),
                    status,
                    created_at: clock.now(),
                    updated_at: clock.now(),
                });
                Ok(())
            })
            .unwrap();
        clock.advance(Duration::from_secs(1));
    }

    assert_eq!(store.corrections(None).unwrap().len(), 3);
    let approved = store
        .corrections(Some(CorrectionStatus::ApprovedForFinetuning))
        .unwrap();
    let ids: Vec<&str> = approved.iter().map(|c| c.job_id.as_str()).collect();
    assert_eq!(ids, vec!["job-1", "job-3"]);
}

pub fn lock_round_trip<S: LeaseStore>(store: &S) {
    let clock = FakeClock::new();
    let config = LeaseConfig::new("gpu").with_lease(Duration::from_secs(10));
    let holder = HolderId::new("worker-a");

    let fresh = store.load_lock(&config).unwrap();
    assert!(fresh.holder().is_none());

    let stored = store
        .update_lock(&config, &mut |lock| {
            lock.try_acquire(&holder, None, &clock).ok().map(|(l, _)| l)
        })
        .unwrap();
    assert!(stored.is_held_by(&holder));
    assert!(store.load_lock(&config).unwrap().is_held_by(&holder));

    // A refused update leaves the record alone
    let other = HolderId::new("worker-b");
    let after = store
        .update_lock(&config, &mut |lock| {
            lock.try_acquire(&other, None, &clock).ok().map(|(l, _)| l)
        })
        .unwrap();
    assert!(after.is_held_by(&holder));

    // Lease settings come from the caller
    let longer = LeaseConfig::new("gpu").with_lease(Duration::from_secs(60));
    assert_eq!(store.load_lock(&longer).unwrap().config, longer);
}

pub fn checkpoints_are_retained_in_order<S: CheckpointStore>(store: &S) {
    let clock = FakeClock::new();
    let task = TaskId::new("train-1");
    assert!(store.latest_checkpoint(&task).unwrap().is_none());

    for sequence in 1..=3 {
        let checkpoint =
            Checkpoint::partial(task.clone(), sequence, json!({"step": sequence}), &clock).unwrap();
        store.put_checkpoint(&checkpoint).unwrap();
    }

    let all = store.checkpoints(&task).unwrap();
    let sequences: Vec<u64> = all.iter().map(|c| c.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert_eq!(store.latest_checkpoint(&task).unwrap().unwrap().sequence, 3);

    let stale = Checkpoint::partial(task.clone(), 2, json!({"step": 9}), &clock).unwrap();
    assert!(matches!(
        store.put_checkpoint(&stale).unwrap_err(),
        StorageError::StaleCheckpoint { latest: 3, .. }
    ));
    assert!(store
        .checkpoints(&TaskId::new("other"))
        .unwrap()
        .is_empty());
}
