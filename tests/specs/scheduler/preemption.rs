// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inference preempts a long training run between quanta

use crate::prelude::*;
use similar_asserts::assert_eq;

fn worker(store: &Arc<FileStore>, workloads: WorkloadSet) -> Worker<FileStore, FakeClock> {
    let arbiter = arbiter(store, &FakeClock::new(), 30);
    Worker::new(HolderId::new("gpu-0"), arbiter, Arc::clone(store), workloads)
}

#[tokio::test]
async fn training_yields_to_inference_and_finishes_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let log = Arc::new(Mutex::new(Vec::new()));
    let training = Quanta::new(4, &log);
    let interrupt = Arc::clone(&training.interrupt);
    let tickets = Arc::clone(&training.tickets);
    let workloads = WorkloadSet::new()
        .with(TaskKind::Training, training)
        .with(TaskKind::CorrectionInference, Quanta::new(1, &log));
    let (supervisor, handle) =
        Supervisor::new(worker(&store, workloads), ExecutionMode::Quantum(1), 2);

    let correction = WorkTask::new("fix", TaskKind::CorrectionInference, json!({}))
        .with_priority(Priority::High);
    *interrupt.lock().unwrap() = Some((1, handle.clone(), correction));
    let running = tokio::spawn(supervisor.run());

    let train = WorkTask::new("train", TaskKind::Training, json!({})).with_priority(Priority::Low);
    let sliced = handle.submit(train).await.unwrap();
    let ticket = tickets.lock().unwrap().pop().unwrap();
    let fixed = ticket.wait().await.unwrap();
    drop(handle);
    running.await.unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        ["train:0", "train:1", "fix:0", "train:2", "train:3"].map(String::from)
    );
    assert_eq!(fixed, TaskOutcome::Completed { output: json!({ "final_loss": 500 }) });

    // Every quantum left a checkpoint; the last one holds the result
    let checkpoints = store.checkpoints(&"train".into()).unwrap();
    let sequences: Vec<u64> = checkpoints.iter().map(|c| c.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
    assert!(checkpoints.last().unwrap().complete);

    // Same result as an uninterrupted run in a separate state directory
    let other = TempDir::new().unwrap();
    let straight = worker(
        &file_store(&other),
        WorkloadSet::new().with(TaskKind::Training, Quanta::new(4, &Arc::default())),
    )
    .execute(
        &WorkTask::new("train", TaskKind::Training, json!({})),
        ExecutionMode::Coarse,
    )
    .await
    .unwrap();
    assert_eq!(sliced, straight);
    assert_eq!(straight, TaskOutcome::Completed { output: json!({ "final_loss": 66 }) });
}
