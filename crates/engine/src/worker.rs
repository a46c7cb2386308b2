// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource-bound task execution
//!
//! A worker runs one task under the resource lease. In quantum mode it
//! stops after a fixed number of steps, writes a checkpoint, and yields the
//! lease; the next execution of the same task resumes from that checkpoint.

use crate::arbiter::{ArbiterError, LeaseGuard, ResourceArbiter};
use async_trait::async_trait;
use foundry_core::{
    Checkpoint, CheckpointError, Clock, Event, HolderId, TaskKind, TaskOutcome, WorkTask,
};
use foundry_storage::{CheckpointStore, LeaseStore, StorageError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::Instrument;

/// A workload step failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct WorkloadError(pub String);

impl WorkloadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("lease lost by {holder} while running a quantum")]
    LockLost { holder: HolderId },
    #[error("no workload registered for {0:?} tasks")]
    NoWorkload(TaskKind),
    #[error(transparent)]
    Arbiter(ArbiterError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl From<ArbiterError> for WorkerError {
    fn from(e: ArbiterError) -> Self {
        match e {
            ArbiterError::Lock(foundry_core::LockError::LockLost { holder }) => {
                WorkerError::LockLost { holder }
            }
            other => WorkerError::Arbiter(other),
        }
    }
}

/// Resource-bound work split into deterministic steps.
///
/// `step` must depend only on its arguments so that a task resumed from a
/// checkpoint reaches the same result as one that never stopped.
#[async_trait]
pub trait Workload: Send + Sync {
    fn total_steps(&self, task: &WorkTask) -> u64;

    fn initial_state(&self, task: &WorkTask) -> Result<Value, WorkloadError>;

    async fn step(&self, task: &WorkTask, step: u64, state: Value) -> Result<Value, WorkloadError>;

    /// Turn the final state into the task's output
    fn finish(&self, task: &WorkTask, state: Value) -> Result<Value, WorkloadError>;
}

/// Workloads by task kind
#[derive(Clone, Default)]
pub struct WorkloadSet {
    workloads: HashMap<TaskKind, Arc<dyn Workload>>,
}

impl WorkloadSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: TaskKind, workload: impl Workload + 'static) -> Self {
        self.workloads.insert(kind, Arc::new(workload));
        self
    }

    pub fn get(&self, kind: TaskKind) -> Option<&Arc<dyn Workload>> {
        self.workloads.get(&kind)
    }
}

/// How long a worker keeps the lease for one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Run the task to the end
    Coarse,
    /// Yield after this many steps
    Quantum(u64),
}

pub struct Worker<S, C> {
    id: HolderId,
    arbiter: ResourceArbiter<S, C>,
    store: Arc<S>,
    workloads: WorkloadSet,
    renew_interval: Duration,
}

impl<S, C> Worker<S, C>
where
    S: LeaseStore + CheckpointStore,
    C: Clock,
{
    pub fn new(
        id: HolderId,
        arbiter: ResourceArbiter<S, C>,
        store: Arc<S>,
        workloads: WorkloadSet,
    ) -> Self {
        Self {
            id,
            arbiter,
            store,
            workloads,
            renew_interval: Duration::ZERO,
        }
    }

    /// Minimum time between lease renewals during a quantum. Zero renews
    /// before every step. Checkpoint writes always renew first.
    pub fn with_renew_interval(mut self, renew_interval: Duration) -> Self {
        self.renew_interval = renew_interval;
        self
    }

    pub fn id(&self) -> &HolderId {
        &self.id
    }

    /// Run `task` under the lease. The lease is released on every return path.
    pub async fn execute(
        &self,
        task: &WorkTask,
        mode: ExecutionMode,
    ) -> Result<TaskOutcome, WorkerError> {
        let span = tracing::info_span!(
            "worker.execute",
            worker = %self.id,
            task_id = %task.id,
            kind = ?task.kind
        );
        async {
            let start = Instant::now();
            let workload = self
                .workloads
                .get(task.kind)
                .cloned()
                .ok_or(WorkerError::NoWorkload(task.kind))?;

            let guard = self
                .arbiter
                .acquire(&self.id, task.priority, Some(task.id.to_string()))
                .await?;
            let result = self.run(&guard, workload.as_ref(), task, mode).await;
            if let Err(e) = guard.release() {
                tracing::warn!(error = %e, "failed to release lease");
            }

            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(outcome) => tracing::info!(elapsed_ms, outcome = ?outcome, "completed"),
                Err(e) => tracing::warn!(elapsed_ms, error = %e, "failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        guard: &LeaseGuard<S, C>,
        workload: &dyn Workload,
        task: &WorkTask,
        mode: ExecutionMode,
    ) -> Result<TaskOutcome, WorkerError> {
        let stored = self.store.checkpoints(&task.id)?;
        let sequence = self
            .store
            .latest_sequence(&task.id)?
            .map_or(1, |s| s + 1);

        let (mut step, mut state) = match restore(&stored) {
            Some(Restored::Finished(output)) => {
                tracing::info!("task already finished");
                return Ok(TaskOutcome::Completed { output });
            }
            Some(Restored::Partial { step, state }) => {
                tracing::info!(step, "resuming from checkpoint");
                (step, state)
            }
            None => match workload.initial_state(task) {
                Ok(state) => (0, state),
                Err(e) => return Ok(fail(task, e)),
            },
        };

        let total = workload.total_steps(task);
        let budget = match mode {
            ExecutionMode::Coarse => u64::MAX,
            ExecutionMode::Quantum(steps) => steps.max(1),
        };

        let mut ran = 0;
        let mut renewed = Instant::now();
        while step < total && ran < budget {
            if ran == 0 || renewed.elapsed() >= self.renew_interval {
                guard.renew()?;
                renewed = Instant::now();
            }
            state = match workload.step(task, step, state).await {
                Ok(state) => state,
                Err(e) => return Ok(fail(task, e)),
            };
            step += 1;
            ran += 1;
            tracing::debug!(step, total, "step done");
        }

        let clock = self.arbiter.clock();
        let snapshot = json!({ "step": step, "state": state });
        if step >= total {
            let output = match workload.finish(task, state) {
                Ok(output) => output,
                Err(e) => return Ok(fail(task, e)),
            };
            guard.renew()?;
            let checkpoint =
                Checkpoint::completed(task.id.clone(), sequence, snapshot, output.clone(), clock)?;
            self.store.put_checkpoint(&checkpoint)?;
            checkpoint.written_event().log();
            Event::TaskCompleted {
                task_id: task.id.clone(),
            }
            .log();
            return Ok(TaskOutcome::Completed { output });
        }

        guard.renew()?;
        let checkpoint = Checkpoint::partial(task.id.clone(), sequence, snapshot, clock)?;
        self.store.put_checkpoint(&checkpoint)?;
        checkpoint.written_event().log();
        Event::TaskPreempted {
            task_id: task.id.clone(),
            sequence,
        }
        .log();
        Ok(TaskOutcome::Preempted { sequence })
    }
}

enum Restored {
    Finished(Value),
    Partial { step: u64, state: Value },
}

/// Newest checkpoint that passes validation. Rejected ones are logged.
fn restore(stored: &[Checkpoint]) -> Option<Restored> {
    for checkpoint in stored.iter().rev() {
        let restored = match (checkpoint.validate(), checkpoint.complete) {
            (Ok(()), true) => checkpoint.output.clone().map(Restored::Finished),
            (Ok(()), false) => checkpoint.state["step"].as_u64().map(|step| Restored::Partial {
                step,
                state: checkpoint.state["state"].clone(),
            }),
            (Err(_), _) => None,
        };
        match restored {
            Some(restored) => return Some(restored),
            None => Event::CheckpointRejected {
                task_id: checkpoint.task_id.clone(),
                sequence: checkpoint.sequence,
            }
            .log(),
        }
    }
    None
}

fn fail(task: &WorkTask, error: WorkloadError) -> TaskOutcome {
    let reason = error.to_string();
    Event::TaskFailed {
        task_id: task.id.clone(),
        reason: reason.clone(),
    }
    .log();
    TaskOutcome::Failed { reason }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
