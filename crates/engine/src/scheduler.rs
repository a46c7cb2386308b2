// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource scheduler
//!
//! The supervisor owns one worker and a queue of resource-bound tasks. It
//! grants the worker to the best queued task, and puts preempted tasks back
//! in the queue so that shorter, higher-priority work can run between the
//! quanta of a long task.

use crate::phase::{Phase, PhaseContext, PhaseError, PhaseOutcome};
use crate::worker::{ExecutionMode, Worker, WorkerError};
use async_trait::async_trait;
use foundry_core::{Clock, TaskId, TaskKind, TaskOutcome, WorkTask};
use foundry_storage::{CheckpointStore, LeaseStore};
use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is not running")]
    Closed,
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// A queued task and its scheduling bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub task: WorkTask,
    /// Arrival order; kept when the task is requeued
    pub seq: u64,
    /// Rounds in which a later arrival was granted ahead of this task
    pub passed_over: u32,
}

/// Pure grant-order bookkeeping.
///
/// Picks the highest priority task, oldest first. A task passed over
/// `fairness_bound` times is granted next regardless of priority.
#[derive(Debug, Clone)]
pub struct SchedulingQueue {
    entries: Vec<QueueEntry>,
    fairness_bound: u32,
    next_seq: u64,
}

impl SchedulingQueue {
    pub fn new(fairness_bound: u32) -> Self {
        Self {
            entries: Vec::new(),
            fairness_bound,
            next_seq: 0,
        }
    }

    /// Queue a new task; returns its arrival number
    pub fn push(&mut self, task: WorkTask) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(QueueEntry {
            task,
            seq,
            passed_over: 0,
        });
        seq
    }

    /// Put a popped entry back, keeping its place in arrival order
    pub fn requeue(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        let overdue = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.passed_over >= self.fairness_bound)
            .min_by_key(|(_, e)| e.seq)
            .map(|(i, _)| i);
        let index = overdue.or_else(|| {
            self.entries
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| {
                    a.task
                        .priority
                        .cmp(&b.task.priority)
                        .then(b.seq.cmp(&a.seq))
                })
                .map(|(i, _)| i)
        })?;

        let mut chosen = self.entries.remove(index);
        for entry in &mut self.entries {
            if entry.seq < chosen.seq {
                entry.passed_over += 1;
            }
        }
        // A granted entry starts a fresh fairness window if it is requeued
        chosen.passed_over = 0;
        Some(chosen)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type Reply = Result<TaskOutcome, SchedulerError>;

struct Submission {
    task: WorkTask,
    reply: oneshot::Sender<Reply>,
}

/// Pending result of a submitted task
pub struct Ticket(oneshot::Receiver<Reply>);

impl Ticket {
    /// Wait for the task's final outcome
    pub async fn wait(self) -> Reply {
        self.0.await.map_err(|_| SchedulerError::Closed)?
    }
}

/// Cheap handle for submitting tasks to a running [`Supervisor`]
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::UnboundedSender<Submission>,
}

impl SupervisorHandle {
    /// Queue `task` without waiting for it
    pub fn enqueue(&self, task: WorkTask) -> Result<Ticket, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Submission { task, reply })
            .map_err(|_| SchedulerError::Closed)?;
        Ok(Ticket(rx))
    }

    /// Queue `task` and wait until it completes or fails
    pub async fn submit(&self, task: WorkTask) -> Reply {
        self.enqueue(task)?.wait().await
    }
}

pub struct Supervisor<S, C> {
    worker: Worker<S, C>,
    mode: ExecutionMode,
    queue: SchedulingQueue,
    replies: HashMap<u64, oneshot::Sender<Reply>>,
    rx: mpsc::UnboundedReceiver<Submission>,
}

impl<S, C> Supervisor<S, C>
where
    S: LeaseStore + CheckpointStore,
    C: Clock,
{
    pub fn new(
        worker: Worker<S, C>,
        mode: ExecutionMode,
        fairness_bound: u32,
    ) -> (Self, SupervisorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            worker,
            mode,
            queue: SchedulingQueue::new(fairness_bound),
            replies: HashMap::new(),
            rx,
        };
        (supervisor, SupervisorHandle { tx })
    }

    /// Dispatch tasks until every handle is dropped and the queue is empty
    pub async fn run(mut self) {
        tracing::info!(worker = %self.worker.id(), mode = ?self.mode, "supervisor started");
        loop {
            while let Ok(submission) = self.rx.try_recv() {
                self.accept(submission);
            }
            let Some(entry) = self.queue.pop() else {
                match self.rx.recv().await {
                    Some(submission) => {
                        self.accept(submission);
                        continue;
                    }
                    None => break,
                }
            };
            self.dispatch(entry).await;
        }
        tracing::info!("supervisor stopped");
    }

    fn accept(&mut self, submission: Submission) {
        let task_id = submission.task.id.clone();
        let priority = submission.task.priority;
        let seq = self.queue.push(submission.task);
        self.replies.insert(seq, submission.reply);
        tracing::debug!(task_id = %task_id, priority = %priority, seq, queued = self.queue.len(), "task queued");
    }

    async fn dispatch(&mut self, entry: QueueEntry) {
        tracing::debug!(
            task_id = %entry.task.id,
            passed_over = entry.passed_over,
            "granting worker"
        );
        match self.worker.execute(&entry.task, self.mode).await {
            Ok(TaskOutcome::Preempted { sequence }) => {
                tracing::debug!(task_id = %entry.task.id, sequence, "requeued after quantum");
                self.queue.requeue(entry);
            }
            Err(WorkerError::LockLost { holder }) => {
                tracing::warn!(task_id = %entry.task.id, holder = %holder, "lease lost, requeued");
                self.queue.requeue(entry);
            }
            result => {
                if let Some(reply) = self.replies.remove(&entry.seq) {
                    // The submitter may have stopped waiting
                    let _ = reply.send(result.map_err(SchedulerError::from));
                }
            }
        }
    }
}

/// Runs the job's current context through a resource-bound task and stores
/// the task's output as the job's AI output.
///
/// The task id is derived from the job and phase, so re-running the phase
/// after a crash picks up the task's checkpoints instead of starting over.
pub struct ResourcePhase {
    name: String,
    kind: TaskKind,
    handle: SupervisorHandle,
}

impl ResourcePhase {
    pub fn new(name: impl Into<String>, kind: TaskKind, handle: SupervisorHandle) -> Self {
        Self {
            name: name.into(),
            kind,
            handle,
        }
    }
}

#[async_trait]
impl Phase for ResourcePhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut PhaseContext) -> Result<PhaseOutcome, PhaseError> {
        let task_id = TaskId::new(format!("{}-{}", ctx.job_id, self.name));
        let task = WorkTask::new(
            task_id.clone(),
            self.kind,
            json!({
                "payload": ctx.payload.as_str(),
                "context": ctx.context,
            }),
        )
        .for_job(ctx.job_id.clone());

        match self.handle.submit(task).await {
            Ok(TaskOutcome::Completed { output }) => {
                ctx.ai_output = Some(output);
                Ok(PhaseOutcome::Advance)
            }
            Ok(TaskOutcome::Failed { reason }) => Err(PhaseError::Task { task_id, reason }),
            Ok(TaskOutcome::Preempted { sequence }) => Err(PhaseError::Task {
                task_id,
                reason: format!("returned while preempted at checkpoint {}", sequence),
            }),
            Err(SchedulerError::Closed) => Err(PhaseError::SchedulerUnavailable),
            Err(SchedulerError::Worker(e)) => Err(PhaseError::Task {
                task_id,
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
