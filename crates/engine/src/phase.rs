// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phase contract

use async_trait::async_trait;
use foundry_core::{ClarificationDraft, ClarificationRequest, JobId, PayloadRef, TaskId};
use foundry_storage::JobRecord;
use serde_json::Value;
use thiserror::Error;

/// A phase's non-recoverable failure. Fatal to the job, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("{0}")]
    Failed(String),
    #[error("task {task_id} failed: {reason}")]
    Task { task_id: TaskId, reason: String },
    #[error("resource scheduler is not running")]
    SchedulerUnavailable,
}

impl PhaseError {
    pub fn failed(message: impl Into<String>) -> Self {
        PhaseError::Failed(message.into())
    }
}

/// A clarification a phase wants raised, tagged with the detector behind it
#[derive(Debug, Clone, PartialEq)]
pub struct PendingClarification {
    pub detector: String,
    pub draft: ClarificationDraft,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    /// Commit the context and move to the next phase
    Advance,
    /// Park the job until every request is resolved
    NeedsClarification(Vec<PendingClarification>),
}

/// What a phase sees of its job.
///
/// `context` and `ai_output` start as the last committed values; changes
/// are committed only if the phase advances.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub job_id: JobId,
    pub pipeline: String,
    pub phase: String,
    pub payload: PayloadRef,
    pub input: Value,
    pub context: Value,
    pub ai_output: Option<Value>,
    /// Requests this phase raised on earlier runs, open and resolved
    pub clarifications: Vec<ClarificationRequest>,
}

impl PhaseContext {
    pub fn for_phase(record: &JobRecord, phase: &str) -> Self {
        let job = &record.job;
        Self {
            job_id: job.id.clone(),
            pipeline: job.pipeline.clone(),
            phase: phase.to_string(),
            payload: job.payload.clone(),
            input: job.input.clone(),
            context: job.context.clone(),
            ai_output: job.ai_output.clone(),
            clarifications: record
                .clarifications
                .iter()
                .filter(|c| c.phase == phase)
                .cloned()
                .collect(),
        }
    }
}

/// One ordered step of a pipeline. Stateless between runs.
#[async_trait]
pub trait Phase: Send + Sync {
    /// Unique within its pipeline
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut PhaseContext) -> Result<PhaseOutcome, PhaseError>;
}
