// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline executor
//!
//! Runs a job's phases in order from its stored cursor. Each phase's result
//! is committed with a compare-and-swap on the job revision before the next
//! phase starts, so a crash or a lost race leaves the job at its last
//! committed state.

use crate::phase::{PhaseContext, PhaseOutcome};
use crate::registry::PipelineRegistry;
use foundry_core::{
    ClarificationError, ClarificationId, ClarificationRequest, Clock, Event, IdGen, Job,
    JobEvent, JobId, JobStatus, PayloadRef, TransitionError,
};
use foundry_storage::{JobRecord, JobStore, StorageError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::Instrument;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Clarification(#[from] ClarificationError),
}

/// Where a call to [`PipelineExecutor::run`] left the job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every phase succeeded
    Ready,
    /// Parked until `open` requests are resolved
    AwaitingClarification { open: usize },
    /// A phase (or the registry lookup) failed; the job is FAILED
    Failed { reason: String },
    /// Final processing already happened; nothing ran
    Completed,
}

/// Result of resolving one clarification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOutcome {
    pub job_id: JobId,
    /// Requests still open for the job
    pub remaining: usize,
}

impl ResolveOutcome {
    /// True once the job's last open request is resolved
    pub fn unblocked(&self) -> bool {
        self.remaining == 0
    }
}

pub struct PipelineExecutor<S, C, G> {
    store: Arc<S>,
    clock: C,
    ids: G,
}

impl<S, C, G> PipelineExecutor<S, C, G>
where
    S: JobStore,
    C: Clock,
    G: IdGen,
{
    pub fn new(store: Arc<S>, clock: C, ids: G) -> Self {
        Self { store, clock, ids }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create a job for `pipeline`. The pipeline is looked up when the job runs.
    pub fn submit(
        &self,
        pipeline: &str,
        payload: PayloadRef,
        input: Value,
    ) -> Result<Job, ExecuteError> {
        let job = Job::new(self.ids.next(), pipeline, payload, input, &self.clock);
        self.store.insert_job(&job)?;
        Event::JobCreated {
            id: job.id.clone(),
            pipeline: job.pipeline.clone(),
        }
        .log();
        Ok(job)
    }

    /// Run the job's remaining phases.
    ///
    /// Safe to call again after a crash, after resolution, or on a job that
    /// is already finished. Never retries a failed phase.
    pub async fn run(
        &self,
        registry: &PipelineRegistry,
        job_id: &JobId,
    ) -> Result<RunOutcome, ExecuteError> {
        let span = tracing::info_span!("pipeline.run", job_id = %job_id);
        async {
            let start = Instant::now();
            let result = self.run_inner(registry, job_id).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(outcome) => tracing::info!(elapsed_ms, outcome = ?outcome, "completed"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_inner(
        &self,
        registry: &PipelineRegistry,
        job_id: &JobId,
    ) -> Result<RunOutcome, ExecuteError> {
        let mut record = self.store.load_job(job_id)?;

        match record.job.status {
            JobStatus::Completed => return Ok(RunOutcome::Completed),
            JobStatus::ReadyForFinalProcessing => return Ok(RunOutcome::Ready),
            JobStatus::Failed => {
                let reason = record
                    .job
                    .error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_default();
                return Ok(RunOutcome::Failed { reason });
            }
            JobStatus::PendingClarification if record.has_open_requests() => {
                let open = record.open_requests().count();
                tracing::debug!(open, "awaiting clarification");
                return Ok(RunOutcome::AwaitingClarification { open });
            }
            _ => {}
        }

        let Some(pipeline) = registry.get(&record.job.pipeline) else {
            let reason = format!("pipeline '{}' is not registered", record.job.pipeline);
            self.fail(&record.job, None, &reason)?;
            return Ok(RunOutcome::Failed { reason });
        };
        let phases = pipeline.phases();
        let phase_count = phases.len();

        match record.job.status {
            JobStatus::Created => {
                record.job =
                    self.commit(&record.job, JobEvent::Start, "starting".to_string(), 0, Vec::new())?;
            }
            JobStatus::PendingClarification => {
                let done = percent(record.job.cursor, phase_count);
                record.job = self.commit(
                    &record.job,
                    JobEvent::Resume,
                    "resuming".to_string(),
                    done,
                    Vec::new(),
                )?;
            }
            _ => {}
        }

        loop {
            let Some(phase) = phases.get(record.job.cursor) else {
                let reason = format!(
                    "cursor {} is past the {} phases of pipeline '{}'",
                    record.job.cursor, phase_count, pipeline.name()
                );
                self.fail(&record.job, None, &reason)?;
                return Ok(RunOutcome::Failed { reason });
            };

            let mut ctx = PhaseContext::for_phase(&record, phase.name());
            let started = Instant::now();
            let result = phase.run(&mut ctx).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(PhaseOutcome::NeedsClarification(pending)) if !pending.is_empty() => {
                    let requests: Vec<ClarificationRequest> = pending
                        .into_iter()
                        .map(|p| {
                            ClarificationRequest::open(
                                self.ids.next(),
                                record.job.id.clone(),
                                phase.name(),
                                p.detector,
                                p.draft,
                                &self.clock,
                            )
                        })
                        .collect();
                    let open = requests.len();
                    tracing::info!(phase = phase.name(), elapsed_ms, open, "phase needs clarification");
                    self.commit(
                        &record.job,
                        JobEvent::ClarificationRequested { requests: open },
                        format!("waiting on {} clarification request(s) in '{}'", open, phase.name()),
                        percent(record.job.cursor, phase_count),
                        requests,
                    )?;
                    return Ok(RunOutcome::AwaitingClarification { open });
                }
                Ok(_) => {
                    tracing::info!(phase = phase.name(), elapsed_ms, "phase succeeded");
                    record.job = self.commit(
                        &record.job,
                        JobEvent::PhaseSucceeded {
                            phase_count,
                            context: ctx.context,
                            ai_output: ctx.ai_output,
                        },
                        format!("phase '{}' complete", phase.name()),
                        percent(record.job.cursor + 1, phase_count),
                        Vec::new(),
                    )?;
                    if record.job.status == JobStatus::ReadyForFinalProcessing {
                        return Ok(RunOutcome::Ready);
                    }
                }
                Err(e) => {
                    let reason = e.to_string();
                    tracing::warn!(phase = phase.name(), elapsed_ms, error = %reason, "phase failed");
                    self.fail(&record.job, Some(phase.name()), &reason)?;
                    return Ok(RunOutcome::Failed { reason });
                }
            }
        }
    }

    /// Record a human resolution for one request
    pub fn resolve(
        &self,
        request_id: &ClarificationId,
        resolution: Value,
    ) -> Result<ResolveOutcome, ExecuteError> {
        let request = self.store.find_clarification(request_id)?;
        let mut events = Vec::new();

        let record = self.store.update_job(&request.job_id, &mut |record| {
            let current = record
                .clarification(request_id)
                .ok_or_else(|| ClarificationError::NotFound(request_id.clone()))?;
            let (resolved, event) = current.resolve(resolution.clone(), &self.clock)?;
            if let Some(slot) = record.clarification_mut(request_id) {
                *slot = resolved;
            }
            events = vec![event];
            Ok(())
        })?;

        for event in &events {
            event.log();
        }
        Ok(ResolveOutcome {
            job_id: request.job_id,
            remaining: record.open_requests().count(),
        })
    }

    pub fn load(&self, job_id: &JobId) -> Result<JobRecord, ExecuteError> {
        Ok(self.store.load_job(job_id)?)
    }

    fn fail(&self, job: &Job, phase: Option<&str>, reason: &str) -> Result<Job, ExecuteError> {
        self.commit(
            job,
            JobEvent::Fail {
                phase: phase.map(str::to_string),
                reason: reason.to_string(),
            },
            format!("failed: {}", reason),
            job.progress.as_ref().map(|p| u32::from(p.percent)).unwrap_or(0),
            Vec::new(),
        )
    }

    /// Apply `event` and persist the result only if nobody committed since
    /// `current` was read
    fn commit(
        &self,
        current: &Job,
        event: JobEvent,
        message: String,
        percent: u32,
        requests: Vec<ClarificationRequest>,
    ) -> Result<Job, ExecuteError> {
        let (next, mut events) = current.transition(event, &self.clock)?;
        let next = next.with_progress(message, percent, &self.clock);
        events.extend(requests.iter().map(ClarificationRequest::raised_event));

        self.store.update_job(&current.id, &mut |record| {
            if record.job.revision != current.revision {
                return Err(StorageError::Conflict {
                    id: current.id.clone(),
                    expected: current.revision,
                    actual: record.job.revision,
                });
            }
            record.job = next.clone();
            record.clarifications.extend(requests.iter().cloned());
            Ok(())
        })?;

        for event in &events {
            event.log();
        }
        Ok(next)
    }
}

fn percent(done: usize, total: usize) -> u32 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u32
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
