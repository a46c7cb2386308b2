// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job state machine
//!
//! A job is one unit of work advanced through an ordered list of phases.
//! Status and phase cursor only ever change together, through
//! [`Job::transition`], and every successful transition bumps the job's
//! revision so stores can commit it with a compare-and-swap.

use crate::clock::Clock;
use crate::event::Event;
use crate::id::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    InProgress,
    PendingClarification,
    ReadyForFinalProcessing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Created,
        JobStatus::InProgress,
        JobStatus::PendingClarification,
        JobStatus::ReadyForFinalProcessing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobStatus::Created => "created",
            JobStatus::InProgress => "in_progress",
            JobStatus::PendingClarification => "pending_clarification",
            JobStatus::ReadyForFinalProcessing => "ready_for_final_processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Completed and Failed jobs never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the transition graph has an edge from `self` to `next`
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Created, InProgress) => true,
            (InProgress, InProgress | PendingClarification | ReadyForFinalProcessing) => true,
            (PendingClarification, InProgress | ReadyForFinalProcessing) => true,
            (ReadyForFinalProcessing, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.name() == s)
            .ok_or_else(|| TransitionError::UnknownStatus(s.to_string()))
    }
}

/// Opaque handle to the caller-owned input data; never interpreted here
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadRef(pub String);

impl PayloadRef {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PayloadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a job failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Phase that raised the error, if the failure came from a phase
    pub phase: Option<String>,
    pub message: String,
}

/// Short-lived, informational progress record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub message: String,
    /// Percentage, clamped to 0..=100
    pub percent: u8,
    pub updated_at: DateTime<Utc>,
}

impl JobProgress {
    pub fn new(message: impl Into<String>, percent: u32, at: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            percent: percent.min(100) as u8,
            updated_at: at,
        }
    }

    /// Progress older than `ttl` is treated as absent
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.updated_at <= crate::clock::delta(ttl)
    }
}

/// Events that can change job state
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// The executor starts the first phase
    Start,
    /// The phase at the cursor succeeded; its context and output are committed
    PhaseSucceeded {
        phase_count: usize,
        context: Value,
        ai_output: Option<Value>,
    },
    /// The phase at the cursor raised clarification requests
    ClarificationRequested { requests: usize },
    /// Every open clarification request was resolved
    Resume,
    /// Non-recoverable error
    Fail {
        phase: Option<String>,
        reason: String,
    },
    /// Final processing finished, optionally with a human-corrected output
    Finalize { corrected_output: Option<Value> },
}

impl JobEvent {
    fn name(&self) -> &'static str {
        match self {
            JobEvent::Start => "start",
            JobEvent::PhaseSucceeded { .. } => "phase_succeeded",
            JobEvent::ClarificationRequested { .. } => "clarification_requested",
            JobEvent::Resume => "resume",
            JobEvent::Fail { .. } => "fail",
            JobEvent::Finalize { .. } => "finalize",
        }
    }
}

/// Errors from job transitions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job {id}: cannot apply {event} while {status}")]
    Illegal {
        id: JobId,
        status: JobStatus,
        event: &'static str,
    },
    #[error("job {id}: cursor {cursor} is past the last of {phase_count} phases")]
    CursorOutOfRange {
        id: JobId,
        cursor: usize,
        phase_count: usize,
    },
    #[error("unknown job status: {0}")]
    UnknownStatus(String),
}

/// One unit of work tracked through a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Name of the pipeline this job was submitted to
    pub pipeline: String,
    pub status: JobStatus,
    pub payload: PayloadRef,
    /// Caller-supplied input data; seeds the pipeline context
    #[serde(default)]
    pub input: Value,
    /// Working state handed from phase to phase
    #[serde(default)]
    pub context: Value,
    pub ai_output: Option<Value>,
    pub corrected_output: Option<Value>,
    /// Index of the next phase to run
    pub cursor: usize,
    /// Bumped on every transition
    pub revision: u64,
    pub error: Option<JobError>,
    pub progress: Option<JobProgress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        id: impl Into<JobId>,
        pipeline: impl Into<String>,
        payload: PayloadRef,
        input: Value,
        clock: &impl Clock,
    ) -> Self {
        let now = clock.now();
        Self {
            id: id.into(),
            pipeline: pipeline.into(),
            status: JobStatus::Created,
            payload,
            context: input.clone(),
            input,
            ai_output: None,
            corrected_output: None,
            cursor: 0,
            revision: 0,
            error: None,
            progress: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the progress record without touching status or cursor
    pub fn with_progress(mut self, message: impl Into<String>, percent: u32, clock: &impl Clock) -> Self {
        self.progress = Some(JobProgress::new(message, percent, clock.now()));
        self
    }

    /// The progress record, if it is still fresh
    pub fn current_progress(&self, now: DateTime<Utc>, ttl: Duration) -> Option<&JobProgress> {
        self.progress.as_ref().filter(|p| p.is_fresh(now, ttl))
    }

    /// Pure transition function - returns the new job and its events
    pub fn transition(
        &self,
        event: JobEvent,
        clock: &impl Clock,
    ) -> Result<(Job, Vec<Event>), TransitionError> {
        let illegal = || TransitionError::Illegal {
            id: self.id.clone(),
            status: self.status,
            event: event.name(),
        };

        let mut job = self.clone();
        let mut events = Vec::new();

        match &event {
            JobEvent::Start => {
                if self.status != JobStatus::Created {
                    return Err(illegal());
                }
                job.status = JobStatus::InProgress;
                events.push(Event::JobStarted {
                    id: self.id.clone(),
                });
            }

            JobEvent::PhaseSucceeded {
                phase_count,
                context,
                ai_output,
            } => {
                if !matches!(
                    self.status,
                    JobStatus::InProgress | JobStatus::PendingClarification
                ) {
                    return Err(illegal());
                }
                if self.cursor >= *phase_count {
                    return Err(TransitionError::CursorOutOfRange {
                        id: self.id.clone(),
                        cursor: self.cursor,
                        phase_count: *phase_count,
                    });
                }
                job.cursor = self.cursor + 1;
                job.context = context.clone();
                if let Some(output) = ai_output {
                    job.ai_output = Some(output.clone());
                }
                if job.cursor == *phase_count {
                    job.status = JobStatus::ReadyForFinalProcessing;
                    events.push(Event::JobReady {
                        id: self.id.clone(),
                    });
                } else {
                    job.status = JobStatus::InProgress;
                    events.push(Event::JobPhase {
                        id: self.id.clone(),
                        cursor: job.cursor,
                    });
                }
            }

            JobEvent::ClarificationRequested { requests } => {
                if self.status != JobStatus::InProgress || *requests == 0 {
                    return Err(illegal());
                }
                job.status = JobStatus::PendingClarification;
                events.push(Event::JobPaused {
                    id: self.id.clone(),
                    cursor: self.cursor,
                    requests: *requests,
                });
            }

            JobEvent::Resume => {
                if self.status != JobStatus::PendingClarification {
                    return Err(illegal());
                }
                job.status = JobStatus::InProgress;
                events.push(Event::JobResumed {
                    id: self.id.clone(),
                    cursor: self.cursor,
                });
            }

            JobEvent::Fail { phase, reason } => {
                if self.status.is_terminal() {
                    return Err(illegal());
                }
                job.status = JobStatus::Failed;
                job.error = Some(JobError {
                    phase: phase.clone(),
                    message: reason.clone(),
                });
                events.push(Event::JobFailed {
                    id: self.id.clone(),
                    reason: reason.clone(),
                });
            }

            JobEvent::Finalize { corrected_output } => {
                if self.status != JobStatus::ReadyForFinalProcessing {
                    return Err(illegal());
                }
                job.status = JobStatus::Completed;
                if let Some(corrected) = corrected_output {
                    job.corrected_output = Some(corrected.clone());
                }
                events.push(Event::JobCompleted {
                    id: self.id.clone(),
                });
            }
        }

        job.revision = self.revision + 1;
        job.updated_at = clock.now();
        Ok((job, events))
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
