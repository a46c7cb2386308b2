// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events emitted by state machines
//!
//! Transitions return the events they produce; the engine logs them and
//! callers may forward them elsewhere.

use crate::id::{ClarificationId, HolderId, JobId, TaskId};
use serde::{Deserialize, Serialize};

/// Events emitted by state machines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    // Job events
    JobCreated {
        id: JobId,
        pipeline: String,
    },
    JobStarted {
        id: JobId,
    },
    JobPhase {
        id: JobId,
        cursor: usize,
    },
    JobPaused {
        id: JobId,
        cursor: usize,
        requests: usize,
    },
    JobResumed {
        id: JobId,
        cursor: usize,
    },
    JobReady {
        id: JobId,
    },
    JobCompleted {
        id: JobId,
    },
    JobFailed {
        id: JobId,
        reason: String,
    },

    // Clarification events
    ClarificationRaised {
        id: ClarificationId,
        job_id: JobId,
        request_type: String,
    },
    ClarificationResolved {
        id: ClarificationId,
        job_id: JobId,
    },

    // Lock events
    LockQueued {
        name: String,
        holder: HolderId,
        position: usize,
    },
    LockAcquired {
        name: String,
        holder: HolderId,
    },
    LockRenewed {
        name: String,
        holder: HolderId,
    },
    LockReleased {
        name: String,
        holder: HolderId,
    },
    LockDenied {
        name: String,
        holder: HolderId,
        current_holder: Option<HolderId>,
    },
    LockReclaimed {
        name: String,
        previous_holder: HolderId,
        new_holder: Option<HolderId>,
    },
    LockLost {
        name: String,
        holder: HolderId,
    },

    // Task events
    CheckpointWritten {
        task_id: TaskId,
        sequence: u64,
        complete: bool,
    },
    CheckpointRejected {
        task_id: TaskId,
        sequence: u64,
    },
    TaskPreempted {
        task_id: TaskId,
        sequence: u64,
    },
    TaskCompleted {
        task_id: TaskId,
    },
    TaskFailed {
        task_id: TaskId,
        reason: String,
    },
}

impl Event {
    /// Get the event name for pattern matching
    /// Format: "category:action"
    pub fn name(&self) -> &'static str {
        match self {
            Event::JobCreated { .. } => "job:created",
            Event::JobStarted { .. } => "job:started",
            Event::JobPhase { .. } => "job:phase",
            Event::JobPaused { .. } => "job:paused",
            Event::JobResumed { .. } => "job:resumed",
            Event::JobReady { .. } => "job:ready",
            Event::JobCompleted { .. } => "job:completed",
            Event::JobFailed { .. } => "job:failed",

            Event::ClarificationRaised { .. } => "clarification:raised",
            Event::ClarificationResolved { .. } => "clarification:resolved",

            Event::LockQueued { .. } => "lock:queued",
            Event::LockAcquired { .. } => "lock:acquired",
            Event::LockRenewed { .. } => "lock:renewed",
            Event::LockReleased { .. } => "lock:released",
            Event::LockDenied { .. } => "lock:denied",
            Event::LockReclaimed { .. } => "lock:reclaimed",
            Event::LockLost { .. } => "lock:lost",

            Event::CheckpointWritten { .. } => "checkpoint:written",
            Event::CheckpointRejected { .. } => "checkpoint:rejected",
            Event::TaskPreempted { .. } => "task:preempted",
            Event::TaskCompleted { .. } => "task:completed",
            Event::TaskFailed { .. } => "task:failed",
        }
    }

    /// Log this event at a level matching its severity
    pub fn log(&self) {
        match self {
            Event::JobFailed { .. }
            | Event::LockLost { .. }
            | Event::LockReclaimed { .. }
            | Event::CheckpointRejected { .. }
            | Event::TaskFailed { .. } => {
                tracing::warn!(event = self.name(), detail = ?self, "event")
            }
            Event::LockDenied { .. } | Event::LockRenewed { .. } | Event::LockQueued { .. } => {
                tracing::debug!(event = self.name(), detail = ?self, "event")
            }
            _ => tracing::info!(event = self.name(), detail = ?self, "event"),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
