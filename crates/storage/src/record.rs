// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stored job records

use chrono::{DateTime, Utc};
use foundry_core::{
    ClarificationId, ClarificationRequest, CorrectionRecord, Job, JobId, JobStatus,
};
use serde::{Deserialize, Serialize};

/// Everything stored for one job, written as a single unit.
///
/// Clarification requests and the correction live beside the job so a
/// status change and the requests it raises commit together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job: Job,
    #[serde(default)]
    pub clarifications: Vec<ClarificationRequest>,
    #[serde(default)]
    pub correction: Option<CorrectionRecord>,
}

impl JobRecord {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            clarifications: Vec::new(),
            correction: None,
        }
    }

    pub fn open_requests(&self) -> impl Iterator<Item = &ClarificationRequest> {
        self.clarifications.iter().filter(|c| c.is_open())
    }

    pub fn has_open_requests(&self) -> bool {
        self.open_requests().next().is_some()
    }

    pub fn clarification(&self, id: &ClarificationId) -> Option<&ClarificationRequest> {
        self.clarifications.iter().find(|c| &c.id == id)
    }

    pub fn clarification_mut(&mut self, id: &ClarificationId) -> Option<&mut ClarificationRequest> {
        self.clarifications.iter_mut().find(|c| &c.id == id)
    }
}

/// One persisted (status, cursor) step in a job's life
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub job_id: JobId,
    pub revision: u64,
    pub status: JobStatus,
    pub cursor: usize,
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn of(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            revision: job.revision,
            status: job.status,
            cursor: job.cursor,
            at: job.updated_at,
        }
    }
}
