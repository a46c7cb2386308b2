// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clarification requests raised by human-in-the-loop phases

use crate::clock::Clock;
use crate::event::Event;
use crate::id::{ClarificationId, JobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClarificationStatus {
    Open,
    Resolved,
}

/// What a detector wants to ask, before it is persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationDraft {
    /// Developer-chosen kind, e.g. `REVIEW_OCR`
    pub request_type: String,
    /// Schema-free context for whoever resolves the request
    pub fields: Value,
}

impl ClarificationDraft {
    pub fn new(request_type: impl Into<String>, fields: Value) -> Self {
        Self {
            request_type: request_type.into(),
            fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClarificationError {
    #[error("clarification request {0} is already resolved")]
    AlreadyResolved(ClarificationId),
    #[error("clarification request {0} not found")]
    NotFound(ClarificationId),
}

/// An explicit request for human-supplied information about a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRequest {
    pub id: ClarificationId,
    pub job_id: JobId,
    /// Phase that raised the request
    pub phase: String,
    /// Detector that produced the draft
    pub detector: String,
    pub request_type: String,
    pub fields: Value,
    pub status: ClarificationStatus,
    pub resolution: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ClarificationRequest {
    pub fn open(
        id: impl Into<ClarificationId>,
        job_id: JobId,
        phase: impl Into<String>,
        detector: impl Into<String>,
        draft: ClarificationDraft,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: id.into(),
            job_id,
            phase: phase.into(),
            detector: detector.into(),
            request_type: draft.request_type,
            fields: draft.fields,
            status: ClarificationStatus::Open,
            resolution: None,
            created_at: clock.now(),
            resolved_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ClarificationStatus::Open
    }

    /// Whether this request was raised for the same question as `draft`
    pub fn matches(&self, detector: &str, draft: &ClarificationDraft) -> bool {
        self.detector == detector
            && self.request_type == draft.request_type
            && self.fields == draft.fields
    }

    pub fn raised_event(&self) -> Event {
        Event::ClarificationRaised {
            id: self.id.clone(),
            job_id: self.job_id.clone(),
            request_type: self.request_type.clone(),
        }
    }

    /// Record the resolution. A request resolves exactly once.
    pub fn resolve(
        &self,
        resolution: Value,
        clock: &impl Clock,
    ) -> Result<(ClarificationRequest, Event), ClarificationError> {
        if !self.is_open() {
            return Err(ClarificationError::AlreadyResolved(self.id.clone()));
        }
        let mut resolved = self.clone();
        resolved.status = ClarificationStatus::Resolved;
        resolved.resolution = Some(resolution);
        resolved.resolved_at = Some(clock.now());
        let event = Event::ClarificationResolved {
            id: self.id.clone(),
            job_id: self.job_id.clone(),
        };
        Ok((resolved, event))
    }
}

#[cfg(test)]
#[path = "clarification_tests.rs"]
mod tests;
