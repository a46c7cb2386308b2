// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Final processing: human corrections and the fine-tuning export

use foundry_core::{
    Clock, CorrectionExample, CorrectionRecord, CorrectionStatus, JobEvent, JobId,
    JobStatus, TransitionError,
};
use foundry_storage::{JobStore, StorageError};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CorrectionError {
    #[error(transparent)]
    Storage(StorageError),
    /// The job is not ready for final processing
    #[error(transparent)]
    Transition(TransitionError),
}

impl From<StorageError> for CorrectionError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Transition(e) => CorrectionError::Transition(e),
            other => CorrectionError::Storage(other),
        }
    }
}

pub struct CorrectionDesk<S, C> {
    store: Arc<S>,
    clock: C,
}

impl<S, C> CorrectionDesk<S, C>
where
    S: JobStore,
    C: Clock,
{
    pub fn new(store: Arc<S>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Record the human-corrected output and complete the job.
    ///
    /// Saving again on a completed job replaces the stored correction and
    /// approves it again.
    pub fn save_correction(
        &self,
        job_id: &JobId,
        corrected: Value,
    ) -> Result<CorrectionRecord, CorrectionError> {
        let mut events = Vec::new();
        let record = self.store.update_job(job_id, &mut |record| {
            if record.job.status == JobStatus::Completed && record.correction.is_some() {
                record.job.corrected_output = Some(corrected.clone());
            } else {
                let (job, produced) = record.job.transition(
                    JobEvent::Finalize {
                        corrected_output: Some(corrected.clone()),
                    },
                    &self.clock,
                )?;
                record.job = job;
                events = produced;
            }

            let now = self.clock.now();
            let created_at = record.correction.as_ref().map_or(now, |c| c.created_at);
            record.correction = Some(CorrectionRecord {
                job_id: record.job.id.clone(),
                source: record.job.payload.clone(),
                original_output: record.job.ai_output.clone(),
                corrected_output: corrected.clone(),
                status: CorrectionStatus::ApprovedForFinetuning,
                created_at,
                updated_at: now,
            });
            Ok(())
        })?;

        for event in &events {
            event.log();
        }
        tracing::info!(job_id = %job_id, "correction saved");
        missing(record.correction, job_id)
    }

    /// Move a correction between review states
    pub fn review(
        &self,
        job_id: &JobId,
        status: CorrectionStatus,
    ) -> Result<CorrectionRecord, CorrectionError> {
        let record = self.store.update_job(job_id, &mut |record| {
            let correction = record.correction.as_mut().ok_or_else(|| StorageError::NotFound {
                kind: "correction",
                id: job_id.to_string(),
            })?;
            correction.status = status;
            correction.updated_at = self.clock.now();
            Ok(())
        })?;
        tracing::info!(job_id = %job_id, status = %status, "correction reviewed");
        missing(record.correction, job_id)
    }

    pub fn list(
        &self,
        status: Option<CorrectionStatus>,
    ) -> Result<Vec<CorrectionRecord>, CorrectionError> {
        Ok(self.store.corrections(status)?)
    }

    /// Export records for dataset building, oldest job first
    pub fn export(
        &self,
        status: CorrectionStatus,
    ) -> Result<Vec<CorrectionExample>, CorrectionError> {
        let examples: Vec<CorrectionExample> = self
            .store
            .corrections(Some(status))?
            .iter()
            .map(CorrectionRecord::example)
            .collect();
        tracing::debug!(status = %status, count = examples.len(), "exported corrections");
        Ok(examples)
    }
}

fn missing(
    correction: Option<CorrectionRecord>,
    job_id: &JobId,
) -> Result<CorrectionRecord, CorrectionError> {
    correction.ok_or_else(|| {
        CorrectionError::Storage(StorageError::NotFound {
            kind: "correction",
            id: job_id.to_string(),
        })
    })
}

#[cfg(test)]
#[path = "corrections_tests.rs"]
mod tests;
