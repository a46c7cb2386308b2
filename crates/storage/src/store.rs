// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage traits shared by every backend

use crate::error::StorageError;
use crate::record::{HistoryEntry, JobRecord};
use foundry_core::{
    Checkpoint, ClarificationId, ClarificationRequest, CorrectionRecord, CorrectionStatus, Job,
    JobId, LeaseConfig, ResourceLock, TaskId,
};

/// Closure applied to a job record inside one atomic update
pub type JobUpdate<'a> = &'a mut dyn FnMut(&mut JobRecord) -> Result<(), StorageError>;

/// Closure applied to a lock record; `None` leaves the record untouched
pub type LockUpdate<'a> = &'a mut dyn FnMut(&ResourceLock) -> Option<ResourceLock>;

/// Job records, their clarification requests, and corrections
pub trait JobStore: Send + Sync {
    /// Store a new job; fails if the id is taken
    fn insert_job(&self, job: &Job) -> Result<(), StorageError>;

    fn load_job(&self, id: &JobId) -> Result<JobRecord, StorageError>;

    /// All jobs, oldest first
    fn list_jobs(&self) -> Result<Vec<JobRecord>, StorageError>;

    /// Read-modify-write one record atomically.
    ///
    /// If `update` fails nothing is written. A change of job revision is
    /// appended to the job's history in the same step.
    fn update_job(&self, id: &JobId, update: JobUpdate<'_>) -> Result<JobRecord, StorageError>;

    /// Every persisted (status, cursor) step for a job, oldest first
    fn history(&self, id: &JobId) -> Result<Vec<HistoryEntry>, StorageError>;

    /// Look up by full id, or by a prefix matching exactly one job
    fn find_job(&self, prefix: &str) -> Result<JobRecord, StorageError> {
        match self.load_job(&JobId::new(prefix)) {
            Ok(record) => return Ok(record),
            Err(StorageError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        let mut matches: Vec<JobRecord> = self
            .list_jobs()?
            .into_iter()
            .filter(|r| r.job.id.as_str().starts_with(prefix))
            .collect();
        match matches.len() {
            0 => Err(StorageError::NotFound {
                kind: "job",
                id: prefix.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            count => Err(StorageError::Ambiguous {
                prefix: prefix.to_string(),
                count,
            }),
        }
    }

    /// Clarification requests, for one job or all of them, oldest first
    fn clarifications(
        &self,
        job_id: Option<&JobId>,
    ) -> Result<Vec<ClarificationRequest>, StorageError> {
        let records = match job_id {
            Some(id) => vec![self.load_job(id)?],
            None => self.list_jobs()?,
        };
        let mut requests: Vec<ClarificationRequest> = records
            .into_iter()
            .flat_map(|r| r.clarifications)
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(requests)
    }

    /// The oldest open request across all jobs
    fn next_open_clarification(&self) -> Result<Option<ClarificationRequest>, StorageError> {
        Ok(self
            .clarifications(None)?
            .into_iter()
            .find(|c| c.is_open()))
    }

    fn find_clarification(&self, id: &ClarificationId) -> Result<ClarificationRequest, StorageError> {
        self.clarifications(None)?
            .into_iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| StorageError::NotFound {
                kind: "clarification",
                id: id.to_string(),
            })
    }

    /// Correction records, optionally filtered by status, oldest job first
    fn corrections(
        &self,
        status: Option<CorrectionStatus>,
    ) -> Result<Vec<CorrectionRecord>, StorageError> {
        Ok(self
            .list_jobs()?
            .into_iter()
            .filter_map(|r| r.correction)
            .filter(|c| status.is_none() || status == Some(c.status))
            .collect())
    }
}

/// Lease records, one per lock name
pub trait LeaseStore: Send + Sync {
    /// Current record, or a free lock if none was ever written
    fn load_lock(&self, config: &LeaseConfig) -> Result<ResourceLock, StorageError>;

    /// Read-modify-write the lock atomically; returns the record as stored
    fn update_lock(
        &self,
        config: &LeaseConfig,
        update: LockUpdate<'_>,
    ) -> Result<ResourceLock, StorageError>;
}

/// Checkpoints, retained per task in sequence order
pub trait CheckpointStore: Send + Sync {
    /// Store a checkpoint; its sequence must be newer than every stored one
    fn put_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError>;

    /// Every retained checkpoint for a task, lowest sequence first
    fn checkpoints(&self, task_id: &TaskId) -> Result<Vec<Checkpoint>, StorageError>;

    fn latest_checkpoint(&self, task_id: &TaskId) -> Result<Option<Checkpoint>, StorageError> {
        Ok(self.checkpoints(task_id)?.pop())
    }

    /// Highest sequence ever stored for a task, readable or not. The next
    /// checkpoint must use a larger one.
    fn latest_sequence(&self, task_id: &TaskId) -> Result<Option<u64>, StorageError> {
        Ok(self.checkpoints(task_id)?.last().map(|c| c.sequence))
    }
}
