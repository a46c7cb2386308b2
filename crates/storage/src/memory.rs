// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store

use crate::error::StorageError;
use crate::record::{HistoryEntry, JobRecord};
use crate::store::{CheckpointStore, JobStore, JobUpdate, LeaseStore, LockUpdate};
use foundry_core::{Checkpoint, Job, JobId, LeaseConfig, ResourceLock, TaskId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, JobRecord>,
    history: Vec<HistoryEntry>,
    locks: HashMap<String, ResourceLock>,
    checkpoints: HashMap<TaskId, Vec<Checkpoint>>,
}

/// Store keeping every record in process memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Overwrite a stored checkpoint in place, bypassing sequence checks
    pub fn tamper_checkpoint(&self, checkpoint: Checkpoint) {
        let mut inner = self.lock();
        let list = inner
            .checkpoints
            .entry(checkpoint.task_id.clone())
            .or_default();
        match list.iter_mut().find(|c| c.sequence == checkpoint.sequence) {
            Some(slot) => *slot = checkpoint,
            None => list.push(checkpoint),
        }
    }
}

impl JobStore for MemoryStore {
    fn insert_job(&self, job: &Job) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if inner.jobs.contains_key(&job.id) {
            return Err(StorageError::AlreadyExists {
                kind: "job",
                id: job.id.to_string(),
            });
        }
        inner.history.push(HistoryEntry::of(job));
        inner.jobs.insert(job.id.clone(), JobRecord::new(job.clone()));
        Ok(())
    }

    fn load_job(&self, id: &JobId) -> Result<JobRecord, StorageError> {
        self.lock()
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "job",
                id: id.to_string(),
            })
    }

    fn list_jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
        let mut records: Vec<JobRecord> = self.lock().jobs.values().cloned().collect();
        records.sort_by(|a, b| {
            a.job
                .created_at
                .cmp(&b.job.created_at)
                .then(a.job.id.cmp(&b.job.id))
        });
        Ok(records)
    }

    fn update_job(&self, id: &JobId, update: JobUpdate<'_>) -> Result<JobRecord, StorageError> {
        let mut inner = self.lock();
        let mut record = inner
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                kind: "job",
                id: id.to_string(),
            })?;
        let previous = record.job.revision;
        update(&mut record)?;
        if record.job.revision != previous {
            inner.history.push(HistoryEntry::of(&record.job));
        }
        inner.jobs.insert(id.clone(), record.clone());
        Ok(record)
    }

    fn history(&self, id: &JobId) -> Result<Vec<HistoryEntry>, StorageError> {
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|h| &h.job_id == id)
            .cloned()
            .collect())
    }
}

impl LeaseStore for MemoryStore {
    fn load_lock(&self, config: &LeaseConfig) -> Result<ResourceLock, StorageError> {
        let inner = self.lock();
        Ok(stored_or_new(inner.locks.get(&config.name), config))
    }

    fn update_lock(
        &self,
        config: &LeaseConfig,
        update: LockUpdate<'_>,
    ) -> Result<ResourceLock, StorageError> {
        let mut inner = self.lock();
        let current = stored_or_new(inner.locks.get(&config.name), config);
        match update(&current) {
            Some(next) => {
                inner.locks.insert(config.name.clone(), next.clone());
                Ok(next)
            }
            None => Ok(current),
        }
    }
}

impl CheckpointStore for MemoryStore {
    fn put_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let mut inner = self.lock();
        let list = inner
            .checkpoints
            .entry(checkpoint.task_id.clone())
            .or_default();
        if let Some(latest) = list.last() {
            if checkpoint.sequence <= latest.sequence {
                return Err(StorageError::StaleCheckpoint {
                    task_id: checkpoint.task_id.clone(),
                    sequence: checkpoint.sequence,
                    latest: latest.sequence,
                });
            }
        }
        list.push(checkpoint.clone());
        Ok(())
    }

    fn checkpoints(&self, task_id: &TaskId) -> Result<Vec<Checkpoint>, StorageError> {
        Ok(self
            .lock()
            .checkpoints
            .get(task_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// The stored lock with the caller's lease settings, or a fresh free lock
pub(crate) fn stored_or_new(stored: Option<&ResourceLock>, config: &LeaseConfig) -> ResourceLock {
    match stored {
        Some(lock) => {
            let mut lock = lock.clone();
            lock.config = config.clone();
            lock
        }
        None => ResourceLock::new(config.clone()),
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
