// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed store shared by independent processes
//!
//! Layout under the root directory:
//!
//! ```text
//! jobs/<job-id>.json                 job record (job, clarifications, correction)
//! locks/<name>.json                  lease record
//! checkpoints/<task-id>/<seq>.json   retained checkpoints
//! history.wal                        job history, one entry per line
//! .store.lock                        held exclusively for every write
//! ```

use crate::error::StorageError;
use crate::json::{check_key, JsonDir};
use crate::memory::stored_or_new;
use crate::record::{HistoryEntry, JobRecord};
use crate::store::{CheckpointStore, JobStore, JobUpdate, LeaseStore, LockUpdate};
use crate::wal::Wal;
use foundry_core::{Checkpoint, Job, JobId, LeaseConfig, ResourceLock, TaskId};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

const JOBS: &str = "jobs";
const LOCKS: &str = "locks";

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: JsonDir,
    history_path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = JsonDir::open(root)?;
        let history_path = dir.base_path().join("history.wal");
        let lock_path = dir.base_path().join(".store.lock");
        Ok(Self {
            dir,
            history_path,
            lock_path,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.base_path()
    }

    /// Run `f` while holding the store-wide exclusive file lock
    fn exclusive<T>(
        &self,
        f: impl FnOnce() -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)?;
        file.lock_exclusive()?;
        // Released when `file` is dropped
        f()
    }

    fn checkpoint_kind(task_id: &TaskId) -> Result<String, StorageError> {
        check_key(task_id.as_str())?;
        Ok(format!("checkpoints/{}", task_id))
    }

    /// Highest sequence among checkpoint file names, including files that
    /// no longer parse
    fn stored_sequence(&self, kind: &str) -> Result<Option<u64>, StorageError> {
        Ok(self
            .dir
            .list(kind)?
            .iter()
            .filter_map(|name| name.parse::<u64>().ok())
            .max())
    }

    /// Append to the history log after the record is committed. The record
    /// is authoritative, so a failed append is logged rather than returned.
    fn append_history(&self, job: &Job) {
        let appended = Wal::open(&self.history_path).and_then(|mut wal| wal.append(&HistoryEntry::of(job)));
        if let Err(e) = appended {
            tracing::warn!(
                job_id = %job.id,
                revision = job.revision,
                error = %e,
                "history append failed"
            );
        }
    }
}

impl JobStore for FileStore {
    fn insert_job(&self, job: &Job) -> Result<(), StorageError> {
        self.exclusive(|| {
            let existing: Option<JobRecord> = self.dir.load(JOBS, job.id.as_str())?;
            if existing.is_some() {
                return Err(StorageError::AlreadyExists {
                    kind: "job",
                    id: job.id.to_string(),
                });
            }
            self.dir
                .save(JOBS, job.id.as_str(), &JobRecord::new(job.clone()))?;
            self.append_history(job);
            Ok(())
        })
    }

    fn load_job(&self, id: &JobId) -> Result<JobRecord, StorageError> {
        self.dir
            .load(JOBS, id.as_str())?
            .ok_or_else(|| StorageError::NotFound {
                kind: "job",
                id: id.to_string(),
            })
    }

    fn list_jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
        let mut records = Vec::new();
        for id in self.dir.list(JOBS)? {
            // A record removed between list and load is skipped
            if let Some(record) = self.dir.load::<JobRecord>(JOBS, &id)? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| {
            a.job
                .created_at
                .cmp(&b.job.created_at)
                .then(a.job.id.cmp(&b.job.id))
        });
        Ok(records)
    }

    fn update_job(&self, id: &JobId, update: JobUpdate<'_>) -> Result<JobRecord, StorageError> {
        self.exclusive(|| {
            let mut record = self.load_job(id)?;
            let previous = record.job.revision;
            update(&mut record)?;
            self.dir.save(JOBS, id.as_str(), &record)?;
            if record.job.revision != previous {
                self.append_history(&record.job);
            }
            Ok(record)
        })
    }

    fn history(&self, id: &JobId) -> Result<Vec<HistoryEntry>, StorageError> {
        Ok(Wal::replay(&self.history_path)?
            .into_iter()
            .filter(|h| &h.job_id == id)
            .collect())
    }
}

impl LeaseStore for FileStore {
    fn load_lock(&self, config: &LeaseConfig) -> Result<ResourceLock, StorageError> {
        let stored: Option<ResourceLock> = self.dir.load(LOCKS, &config.name)?;
        Ok(stored_or_new(stored.as_ref(), config))
    }

    fn update_lock(
        &self,
        config: &LeaseConfig,
        update: LockUpdate<'_>,
    ) -> Result<ResourceLock, StorageError> {
        self.exclusive(|| {
            let current = self.load_lock(config)?;
            match update(&current) {
                Some(next) => {
                    self.dir.save(LOCKS, &config.name, &next)?;
                    Ok(next)
                }
                None => Ok(current),
            }
        })
    }
}

impl CheckpointStore for FileStore {
    fn put_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        let kind = Self::checkpoint_kind(&checkpoint.task_id)?;
        self.exclusive(|| {
            if let Some(latest) = self.stored_sequence(&kind)? {
                if checkpoint.sequence <= latest {
                    return Err(StorageError::StaleCheckpoint {
                        task_id: checkpoint.task_id.clone(),
                        sequence: checkpoint.sequence,
                        latest,
                    });
                }
            }
            self.dir
                .save(&kind, &format!("{:020}", checkpoint.sequence), checkpoint)
        })
    }

    fn checkpoints(&self, task_id: &TaskId) -> Result<Vec<Checkpoint>, StorageError> {
        let kind = Self::checkpoint_kind(task_id)?;
        let mut checkpoints = Vec::new();
        for name in self.dir.list(&kind)? {
            // Unreadable files cannot be trusted; older checkpoints still can
            match self.dir.load::<Checkpoint>(&kind, &name) {
                Ok(Some(checkpoint)) => checkpoints.push(checkpoint),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(task_id = %task_id, file = %name, error = %e, "skipping unreadable checkpoint");
                }
            }
        }
        checkpoints.sort_by_key(|c| c.sequence);
        Ok(checkpoints)
    }

    fn latest_sequence(&self, task_id: &TaskId) -> Result<Option<u64>, StorageError> {
        let kind = Self::checkpoint_kind(task_id)?;
        self.stored_sequence(&kind)
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
