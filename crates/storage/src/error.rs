// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::wal::WalError;
use foundry_core::{ClarificationError, JobId, TaskId, TransitionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("history log error: {0}")]
    Wal(#[from] WalError),
    #[error("not found: {kind}/{id}")]
    NotFound { kind: &'static str, id: String },
    #[error("already exists: {kind}/{id}")]
    AlreadyExists { kind: &'static str, id: String },
    #[error("'{prefix}' matches {count} jobs")]
    Ambiguous { prefix: String, count: usize },
    #[error("invalid key '{0}'")]
    InvalidKey(String),
    #[error("job {id} changed underneath us: expected revision {expected}, found {actual}")]
    Conflict { id: JobId, expected: u64, actual: u64 },
    #[error("checkpoint {sequence} for task {task_id} is not newer than {latest}")]
    StaleCheckpoint {
        task_id: TaskId,
        sequence: u64,
        latest: u64,
    },
    #[error(transparent)]
    Clarification(#[from] ClarificationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}
