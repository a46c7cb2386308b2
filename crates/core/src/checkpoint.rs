// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resumable worker progress snapshots

use crate::clock::Clock;
use crate::event::Event;
use crate::id::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    #[error("checkpoint {sequence} for task {task_id} failed validation")]
    Corrupt { task_id: TaskId, sequence: u64 },
    #[error("checkpoint state for task {task_id} could not be encoded: {message}")]
    Encode { task_id: TaskId, message: String },
}

/// A durable snapshot of a task's progress.
///
/// `state` holds everything needed to continue (step counter and
/// accumulated state), so a resumed task reaches the same result as an
/// uninterrupted one. `digest` is a CRC32 of the canonical JSON of
/// `state` and `output`, checked before the checkpoint is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub task_id: TaskId,
    pub sequence: u64,
    pub state: Value,
    /// Set once the task finished; `output` then holds its result
    pub complete: bool,
    pub output: Option<Value>,
    pub digest: u32,
    pub created_at: DateTime<Utc>,
}

fn digest_of(
    task_id: &TaskId,
    sequence: u64,
    state: &Value,
    output: Option<&Value>,
    complete: bool,
) -> Result<u32, CheckpointError> {
    let body = serde_json::to_vec(&(sequence, complete, state, output)).map_err(|e| {
        CheckpointError::Encode {
            task_id: task_id.clone(),
            message: e.to_string(),
        }
    })?;
    Ok(crc32fast::hash(&body))
}

impl Checkpoint {
    /// Snapshot of an unfinished task
    pub fn partial(
        task_id: TaskId,
        sequence: u64,
        state: Value,
        clock: &impl Clock,
    ) -> Result<Self, CheckpointError> {
        let digest = digest_of(&task_id, sequence, &state, None, false)?;
        Ok(Self {
            task_id,
            sequence,
            state,
            complete: false,
            output: None,
            digest,
            created_at: clock.now(),
        })
    }

    /// Final snapshot recording the task's result
    pub fn completed(
        task_id: TaskId,
        sequence: u64,
        state: Value,
        output: Value,
        clock: &impl Clock,
    ) -> Result<Self, CheckpointError> {
        let digest = digest_of(&task_id, sequence, &state, Some(&output), true)?;
        Ok(Self {
            task_id,
            sequence,
            state,
            complete: true,
            output: Some(output),
            digest,
            created_at: clock.now(),
        })
    }

    /// Check the digest against the contents
    pub fn validate(&self) -> Result<(), CheckpointError> {
        let expected = digest_of(
            &self.task_id,
            self.sequence,
            &self.state,
            self.output.as_ref(),
            self.complete,
        )?;
        if expected == self.digest {
            Ok(())
        } else {
            Err(CheckpointError::Corrupt {
                task_id: self.task_id.clone(),
                sequence: self.sequence,
            })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn written_event(&self) -> Event {
        Event::CheckpointWritten {
            task_id: self.task_id.clone(),
            sequence: self.sequence,
            complete: self.complete,
        }
    }
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
