// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource-bound work handed to a worker
//!
//! A task is one bounded unit of work that needs the shared resource: an
//! inference batch, a training run, or a correction-triggered re-inference.

use crate::id::{JobId, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scheduling priority; higher priorities are granted the resource first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    pub fn name(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Inference,
    Training,
    CorrectionInference,
}

impl TaskKind {
    /// Corrections jump ahead of plain inference, training yields to both
    pub fn default_priority(&self) -> Priority {
        match self {
            TaskKind::CorrectionInference => Priority::High,
            TaskKind::Inference => Priority::Normal,
            TaskKind::Training => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkTask {
    pub id: TaskId,
    pub kind: TaskKind,
    pub priority: Priority,
    /// Job the task was raised for, if any
    pub job_id: Option<JobId>,
    /// Workload-specific input
    #[serde(default)]
    pub payload: Value,
}

impl WorkTask {
    pub fn new(id: impl Into<TaskId>, kind: TaskKind, payload: Value) -> Self {
        Self {
            id: id.into(),
            kind,
            priority: kind.default_priority(),
            job_id: None,
            payload,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn for_job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }
}

/// How a worker's execution of one task ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed { output: Value },
    /// Yielded the resource after writing checkpoint `sequence`
    Preempted { sequence: u64 },
    Failed { reason: String },
}

impl TaskOutcome {
    pub fn is_final(&self) -> bool {
        !matches!(self, TaskOutcome::Preempted { .. })
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
