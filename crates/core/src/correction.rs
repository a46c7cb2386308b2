// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human corrections of AI output, kept for fine-tuning

use crate::id::JobId;
use crate::job::PayloadRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    PendingReview,
    ApprovedForFinetuning,
    Rejected,
}

impl CorrectionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            CorrectionStatus::PendingReview => "pending_review",
            CorrectionStatus::ApprovedForFinetuning => "approved_for_finetuning",
            CorrectionStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for CorrectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CorrectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_review" => Ok(CorrectionStatus::PendingReview),
            "approved_for_finetuning" => Ok(CorrectionStatus::ApprovedForFinetuning),
            "rejected" => Ok(CorrectionStatus::Rejected),
            other => Err(format!("unknown correction status: {}", other)),
        }
    }
}

/// One job's AI output next to its human correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    pub job_id: JobId,
    pub source: PayloadRef,
    pub original_output: Option<Value>,
    pub corrected_output: Value,
    pub status: CorrectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CorrectionRecord {
    pub fn example(&self) -> CorrectionExample {
        CorrectionExample {
            source: self.source.clone(),
            original_output: self.original_output.clone(),
            corrected_output: self.corrected_output.clone(),
        }
    }
}

/// Export record handed to dataset builders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionExample {
    pub source: PayloadRef,
    pub original_output: Option<Value>,
    pub corrected_output: Value,
}
