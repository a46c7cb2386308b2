// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ambiguity detectors and the human-in-the-loop phase

use crate::phase::{PendingClarification, Phase, PhaseContext, PhaseError, PhaseOutcome};
use async_trait::async_trait;
use foundry_core::{ClarificationDraft, ClarificationRequest};
use serde_json::Value;
use std::sync::Arc;

/// Finds what in an AI output needs a human decision.
///
/// Detectors must be free of side effects; their results are unioned, so
/// evaluation order does not matter.
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;

    /// Zero or more questions about `output`
    fn detect(&self, output: &Value) -> Vec<ClarificationDraft>;

    /// Fold a human resolution back into the output. The default leaves the
    /// output unchanged.
    fn apply(&self, output: Value, _request: &ClarificationRequest, _resolution: &Value) -> Value {
        output
    }
}

/// Runs every detector over the job's AI output and pauses the job when
/// any of them finds something.
///
/// On re-evaluation, resolutions from earlier rounds are applied to the
/// output first, and a question that was already answered is not asked
/// again.
pub struct HumanInTheLoopPhase {
    name: String,
    detectors: Vec<Arc<dyn Detector>>,
}

impl HumanInTheLoopPhase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detectors: Vec::new(),
        }
    }

    pub fn with_detector(mut self, detector: impl Detector + 'static) -> Self {
        self.detectors.push(Arc::new(detector));
        self
    }

    fn detector(&self, name: &str) -> Option<&Arc<dyn Detector>> {
        self.detectors.iter().find(|d| d.name() == name)
    }
}

#[async_trait]
impl Phase for HumanInTheLoopPhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut PhaseContext) -> Result<PhaseOutcome, PhaseError> {
        let mut resolved: Vec<&ClarificationRequest> = ctx
            .clarifications
            .iter()
            .filter(|c| !c.is_open())
            .collect();
        resolved.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut output = ctx.ai_output.clone().unwrap_or(Value::Null);
        for request in &resolved {
            let (Some(detector), Some(resolution)) =
                (self.detector(&request.detector), request.resolution.as_ref())
            else {
                continue;
            };
            output = detector.apply(output, request, resolution);
        }

        let mut pending = Vec::new();
        for detector in &self.detectors {
            for draft in detector.detect(&output) {
                let answered = resolved.iter().any(|r| r.matches(detector.name(), &draft));
                let duplicate = pending
                    .iter()
                    .any(|p: &PendingClarification| p.detector == detector.name() && p.draft == draft);
                if !answered && !duplicate {
                    pending.push(PendingClarification {
                        detector: detector.name().to_string(),
                        draft,
                    });
                }
            }
        }

        if !pending.is_empty() {
            tracing::info!(
                job_id = %ctx.job_id,
                phase = %self.name,
                requests = pending.len(),
                "ambiguity found"
            );
            return Ok(PhaseOutcome::NeedsClarification(pending));
        }

        if ctx.ai_output.is_some() || !resolved.is_empty() {
            ctx.ai_output = Some(output);
        }
        Ok(PhaseOutcome::Advance)
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
