// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Phases and detectors shared by engine tests

use crate::detector::Detector;
use crate::phase::{Phase, PhaseContext, PhaseError, PhaseOutcome};
use async_trait::async_trait;
use foundry_core::{ClarificationDraft, ClarificationRequest};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Appends its name to `context.trace` and counts its runs
pub struct TracePhase {
    name: String,
    pub runs: Arc<AtomicUsize>,
}

impl TracePhase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Phase for TracePhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut PhaseContext) -> Result<PhaseOutcome, PhaseError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let mut trace = ctx.context["trace"].as_array().cloned().unwrap_or_default();
        trace.push(json!(self.name));
        ctx.context["trace"] = Value::Array(trace);
        Ok(PhaseOutcome::Advance)
    }
}

/// Sets a fixed AI output
pub struct OutputPhase {
    name: String,
    output: Value,
}

impl OutputPhase {
    pub fn new(name: &str, output: Value) -> Self {
        Self {
            name: name.to_string(),
            output,
        }
    }
}

#[async_trait]
impl Phase for OutputPhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut PhaseContext) -> Result<PhaseOutcome, PhaseError> {
        ctx.ai_output = Some(self.output.clone());
        Ok(PhaseOutcome::Advance)
    }
}

/// Always fails
pub struct FailingPhase {
    name: String,
    pub runs: Arc<AtomicUsize>,
}

impl FailingPhase {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Phase for FailingPhase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut PhaseContext) -> Result<PhaseOutcome, PhaseError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        ctx.context["poisoned"] = json!(true);
        Err(PhaseError::failed("model returned garbage"))
    }
}

/// Flags every field listed in `output.low_confidence`; a resolution
/// `{"value": ...}` fills the field and clears the flag
pub struct LowConfidence;

impl Detector for LowConfidence {
    fn name(&self) -> &str {
        "low-confidence"
    }

    fn detect(&self, output: &Value) -> Vec<ClarificationDraft> {
        output["low_confidence"]
            .as_array()
            .map(|fields| {
                fields
                    .iter()
                    .map(|field| ClarificationDraft::new("REVIEW_FIELD", json!({"field": field})))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn apply(&self, mut output: Value, request: &ClarificationRequest, resolution: &Value) -> Value {
        let field = request.fields["field"].clone();
        if let Some(name) = field.as_str() {
            output[name] = resolution["value"].clone();
        }
        if let Some(flags) = output["low_confidence"].as_array_mut() {
            flags.retain(|f| f != &field);
        }
        output
    }
}

/// Never finds anything
pub struct Quiet;

impl Detector for Quiet {
    fn name(&self) -> &str {
        "quiet"
    }

    fn detect(&self, _output: &Value) -> Vec<ClarificationDraft> {
        Vec::new()
    }
}

/// Flags a fixed question and ignores resolutions
pub struct Stubborn;

impl Detector for Stubborn {
    fn name(&self) -> &str {
        "stubborn"
    }

    fn detect(&self, _output: &Value) -> Vec<ClarificationDraft> {
        vec![ClarificationDraft::new("CONFIRM", json!({"question": "sure?"}))]
    }
}
