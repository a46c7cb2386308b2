// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Built-in demonstration pipelines and workloads
//!
//! `text` runs two plain phases. `ocr-review` runs a simulated OCR model
//! under the resource lease, then asks a human about every low-confidence
//! field. Training folds approved corrections into a running digest, one
//! example per step.

use async_trait::async_trait;
use foundry_core::{ClarificationDraft, ClarificationRequest, CorrectionExample, TaskKind, WorkTask};
use foundry_engine::{
    Detector, HumanInTheLoopPhase, Phase, PhaseContext, PhaseError, PhaseOutcome, Pipeline,
    PipelineRegistry, RegistryError, ResourcePhase, SupervisorHandle, Workload, WorkloadError,
    WorkloadSet,
};
use serde_json::{json, Map, Value};

pub fn registry(scheduler: &SupervisorHandle) -> Result<PipelineRegistry, RegistryError> {
    let mut registry = PipelineRegistry::new();
    registry.register(Pipeline::new("text").phase(Extract).phase(Uppercase))?;
    registry.register(
        Pipeline::new("ocr-review")
            .phase(ResourcePhase::new("ocr", TaskKind::Inference, scheduler.clone()))
            .phase(HumanInTheLoopPhase::new("review").with_detector(LowConfidenceFields)),
    )?;
    Ok(registry)
}

pub fn workloads(examples: Vec<CorrectionExample>) -> WorkloadSet {
    WorkloadSet::new()
        .with(TaskKind::Inference, SimulatedOcr)
        .with(TaskKind::CorrectionInference, SimulatedOcr)
        .with(TaskKind::Training, CorrectionTrainer { examples })
}

/// Copies `input.text` into the context, trimmed
struct Extract;

#[async_trait]
impl Phase for Extract {
    fn name(&self) -> &str {
        "extract"
    }

    async fn run(&self, ctx: &mut PhaseContext) -> Result<PhaseOutcome, PhaseError> {
        let text = ctx.input["text"]
            .as_str()
            .ok_or_else(|| PhaseError::failed("input has no 'text' string"))?
            .trim()
            .to_string();
        ctx.context["text"] = json!(text);
        Ok(PhaseOutcome::Advance)
    }
}

struct Uppercase;

#[async_trait]
impl Phase for Uppercase {
    fn name(&self) -> &str {
        "uppercase"
    }

    async fn run(&self, ctx: &mut PhaseContext) -> Result<PhaseOutcome, PhaseError> {
        let text = ctx.context["text"].as_str().unwrap_or_default().to_uppercase();
        ctx.ai_output = Some(json!({ "text": text }));
        Ok(PhaseOutcome::Advance)
    }
}

/// Reads `key=value` tokens from `context.text`, one token per step. A
/// value ending in `?` is returned with low confidence.
struct SimulatedOcr;

fn tokens(task: &WorkTask) -> Vec<String> {
    task.payload["context"]["text"]
        .as_str()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Workload for SimulatedOcr {
    fn total_steps(&self, task: &WorkTask) -> u64 {
        tokens(task).len() as u64
    }

    fn initial_state(&self, _task: &WorkTask) -> Result<Value, WorkloadError> {
        Ok(json!({ "fields": {}, "low_confidence": [] }))
    }

    async fn step(&self, task: &WorkTask, step: u64, mut state: Value) -> Result<Value, WorkloadError> {
        let tokens = tokens(task);
        let token = usize::try_from(step)
            .ok()
            .and_then(|i| tokens.get(i))
            .ok_or_else(|| WorkloadError::new(format!("no token at step {}", step)))?;
        let Some((key, value)) = token.split_once('=') else {
            return Err(WorkloadError::new(format!("unreadable token '{}'", token)));
        };
        state["fields"][key] = json!(value.trim_end_matches('?'));
        if value.ends_with('?') {
            if let Some(flags) = state["low_confidence"].as_array_mut() {
                flags.push(json!(key));
            }
        }
        Ok(state)
    }

    fn finish(&self, _task: &WorkTask, state: Value) -> Result<Value, WorkloadError> {
        let mut output = match state["fields"].clone() {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        output.insert("low_confidence".into(), state["low_confidence"].clone());
        Ok(Value::Object(output))
    }
}

/// Asks about each field listed in `low_confidence`. A resolution of
/// `{"value": ...}` (or a bare value) replaces the field.
pub struct LowConfidenceFields;

impl Detector for LowConfidenceFields {
    fn name(&self) -> &str {
        "low-confidence"
    }

    fn detect(&self, output: &Value) -> Vec<ClarificationDraft> {
        let Some(flags) = output["low_confidence"].as_array() else {
            return Vec::new();
        };
        flags
            .iter()
            .filter_map(Value::as_str)
            .map(|field| {
                ClarificationDraft::new(
                    "REVIEW_FIELD",
                    json!({ "field": field, "value": output[field] }),
                )
            })
            .collect()
    }

    fn apply(&self, mut output: Value, request: &ClarificationRequest, resolution: &Value) -> Value {
        let Some(field) = request.fields["field"].as_str() else {
            return output;
        };
        let value = match resolution.get("value") {
            Some(value) => value.clone(),
            None => resolution.clone(),
        };
        output[field] = value;
        if let Some(flags) = output["low_confidence"].as_array_mut() {
            flags.retain(|f| f.as_str() != Some(field));
        }
        output
    }
}

/// Folds approved corrections into a digest, one example per step
struct CorrectionTrainer {
    examples: Vec<CorrectionExample>,
}

#[async_trait]
impl Workload for CorrectionTrainer {
    fn total_steps(&self, task: &WorkTask) -> u64 {
        task.payload["steps"]
            .as_u64()
            .unwrap_or(self.examples.len() as u64)
    }

    fn initial_state(&self, _task: &WorkTask) -> Result<Value, WorkloadError> {
        if self.examples.is_empty() {
            return Err(WorkloadError::new("no approved corrections to train on"));
        }
        Ok(json!({ "digest": 0u64, "seen": 0u64 }))
    }

    async fn step(&self, _task: &WorkTask, step: u64, mut state: Value) -> Result<Value, WorkloadError> {
        let index = usize::try_from(step).unwrap_or(0) % self.examples.len().max(1);
        let example = self
            .examples
            .get(index)
            .ok_or_else(|| WorkloadError::new("no approved corrections to train on"))?;
        let bytes = serde_json::to_vec(example).map_err(|e| WorkloadError::new(e.to_string()))?;
        let digest = bytes.iter().fold(state["digest"].as_u64().unwrap_or(0), |acc, b| {
            acc.wrapping_mul(31).wrapping_add(u64::from(*b)) % 1_000_000_007
        });
        state["digest"] = json!(digest);
        state["seen"] = json!(step + 1);
        Ok(state)
    }

    fn finish(&self, _task: &WorkTask, state: Value) -> Result<Value, WorkloadError> {
        Ok(json!({
            "examples": self.examples.len(),
            "steps": state["seen"],
            "digest": state["digest"],
        }))
    }
}

#[cfg(test)]
#[path = "demo_tests.rs"]
mod tests;
