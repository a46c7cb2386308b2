// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared phases, detectors, and workloads for scenario tests

#![allow(unused_imports, dead_code)]

pub use async_trait::async_trait;
pub use foundry_core::{
    ClarificationDraft, ClarificationRequest, FakeClock, HolderId, JobId, JobStatus, LeaseConfig,
    PayloadRef, Priority, SequentialIdGen, TaskKind, TaskOutcome, WorkTask,
};
pub use foundry_engine::{
    Detector, ExecutionMode, HumanInTheLoopPhase, Phase, PhaseContext, PhaseError, PhaseOutcome,
    Pipeline, PipelineExecutor, PipelineRegistry, ResourceArbiter, RunOutcome, Supervisor,
    SupervisorHandle, Worker, Workload, WorkloadError, WorkloadSet,
};
pub use foundry_storage::{CheckpointStore, FileStore, JobStore};
pub use serde_json::{json, Value};
pub use std::sync::atomic::{AtomicUsize, Ordering};
pub use std::sync::{Arc, Mutex};
pub use std::time::Duration;
pub use tempfile::TempDir;

pub fn file_store(dir: &TempDir) -> Arc<FileStore> {
    Arc::new(FileStore::open(dir.path()).unwrap())
}

pub fn executor(
    store: &Arc<FileStore>,
    clock: &FakeClock,
) -> PipelineExecutor<FileStore, FakeClock, SequentialIdGen> {
    PipelineExecutor::new(Arc::clone(store), clock.clone(), SequentialIdGen::new("job"))
}

pub fn arbiter(
    store: &Arc<FileStore>,
    clock: &FakeClock,
    lease_secs: u64,
) -> ResourceArbiter<FileStore, FakeClock> {
    let config = LeaseConfig::new("gpu").with_lease(Duration::from_secs(lease_secs));
    ResourceArbiter::new(Arc::clone(store), config, clock.clone())
        .with_poll_interval(Duration::from_millis(2))
}

/// Appends its name to `context.done` and counts its runs
pub struct Step {
    name: &'static str,
    pub runs: Arc<AtomicUsize>,
}

impl Step {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Phase for Step {
    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, ctx: &mut PhaseContext) -> Result<PhaseOutcome, PhaseError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let mut done = ctx.context["done"].as_array().cloned().unwrap_or_default();
        done.push(json!(self.name));
        ctx.context["done"] = Value::Array(done);
        Ok(PhaseOutcome::Advance)
    }
}

/// Produces a fixed AI output
pub struct Infer(pub Value);

#[async_trait]
impl Phase for Infer {
    fn name(&self) -> &str {
        "infer"
    }

    async fn run(&self, ctx: &mut PhaseContext) -> Result<PhaseOutcome, PhaseError> {
        ctx.ai_output = Some(self.0.clone());
        Ok(PhaseOutcome::Advance)
    }
}

/// Never returns, like a process killed mid-phase
pub struct Hang;

#[async_trait]
impl Phase for Hang {
    fn name(&self) -> &str {
        "third"
    }

    async fn run(&self, _ctx: &mut PhaseContext) -> Result<PhaseOutcome, PhaseError> {
        std::future::pending::<()>().await;
        Ok(PhaseOutcome::Advance)
    }
}

/// Flags `field` while it is listed in `output.unsure`
pub struct Unsure(pub &'static str);

impl Detector for Unsure {
    fn name(&self) -> &str {
        self.0
    }

    fn detect(&self, output: &Value) -> Vec<ClarificationDraft> {
        let listed = output["unsure"]
            .as_array()
            .is_some_and(|fields| fields.iter().any(|f| f == self.0));
        if listed {
            vec![ClarificationDraft::new("REVIEW_FIELD", json!({ "field": self.0 }))]
        } else {
            Vec::new()
        }
    }

    fn apply(&self, mut output: Value, _request: &ClarificationRequest, resolution: &Value) -> Value {
        output[self.0] = resolution.clone();
        if let Some(fields) = output["unsure"].as_array_mut() {
            fields.retain(|f| f != self.0);
        }
        output
    }
}

/// Never flags anything
pub struct Satisfied;

impl Detector for Satisfied {
    fn name(&self) -> &str {
        "satisfied"
    }

    fn detect(&self, _output: &Value) -> Vec<ClarificationDraft> {
        Vec::new()
    }
}

/// Training-like workload whose result depends only on the step numbers.
/// Optionally queues another task from inside one step.
pub struct Quanta {
    pub steps: u64,
    pub log: Arc<Mutex<Vec<String>>>,
    pub interrupt: Arc<Mutex<Option<(u64, SupervisorHandle, WorkTask)>>>,
    pub tickets: Arc<Mutex<Vec<foundry_engine::Ticket>>>,
}

impl Quanta {
    pub fn new(steps: u64, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            steps,
            log: Arc::clone(log),
            interrupt: Arc::new(Mutex::new(None)),
            tickets: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Workload for Quanta {
    fn total_steps(&self, _task: &WorkTask) -> u64 {
        self.steps
    }

    fn initial_state(&self, _task: &WorkTask) -> Result<Value, WorkloadError> {
        Ok(json!({ "loss": 1000 }))
    }

    async fn step(&self, task: &WorkTask, step: u64, mut state: Value) -> Result<Value, WorkloadError> {
        self.log.lock().unwrap().push(format!("{}:{}", task.id, step));
        let loss = state["loss"].as_u64().unwrap_or(0);
        state["loss"] = json!(loss / 2 + step);

        let mut interrupt = self.interrupt.lock().unwrap();
        if interrupt.as_ref().is_some_and(|(at, _, _)| *at == step) {
            if let Some((_, handle, next)) = interrupt.take() {
                self.tickets.lock().unwrap().push(handle.enqueue(next).unwrap());
            }
        }
        Ok(state)
    }

    fn finish(&self, _task: &WorkTask, state: Value) -> Result<Value, WorkloadError> {
        Ok(json!({ "final_loss": state["loss"] }))
    }
}
