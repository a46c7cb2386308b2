// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foundry execution engine
//!
//! Runs jobs through registered pipelines, pauses them for human
//! clarification, and arbitrates the single shared resource between
//! workers.

mod arbiter;
mod corrections;
mod detector;
mod executor;
mod phase;
mod registry;
mod scheduler;
mod worker;

#[cfg(test)]
mod test_support;

pub use arbiter::{ArbiterError, LeaseGuard, ResourceArbiter};
pub use corrections::{CorrectionDesk, CorrectionError};
pub use detector::{Detector, HumanInTheLoopPhase};
pub use executor::{ExecuteError, PipelineExecutor, ResolveOutcome, RunOutcome};
pub use phase::{PendingClarification, Phase, PhaseContext, PhaseError, PhaseOutcome};
pub use registry::{Pipeline, PipelineRegistry, RegistryError};
pub use scheduler::{
    QueueEntry, ResourcePhase, SchedulerError, SchedulingQueue, Supervisor, SupervisorHandle,
    Ticket,
};
pub use worker::{ExecutionMode, Worker, WorkerError, Workload, WorkloadError, WorkloadSet};
