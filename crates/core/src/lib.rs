// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foundry-core: pure data and state machines for the foundry job engine
//!
//! This crate provides:
//! - The job lifecycle state machine and clarification requests
//! - The lease lock over the shared resource, with its waiter queue
//! - Checkpoints, work tasks, and correction records
//! - Typed events, clock and id abstractions, and configuration

pub mod clock;
pub mod id;

pub mod event;

// State machines and records (order matters for dependencies)
pub mod task;
pub mod job;
pub mod clarification;
pub mod lock;
pub mod checkpoint;
pub mod correction;

pub mod config;

pub use checkpoint::{Checkpoint, CheckpointError};
pub use clarification::{
    ClarificationDraft, ClarificationError, ClarificationRequest, ClarificationStatus,
};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, FoundryConfig, SchedulePolicy};
pub use correction::{CorrectionExample, CorrectionRecord, CorrectionStatus};
pub use event::Event;
pub use id::{ClarificationId, HolderId, IdGen, JobId, SequentialIdGen, TaskId, UuidIdGen};
pub use job::{Job, JobError, JobEvent, JobProgress, JobStatus, PayloadRef, TransitionError};
pub use lock::{LeaseConfig, LockError, LockInput, LockState, ResourceLock, Waiter};
pub use task::{Priority, TaskKind, TaskOutcome, WorkTask};
