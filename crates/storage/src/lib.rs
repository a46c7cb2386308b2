// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! foundry-storage: durable keyed storage for jobs, leases, and checkpoints
//!
//! Every store implements the same three traits. [`MemoryStore`] keeps
//! records behind a mutex for tests and single-process use; [`FileStore`]
//! keeps one JSON file per record and serialises writers across processes
//! with an exclusive file lock.

mod error;
mod file;
mod json;
mod memory;
mod record;
mod store;
mod wal;

#[cfg(test)]
mod contract;

pub use error::StorageError;
pub use file::FileStore;
pub use json::JsonDir;
pub use memory::MemoryStore;
pub use record::{HistoryEntry, JobRecord};
pub use store::{CheckpointStore, JobStore, LeaseStore};
pub use wal::{Wal, WalError};
