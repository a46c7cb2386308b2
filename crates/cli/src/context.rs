// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolved configuration and the services built from it

use crate::demo;
use anyhow::{Context as _, Result};
use foundry_core::{
    CorrectionStatus, FoundryConfig, HolderId, SchedulePolicy, SystemClock, UuidIdGen,
};
use foundry_engine::{
    CorrectionDesk, ExecutionMode, PipelineExecutor, ResourceArbiter, Supervisor,
    SupervisorHandle, Worker,
};
use foundry_storage::FileStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const CONFIG_FILE: &str = "foundry.toml";

/// Find the config file: `--config`, then `$FOUNDRY_CONFIG` (both via
/// clap), then `<state_dir>/foundry.toml`
pub fn config_path(explicit: Option<&Path>, state_dir: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => state_dir
            .unwrap_or_else(|| Path::new(".foundry"))
            .join(CONFIG_FILE),
    }
}

pub fn load_config(explicit: Option<&Path>, state_dir: Option<&Path>) -> Result<FoundryConfig> {
    let path = config_path(explicit, state_dir);
    let mut config = FoundryConfig::load(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    if let Some(dir) = state_dir {
        config.state_dir = dir.to_path_buf();
    }
    Ok(config)
}

pub struct Context {
    pub config: FoundryConfig,
    pub store: Arc<FileStore>,
}

impl Context {
    pub fn open(config: FoundryConfig) -> Result<Self> {
        let store = FileStore::open(&config.state_dir)
            .with_context(|| format!("opening state dir {}", config.state_dir.display()))?;
        tracing::debug!(state_dir = %config.state_dir.display(), "state dir opened");
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    pub fn executor(&self) -> PipelineExecutor<FileStore, SystemClock, UuidIdGen> {
        PipelineExecutor::new(Arc::clone(&self.store), SystemClock, UuidIdGen)
    }

    pub fn desk(&self) -> CorrectionDesk<FileStore, SystemClock> {
        CorrectionDesk::new(Arc::clone(&self.store), SystemClock)
    }

    pub fn arbiter(&self) -> ResourceArbiter<FileStore, SystemClock> {
        ResourceArbiter::new(
            Arc::clone(&self.store),
            self.config.lock.lease_config(),
            SystemClock,
        )
        .with_poll_interval(self.config.lock.poll_interval)
    }

    pub fn mode(&self) -> ExecutionMode {
        match self.config.scheduler.policy {
            SchedulePolicy::Coarse => ExecutionMode::Coarse,
            SchedulePolicy::TimeSliced => {
                ExecutionMode::Quantum(u64::from(self.config.scheduler.quantum_steps))
            }
        }
    }

    /// Start an in-process supervisor around this process's GPU worker.
    ///
    /// The supervisor stops once every handle is dropped; await the join
    /// handle to let queued work finish.
    pub fn start_scheduler(&self) -> Result<(SupervisorHandle, JoinHandle<()>)> {
        let examples = self
            .desk()
            .export(CorrectionStatus::ApprovedForFinetuning)?;
        let examples_len = examples.len();
        let worker = Worker::new(
            HolderId::new(format!("foundry-{}", std::process::id())),
            self.arbiter(),
            Arc::clone(&self.store),
            demo::workloads(examples),
        )
        .with_renew_interval(self.config.lock.renew_interval);
        tracing::debug!(
            worker = %worker.id(),
            examples = examples_len,
            "starting scheduler"
        );
        let (supervisor, handle) =
            Supervisor::new(worker, self.mode(), self.config.scheduler.fairness_bound);
        Ok((handle, tokio::spawn(supervisor.run())))
    }
}
