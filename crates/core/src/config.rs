// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Foundry configuration
//!
//! Read from a TOML file; every field has a default so an absent file is
//! equivalent to an empty one.

use crate::lock::LeaseConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Scheduling policy for resource-bound tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulePolicy {
    /// Each task holds the resource until it finishes
    Coarse,
    /// Tasks yield the resource after every quantum
    #[default]
    TimeSliced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSection {
    pub name: String,
    #[serde(with = "humantime_serde")]
    pub lease: Duration,
    #[serde(with = "humantime_serde")]
    pub renew_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for LockSection {
    fn default() -> Self {
        Self {
            name: "gpu".to_string(),
            lease: Duration::from_secs(30),
            renew_interval: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl LockSection {
    pub fn lease_config(&self) -> LeaseConfig {
        LeaseConfig::new(self.name.clone()).with_lease(self.lease)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub policy: SchedulePolicy,
    /// Workload steps per quantum in time-sliced mode
    pub quantum_steps: u32,
    /// Rounds a waiting task may be passed over before it goes next
    pub fairness_bound: u32,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            policy: SchedulePolicy::TimeSliced,
            quantum_steps: 1,
            fairness_bound: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSection {
    /// How long a progress record stays visible
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoundryConfig {
    pub state_dir: PathBuf,
    pub log_path: Option<PathBuf>,
    pub lock: LockSection,
    pub scheduler: SchedulerSection,
    pub status: StatusSection,
}

impl Default for FoundryConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".foundry"),
            log_path: None,
            lock: LockSection::default(),
            scheduler: SchedulerSection::default(),
            status: StatusSection::default(),
        }
    }
}

impl FoundryConfig {
    /// Parse and validate TOML text
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: FoundryConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock.lease.is_zero() {
            return Err(ConfigError::Invalid("lock.lease must be positive".into()));
        }
        if self.lock.renew_interval >= self.lock.lease {
            return Err(ConfigError::Invalid(format!(
                "lock.renew_interval ({:?}) must be shorter than lock.lease ({:?})",
                self.lock.renew_interval, self.lock.lease,
            )));
        }
        if self.scheduler.quantum_steps == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.quantum_steps must be at least 1".into(),
            ));
        }
        if self.scheduler.fairness_bound == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.fairness_bound must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
