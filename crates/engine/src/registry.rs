// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller-constructed pipeline registry

use crate::phase::Phase;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("pipeline '{0}' is already registered")]
    Duplicate(String),
    #[error("pipeline '{0}' has no phases")]
    Empty(String),
    #[error("pipeline '{pipeline}' has two phases named '{phase}'")]
    DuplicatePhase { pipeline: String, phase: String },
}

/// A named, ordered list of phases
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    phases: Vec<Arc<dyn Phase>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phases: Vec::new(),
        }
    }

    pub fn phase(mut self, phase: impl Phase + 'static) -> Self {
        self.phases.push(Arc::new(phase));
        self
    }

    pub fn shared_phase(mut self, phase: Arc<dyn Phase>) -> Self {
        self.phases.push(phase);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phases(&self) -> &[Arc<dyn Phase>] {
        &self.phases
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phases.iter().map(|p| p.name()).collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("phases", &self.phase_names())
            .finish()
    }
}

/// Maps pipeline names to phase lists; passed to the executor on each run
#[derive(Debug, Default, Clone)]
pub struct PipelineRegistry {
    pipelines: BTreeMap<String, Pipeline>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, pipeline: Pipeline) -> Result<(), RegistryError> {
        if self.pipelines.contains_key(pipeline.name()) {
            return Err(RegistryError::Duplicate(pipeline.name().to_string()));
        }
        if pipeline.phases.is_empty() {
            return Err(RegistryError::Empty(pipeline.name().to_string()));
        }
        let mut seen = HashSet::new();
        for name in pipeline.phase_names() {
            if !seen.insert(name) {
                return Err(RegistryError::DuplicatePhase {
                    pipeline: pipeline.name().to_string(),
                    phase: name.to_string(),
                });
            }
        }
        self.pipelines.insert(pipeline.name().to_string(), pipeline);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }
}
