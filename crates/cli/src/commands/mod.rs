// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod clarify;
pub mod correct;
pub mod job;
pub mod lock;
pub mod worker;

use anyhow::Context as _;
use serde_json::Value;

/// Parse a `--data`/`--input` argument
pub(crate) fn parse_json(flag: &str, text: &str) -> anyhow::Result<Value> {
    serde_json::from_str(text).with_context(|| format!("{} is not valid JSON", flag))
}
