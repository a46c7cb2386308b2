// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory of JSON records

use crate::error::StorageError;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One JSON file per record, grouped in a subdirectory per kind.
///
/// Writes go to a sibling temp file that is synced and renamed over the
/// target, so readers see either the old record or the new one.
#[derive(Debug, Clone)]
pub struct JsonDir {
    base_path: PathBuf,
}

impl JsonDir {
    /// Open a directory, creating it if needed
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Save a value
    pub fn save<T: Serialize>(&self, kind: &str, id: &str, data: &T) -> Result<(), StorageError> {
        let path = self.path_for(kind, id)?;
        let dir = self.base_path.join(kind);
        fs::create_dir_all(&dir)?;

        let tmp = dir.join(format!("{}.json.tmp", id));
        let json = serde_json::to_vec_pretty(data)?;
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Load a value, or `None` if it was never saved
    pub fn load<T: DeserializeOwned>(&self, kind: &str, id: &str) -> Result<Option<T>, StorageError> {
        let path = self.path_for(kind, id)?;
        let json = match fs::read(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&json)?))
    }

    /// All ids of a kind, sorted
    pub fn list(&self, kind: &str) -> Result<Vec<String>, StorageError> {
        let dir = self.base_path.join(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn path_for(&self, kind: &str, id: &str) -> Result<PathBuf, StorageError> {
        check_key(id)?;
        Ok(self.base_path.join(kind).join(format!("{}.json", id)))
    }
}

/// Keys become file names; refuse anything that could escape the directory
pub(crate) fn check_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\'])
        || key.chars().any(char::is_control);
    if bad {
        Err(StorageError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[path = "json_tests.rs"]
mod tests;
