// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only log of job history

use crate::record::HistoryEntry;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error at line {line}: {source}")]
    Json {
        line: usize,
        source: serde_json::Error,
    },
    #[error("JSON error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Write-ahead log of job history entries, one JSON object per line
pub struct Wal {
    file: File,
    sequence: u64,
}

impl Wal {
    /// Open or create a WAL at the given path.
    ///
    /// A trailing line without its newline is left by a crash mid-append.
    /// It is completed if it parses and cut off otherwise, so new entries
    /// always start on a fresh line.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        let contents = fs::read(path)?;
        let complete = contents
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |i| i + 1);
        let mut sequence = contents[..complete].iter().filter(|b| **b == b'\n').count() as u64;

        let tail = &contents[complete..];
        if !tail.is_empty() {
            if serde_json::from_slice::<WalLine>(tail).is_ok() {
                file.write_all(b"\n")?;
                sequence += 1;
            } else {
                tracing::warn!(
                    path = %path.display(),
                    bytes = tail.len(),
                    "dropping torn history entry"
                );
                file.set_len(complete as u64)?;
            }
            file.sync_all()?;
        }

        Ok(Self { file, sequence })
    }

    /// Append an entry and sync it to disk
    pub fn append(&mut self, entry: &HistoryEntry) -> Result<u64, WalError> {
        self.sequence += 1;
        let line = serde_json::to_string(&WalLine {
            seq: self.sequence,
            entry: entry.clone(),
        })?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_all()?;
        Ok(self.sequence)
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Replay all entries from the log.
    ///
    /// A torn final line (a crash mid-append) is skipped; a bad line
    /// anywhere else is an error.
    pub fn replay(path: &Path) -> Result<Vec<HistoryEntry>, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<String> = BufReader::new(file).lines().collect::<Result<_, _>>()?;
        let last = lines.len().saturating_sub(1);
        let mut entries = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<WalLine>(line) {
                Ok(parsed) => entries.push(parsed.entry),
                Err(e) if index == last => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping torn history entry");
                }
                Err(source) => {
                    return Err(WalError::Json {
                        line: index + 1,
                        source,
                    })
                }
            }
        }

        Ok(entries)
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct WalLine {
    seq: u64,
    entry: HistoryEntry,
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
