// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable storage

use crate::Operation;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write-ahead log for durable operation storage
pub struct Wal {
    path: PathBuf,
    file: File,
    sequence: u64,
    /// Entries in the current file (resets on rewrite)
    entries: u64,
}

impl Wal {
    /// Open or create a WAL at the given path
    ///
    /// A torn final entry left by a crash mid-append is truncated away so
    /// later appends start on a clean line.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        let content = std::fs::read_to_string(path)?;
        let segments: Vec<&str> = content.split_inclusive('\n').collect();
        let mut valid_len = 0;
        let mut sequence = 0;
        let mut entries = 0;

        for (i, segment) in segments.iter().enumerate() {
            let line = segment.trim_end_matches('\n');
            if line.is_empty() {
                valid_len += segment.len();
                continue;
            }
            match serde_json::from_str::<WalEntry>(line) {
                Ok(entry) if segment.ends_with('\n') => {
                    sequence = entry.seq;
                    entries += 1;
                    valid_len += segment.len();
                }
                Ok(_) => break,
                Err(_) if i + 1 == segments.len() => break,
                Err(e) => return Err(e.into()),
            }
        }

        if valid_len < content.len() {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = content.len() - valid_len,
                "truncating torn WAL entry"
            );
            file.set_len(valid_len as u64)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            sequence,
            entries,
        })
    }

    /// Append an operation to the log
    pub fn append(&mut self, op: &Operation) -> Result<u64, WalError> {
        let entry = WalEntry {
            seq: self.sequence + 1,
            op: op.clone(),
        };
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_all()?;
        self.sequence = entry.seq;
        self.entries += 1;
        Ok(self.sequence)
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of entries in the log file
    pub fn len(&self) -> u64 {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Replace the log contents with `ops` (used for compaction).
    ///
    /// Writes a sibling temp file and renames it over the log so a crash
    /// leaves either the old or the new log intact.
    pub fn rewrite(&mut self, ops: &[Operation]) -> Result<(), WalError> {
        let tmp = self.path.with_extension("wal.tmp");
        {
            let mut out = File::create(&tmp)?;
            let mut seq = self.sequence;
            for op in ops {
                seq += 1;
                let line = serde_json::to_string(&WalEntry { seq, op: op.clone() })?;
                writeln!(out, "{}", line)?;
            }
            out.sync_all()?;
            self.sequence = seq;
        }
        std::fs::rename(&tmp, &self.path)?;
        self.file = OpenOptions::new().append(true).read(true).open(&self.path)?;
        self.entries = ops.len() as u64;
        Ok(())
    }

    /// Replay all operations from the log.
    ///
    /// A torn final line (crash mid-append) is skipped; corruption anywhere
    /// else is an error.
    pub fn replay(path: &Path) -> Result<Vec<Operation>, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<String> = BufReader::new(file).lines().collect::<Result<_, _>>()?;
        let last = lines.len().saturating_sub(1);
        let mut ops = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<WalEntry>(line) {
                Ok(entry) => ops.push(entry.op),
                Err(e) if i == last => {
                    tracing::warn!(error = %e, "skipping torn trailing WAL entry");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(ops)
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct WalEntry {
    seq: u64,
    op: Operation,
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
