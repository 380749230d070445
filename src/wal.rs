//! Write-Ahead Log for framekv
//!
//! Provides durable persistence by logging every mutation before it is
//! applied to the in-memory store. One JSON entry per line, flushed per
//! write, replayed in order at startup.

use crate::error::{KvError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// One logged mutation. The protocol's only mutation is Set, so an entry is
/// a timestamped key/value pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub timestamp: u64,
    pub key: String,
    pub value: String,
}

impl WalEntry {
    pub fn new(key: String, value: String) -> Self {
        Self {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            key,
            value,
        }
    }
}

/// Append-only mutation log
pub struct WriteAheadLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl WriteAheadLog {
    /// Open (or create) the log at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Append one mutation to the log and flush it
    pub async fn append(&self, key: &str, value: &str) -> Result<()> {
        let entry = WalEntry::new(key.to_string(), value.to_string());
        let json = serde_json::to_string(&entry)?;

        let mut writer = self.writer.lock().await;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    /// Read back every logged mutation, oldest first
    pub fn replay(&self) -> Result<Vec<WalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: WalEntry = serde_json::from_str(&line)
                .map_err(|e| KvError::Wal(format!("failed to parse WAL entry: {}", e)))?;
            entries.push(entry);
        }

        Ok(entries)
    }
}
