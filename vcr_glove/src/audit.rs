//! Append-only audit log.
//!
//! Every lifecycle event (scan, pairing, pattern start/stop, cycle ticks,
//! manual buzzes) is recorded as a tagged, timestamped entry. Entries are:
//!
//! - kept in a bounded in-memory ring for display,
//! - mirrored to `tracing` under the `audit` target,
//! - optionally appended to a JSONL file, one entry per line.
//!
//! Within one position, entries appear in the causal order of that
//! position's task lifecycle because the engine records them synchronously
//! on its single control path.

use crate::error::GloveResult;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Category of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditTag {
    /// Scan started or stopped.
    Scan,
    /// Displayed device list changed.
    Devices,
    /// Pair requested.
    Pair,
    /// Disconnect requested.
    Disconnect,
    /// Pattern started.
    Start,
    /// Pattern stopped.
    Stop,
    /// Cycle tick dispatched.
    Cycle,
    /// One-shot buzz (manual or post-pair).
    Buzz,
}

/// One audit line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Engine time of the event, milliseconds since engine start.
    pub at_ms: u64,
    /// Category.
    pub tag: AuditTag,
    /// Glove position, when the event concerns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// Human-readable description.
    pub message: String,
}

struct JsonlExport {
    path: PathBuf,
    out: LineWriter<File>,
}

/// Bounded in-memory audit log with optional JSONL export.
pub struct AuditLog {
    entries: VecDeque<AuditEntry>,
    capacity: usize,
    total: u64,
    export: Option<JsonlExport>,
}

impl AuditLog {
    /// In-memory log keeping the newest `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            total: 0,
            export: None,
        }
    }

    /// Also append every entry to `path`, creating parent directories.
    ///
    /// # Errors
    /// Returns `GloveError::Io` if the file cannot be opened for appending.
    pub fn with_jsonl(mut self, path: &Path) -> GloveResult<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Audit log exporting to {}", path.display());
        self.export = Some(JsonlExport {
            path: path.to_path_buf(),
            out: LineWriter::new(file),
        });
        Ok(self)
    }

    /// Append an entry.
    ///
    /// Export failures are logged and otherwise ignored; auditing never
    /// interferes with the control path.
    pub fn record(
        &mut self,
        at: Duration,
        tag: AuditTag,
        position: Option<&str>,
        message: impl Into<String>,
    ) {
        let entry = AuditEntry {
            at_ms: u64::try_from(at.as_millis()).unwrap_or(u64::MAX),
            tag,
            position: position.map(str::to_string),
            message: message.into(),
        };

        if tag == AuditTag::Cycle {
            debug!(target: "audit", at_ms = entry.at_ms, ?tag, "{}", entry.message);
        } else {
            info!(target: "audit", at_ms = entry.at_ms, ?tag, "{}", entry.message);
        }

        if let Some(export) = self.export.as_mut() {
            if let Err(e) = write_line(&mut export.out, &entry) {
                warn!("Audit export to {} failed: {e}", export.path.display());
            }
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.total += 1;
    }

    /// Retained entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter()
    }

    /// The newest `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Vec<AuditEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Retained entries with the given tag.
    pub fn with_tag(&self, tag: AuditTag) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(move |e| e.tag == tag)
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries recorded since creation, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.total
    }
}

fn write_line(out: &mut impl Write, entry: &AuditEntry) -> GloveResult<()> {
    serde_json::to_writer(&mut *out, entry)?;
    out.write_all(b"\n")?;
    Ok(())
}
