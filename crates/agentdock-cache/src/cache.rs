//! Keyed cache of reconstructed run output. Owned by one component and
//! mutated only through these operations.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use agentdock_core::record::StreamRecord;
use agentdock_core::types::RunStatus;
use agentdock_stream::session::SessionStream;

// ─── Entry ────────────────────────────────────────────────────────

/// Per-run cached state: the raw ledger, the reconstructed messages,
/// and the externally-reported status.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedOutput {
    /// Newline-delimited concatenation of all received record payloads.
    pub output: String,
    pub messages: Vec<StreamRecord>,
    pub status: RunStatus,
    pub last_updated: DateTime<Utc>,
}

impl CachedOutput {
    /// Re-derive an entry from a raw record batch.
    pub fn from_raw(raw: &str, status: RunStatus) -> Self {
        let mut stream = SessionStream::new();
        stream.ingest_batch(raw);
        Self {
            output: stream.raw_output().to_owned(),
            messages: stream.messages().to_vec(),
            status,
            last_updated: Utc::now(),
        }
    }

    /// Entry for a run observed through the live path before any
    /// explicit status report. Defaults to `Running` so the eviction
    /// rule can still collect it if the run dies silently.
    pub fn live(raw: &str) -> Self {
        Self::from_raw(raw, RunStatus::Running)
    }
}

// ─── Cache ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct OutputCache {
    entries: HashMap<String, CachedOutput>,
}

impl OutputCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, run_id: &str) -> Option<&CachedOutput> {
        self.entries.get(run_id)
    }

    /// Full replace of a run's entry.
    pub fn set(&mut self, run_id: impl Into<String>, entry: CachedOutput) {
        self.entries.insert(run_id.into(), entry);
    }

    /// Status-only update. A status for an unknown run is dropped, not
    /// an error — it may arrive before the corresponding creation.
    pub fn update_status(&mut self, run_id: &str, status: RunStatus) {
        if let Some(entry) = self.entries.get_mut(run_id) {
            entry.status = status;
            entry.last_updated = Utc::now();
        }
    }

    /// Evict one entry, or everything.
    pub fn clear(&mut self, run_id: Option<&str>) {
        match run_id {
            Some(id) => {
                self.entries.remove(id);
            }
            None => self.entries.clear(),
        }
    }

    /// Drop entries for runs that vanished from the reported running
    /// set while still cached in a non-terminal status (they finished
    /// or died without a completion event reaching us). Entries already
    /// terminal are retained so a freshly-completed run's final output
    /// is not clobbered by a race with the next poll.
    pub fn evict_vanished(&mut self, reported_running: &HashSet<String>) {
        self.entries
            .retain(|id, entry| reported_running.contains(id) || entry.status.is_terminal());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
