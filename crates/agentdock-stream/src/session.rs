//! Per-session stream state: the ordered message list, the raw-output
//! ledger, and the partial accumulator. Pure state machine — the async
//! subscription pump lives in [`crate::live`].
//!
//! The two ledgers (`messages` and `raw_output`) are appended together,
//! unconditionally, so their record order always matches.

use serde_json::Value;
use tracing::warn;

use agentdock_core::backend::RunBackend;
use agentdock_core::error::StreamError;
use agentdock_core::record::{StreamRecord, TokenUsage};
use agentdock_core::types::SessionInfo;

use crate::accumulate::PartialAccumulator;
use crate::parse::{parse_history_element, parse_line, parse_value};

// ─── Notices ──────────────────────────────────────────────────────

/// Out-of-band observations surfaced while applying records.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamNotice {
    /// Cumulative token counters from a usage-bearing record.
    TokenUsage(TokenUsage),
    /// Session binding announced by a `session_info` record.
    SessionInfo(SessionInfo),
    /// The stream reached a terminal record.
    Finished { failed: bool },
}

// ─── Snapshot ─────────────────────────────────────────────────────

/// Point-in-time copy handed to subscribers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSnapshot {
    pub messages: Vec<StreamRecord>,
    pub raw_output: String,
    pub is_streaming: bool,
    pub current_session_id: Option<String>,
}

// ─── Session Stream ───────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SessionStream {
    messages: Vec<StreamRecord>,
    raw_output: String,
    partials: PartialAccumulator,
    is_streaming: bool,
    current_session_id: Option<String>,
    current_project_id: Option<String>,
    last_usage: Option<TokenUsage>,
}

impl SessionStream {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn messages(&self) -> &[StreamRecord] {
        &self.messages
    }

    pub fn raw_output(&self) -> &str {
        &self.raw_output
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session_id.as_deref()
    }

    pub fn current_project_id(&self) -> Option<&str> {
        self.current_project_id.as_deref()
    }

    pub fn last_usage(&self) -> Option<TokenUsage> {
        self.last_usage
    }

    /// Concatenation-so-far for the block at `index` in the current turn.
    pub fn accumulated(&self, index: u64) -> Option<&str> {
        self.partials.get(index)
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            messages: self.messages.clone(),
            raw_output: self.raw_output.clone(),
            is_streaming: self.is_streaming,
            current_session_id: self.current_session_id.clone(),
        }
    }

    // ── Ingestion ────────────────────────────────────────────────

    /// Apply one newline-delimited line.
    pub fn ingest_line(&mut self, line: &str) -> Vec<StreamNotice> {
        self.apply(parse_line(line), line.to_owned())
    }

    /// Apply one live-delivered record value.
    pub fn ingest_value(&mut self, value: &Value) -> Vec<StreamNotice> {
        self.apply(parse_value(value), value.to_string())
    }

    /// Apply a raw batch, one record per line. A malformed line never
    /// aborts the remainder of the batch.
    pub fn ingest_batch(&mut self, raw: &str) -> Vec<StreamNotice> {
        let mut notices = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            notices.extend(self.ingest_line(line));
        }
        notices
    }

    /// Replace all state from a historical record set. No merge: loading
    /// session B after session A leaves no trace of A.
    pub fn load_history(&mut self, records: &[Value]) -> Vec<StreamNotice> {
        self.clear();
        let mut notices = Vec::new();
        for value in records {
            let Some((record, raw)) = parse_history_element(value) else {
                continue;
            };
            notices.extend(self.apply(record, raw));
        }
        notices
    }

    /// Fetch a session's history through the backend and replace state
    /// wholesale. Fetch failure is propagated; the caller retries.
    pub async fn load_messages<B: RunBackend>(
        &mut self,
        backend: &B,
        session_id: &str,
        project_id: Option<&str>,
    ) -> Result<Vec<StreamNotice>, StreamError> {
        let records = backend
            .fetch_history(session_id, project_id)
            .await
            .map_err(|source| StreamError::HistoryFetch {
                session_id: session_id.to_owned(),
                source,
            })?;
        let notices = self.load_history(&records);
        if self.current_session_id.is_none() {
            self.current_session_id = Some(session_id.to_owned());
        }
        Ok(notices)
    }

    /// Drop every ledger and reset per-turn state.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.raw_output.clear();
        self.partials.reset();
        self.is_streaming = false;
        self.current_session_id = None;
        self.current_project_id = None;
        self.last_usage = None;
    }

    // ── Internals ────────────────────────────────────────────────

    fn apply(&mut self, mut record: StreamRecord, raw_line: String) -> Vec<StreamNotice> {
        let mut notices = Vec::new();

        match &mut record {
            StreamRecord::Start(_) => {
                // New turn: fragments from the previous turn must not leak.
                self.partials.reset();
                self.is_streaming = true;
            }
            StreamRecord::Partial(partial) => {
                for fragment in &mut partial.tool_calls {
                    if let Some(ref delta) = fragment.arguments_delta {
                        let so_far = self.partials.append(fragment.index, delta);
                        fragment.accumulated = Some(so_far.to_owned());
                    } else if let Some(so_far) = self.partials.get(fragment.index) {
                        fragment.accumulated = Some(so_far.to_owned());
                    }
                }
            }
            StreamRecord::Response(_) => {
                self.is_streaming = false;
                notices.push(StreamNotice::Finished { failed: false });
            }
            StreamRecord::Error(_) => {
                self.is_streaming = false;
                notices.push(StreamNotice::Finished { failed: true });
            }
            StreamRecord::SessionInfo(info) => {
                if let Some(ref session_id) = info.session_id {
                    self.current_session_id = Some(session_id.clone());
                    self.current_project_id = info.project_id.clone();
                    notices.push(StreamNotice::SessionInfo(SessionInfo {
                        session_id: session_id.clone(),
                        project_id: info.project_id.clone(),
                    }));
                } else {
                    warn!("session_info record without session id");
                }
            }
            StreamRecord::System(_)
            | StreamRecord::Assistant(_)
            | StreamRecord::User(_)
            | StreamRecord::Result(_) => {}
        }

        if let Some(usage) = record.usage() {
            self.last_usage = Some(usage);
            notices.push(StreamNotice::TokenUsage(usage));
        }

        // Both ledgers, same order, no exceptions.
        self.messages.push(record);
        self.raw_output.push_str(&raw_line);
        self.raw_output.push('\n');

        notices
    }
}
