//! Collaborator contracts: the external process surface, the key-value
//! persistence surface, and the checkpoint/timeline service. All are
//! implemented elsewhere; the core consumes them through these traits.
//! Trait seams are mock-injectable for testing.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::BackendError;
use crate::types::RunningUnit;

// ─── Run Backend ──────────────────────────────────────────────────

/// External process surface: liveness, raw output, live events, history.
///
/// `subscribe` delivers records in producer order; the returned receiver
/// is the unsubscribe handle (dropping it ends delivery).
pub trait RunBackend: Send + Sync + 'static {
    /// Authoritative "what is still alive" query.
    fn list_running_units(
        &self,
    ) -> impl Future<Output = Result<Vec<RunningUnit>, BackendError>> + Send;

    /// Newline-delimited record batch produced by the run so far.
    fn fetch_raw_output(
        &self,
        run_id: &str,
    ) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// Live event subscription for a run. In-order delivery.
    fn subscribe(
        &self,
        run_id: &str,
    ) -> impl Future<Output = Result<UnboundedReceiver<Value>, BackendError>> + Send;

    /// Full historical record set for a session. Elements may arrive as
    /// structured objects or as JSON strings; callers must accept both.
    fn fetch_history(
        &self,
        session_id: &str,
        project_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Value>, BackendError>> + Send;
}

// ─── Key-Value Persistence ────────────────────────────────────────

/// Persisted key-value surface (storage format is external).
/// Each key is independent; no cross-key coupling.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError>;
    fn remove(&mut self, key: &str) -> Result<(), BackendError>;
}

// ─── Checkpoint Contract ──────────────────────────────────────────

/// Identifier triple shared with the tab store and stream reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointKey {
    pub session_id: String,
    pub project_id: String,
    pub project_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

/// Checkpoint/timeline engine, consumed as an opaque service.
pub trait CheckpointService: Send + Sync + 'static {
    fn create(
        &self,
        key: &CheckpointKey,
        label: Option<&str>,
    ) -> impl Future<Output = Result<Checkpoint, BackendError>> + Send;

    fn list(
        &self,
        key: &CheckpointKey,
    ) -> impl Future<Output = Result<Vec<Checkpoint>, BackendError>> + Send;

    fn restore(
        &self,
        key: &CheckpointKey,
        checkpoint_id: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn diff(
        &self,
        key: &CheckpointKey,
        from_id: &str,
        to_id: &str,
    ) -> impl Future<Output = Result<CheckpointDiff, BackendError>> + Send;
}
