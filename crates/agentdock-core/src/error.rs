//! Error taxonomy for the supervision core.
//!
//! Capacity overflow is a synchronous, user-visible rejection. Transport
//! failures propagate on one-shot operations and are swallowed-and-logged
//! by the recurring poll loop. Operations on absent ids are defined as
//! successful no-ops and never appear here.

use thiserror::Error;

/// Parse/vocabulary errors for the shared enums.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unknown tab kind: {0}")]
    UnknownTabKind(String),

    #[error("unknown run status: {0}")]
    UnknownRunStatus(String),
}

/// Tab store mutation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TabError {
    #[error("tab limit reached ({max} tabs open)")]
    Capacity { max: usize },
}

/// Failures crossing a collaborator boundary.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend query failed: {0}")]
    Query(String),

    #[error("subscription failed for run {run_id}: {detail}")]
    Subscribe { run_id: String, detail: String },

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stream reconciler errors. Per-record malformation is recovered
/// in-stream (synthesized error record) and never surfaces here.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to load history for session {session_id}")]
    HistoryFetch {
        session_id: String,
        #[source]
        source: BackendError,
    },
}
