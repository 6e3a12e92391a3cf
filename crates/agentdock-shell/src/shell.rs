//! The shell supervisor: one owner for tab state, cached output, the
//! reconciliation poller, and the live-listener registry.
//!
//! Construction must happen inside a tokio runtime — polling starts
//! immediately and stops on [`Shell::shutdown`] (or drop).

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::watch;
use tracing::{debug, warn};

use agentdock_cache::cache::{CachedOutput, OutputCache};
use agentdock_cache::poller::BackgroundPoller;
use agentdock_core::backend::{
    Checkpoint, CheckpointDiff, CheckpointKey, CheckpointService, KeyValueStore, RunBackend,
};
use agentdock_core::error::{BackendError, StreamError, TabError};
use agentdock_core::types::{RunStatus, TabKind};
use agentdock_stream::live::LiveStream;
use agentdock_stream::session::{SessionStream, StreamSnapshot};
use agentdock_tabs::store::{Tab, TabEvent, TabPatch, TabSeed, TabStore};
use agentdock_tabs::titles::TitleStore;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Tab(#[from] TabError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

// ─── Checkpoint null object ───────────────────────────────────────

/// Placeholder used when no checkpoint engine is attached.
pub struct DisabledCheckpoints;

impl CheckpointService for DisabledCheckpoints {
    async fn create(
        &self,
        _key: &CheckpointKey,
        _label: Option<&str>,
    ) -> Result<Checkpoint, BackendError> {
        Err(BackendError::Query("no checkpoint engine attached".into()))
    }

    async fn list(&self, _key: &CheckpointKey) -> Result<Vec<Checkpoint>, BackendError> {
        Err(BackendError::Query("no checkpoint engine attached".into()))
    }

    async fn restore(
        &self,
        _key: &CheckpointKey,
        _checkpoint_id: &str,
    ) -> Result<(), BackendError> {
        Err(BackendError::Query("no checkpoint engine attached".into()))
    }

    async fn diff(
        &self,
        _key: &CheckpointKey,
        _from_id: &str,
        _to_id: &str,
    ) -> Result<CheckpointDiff, BackendError> {
        Err(BackendError::Query("no checkpoint engine attached".into()))
    }
}

// ─── Shell ────────────────────────────────────────────────────────

pub struct Shell<B: RunBackend, S: KeyValueStore, C: CheckpointService = DisabledCheckpoints> {
    backend: Arc<B>,
    tabs: TabStore<S>,
    cache: Arc<Mutex<OutputCache>>,
    poller: BackgroundPoller<B>,
    /// Live listener per run id; entries are dropped (and their pump
    /// tasks aborted) when the owning tab closes.
    listeners: HashMap<String, LiveStream>,
    cleanup_rx: UnboundedReceiver<TabEvent>,
    checkpoints: Option<Arc<C>>,
}

impl<B: RunBackend, S: KeyValueStore> Shell<B, S, DisabledCheckpoints> {
    pub fn new(backend: Arc<B>, kv: S) -> Self {
        Self::with_checkpoints(backend, kv, None)
    }
}

impl<B: RunBackend, S: KeyValueStore, C: CheckpointService> Shell<B, S, C> {
    pub fn with_checkpoints(backend: Arc<B>, kv: S, checkpoints: Option<Arc<C>>) -> Self {
        let (cleanup_tx, cleanup_rx) = mpsc::unbounded_channel();
        let tabs = TabStore::new(TitleStore::new(kv)).with_events(cleanup_tx);
        let cache = Arc::new(Mutex::new(OutputCache::new()));
        let mut poller = BackgroundPoller::new(Arc::clone(&backend), Arc::clone(&cache));
        poller.start();

        Self {
            backend,
            tabs,
            cache,
            poller,
            listeners: HashMap::new(),
            cleanup_rx,
            checkpoints,
        }
    }

    // ── Tab surface ──────────────────────────────────────────────

    /// Open a tab. A process-bearing seed with a run binding gets a
    /// live listener attached before the tab becomes visible.
    pub async fn open_tab(&mut self, seed: TabSeed) -> Result<String, ShellError> {
        let run_binding = match (&seed.run_id, seed.kind.is_process_bearing()) {
            (Some(run_id), true) => Some(run_id.clone()),
            _ => None,
        };

        let id = self.tabs.add_tab(seed)?;

        if let Some(run_id) = run_binding
            && !self.listeners.contains_key(&run_id)
        {
            match LiveStream::attach(self.backend.as_ref(), &run_id).await {
                Ok(live) => {
                    self.listeners.insert(run_id, live);
                }
                // The tab still opens; the poller will backfill output.
                Err(e) => warn!("live attach failed for {run_id}: {e}"),
            }
        }
        Ok(id)
    }

    /// Close a tab and tear down any listener its session owned.
    pub fn close_tab(&mut self, id: &str) {
        self.tabs.remove_tab(id);
        self.drain_cleanup();
    }

    pub fn focus_tab(&mut self, id: &str) {
        self.tabs.set_active_tab(id);
    }

    pub fn update_tab(&mut self, id: &str, patch: TabPatch) {
        self.tabs.update_tab(id, patch);
    }

    pub fn reorder_tabs(&mut self, from: usize, to: usize) {
        self.tabs.reorder_tabs(from, to);
    }

    pub fn close_all_tabs(&mut self) {
        self.tabs.close_all_tabs();
        self.drain_cleanup();
    }

    pub fn tabs(&self) -> &[Tab] {
        self.tabs.tabs()
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.tabs.tab(id)
    }

    pub fn tabs_by_kind(&self, kind: TabKind) -> Vec<&Tab> {
        self.tabs.tabs_by_kind(kind)
    }

    pub fn active_tab_id(&self) -> Option<&str> {
        self.tabs.active_tab_id()
    }

    // ── Cache surface ────────────────────────────────────────────

    pub async fn cached_output(&self, run_id: &str) -> Option<CachedOutput> {
        self.cache.lock().await.get(run_id).cloned()
    }

    pub async fn set_cached_output(&self, run_id: &str, entry: CachedOutput) {
        self.cache.lock().await.set(run_id, entry);
    }

    pub async fn update_run_status(&self, run_id: &str, status: RunStatus) {
        self.cache.lock().await.update_status(run_id, status);
    }

    pub async fn clear_cache(&self, run_id: Option<&str>) {
        self.cache.lock().await.clear(run_id);
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_polling()
    }

    // ── Stream surface ───────────────────────────────────────────

    /// Snapshot subscription for a run's live stream, if one is attached.
    pub fn stream_snapshots(&self, run_id: &str) -> Option<watch::Receiver<StreamSnapshot>> {
        self.listeners.get(run_id).map(LiveStream::snapshots)
    }

    /// Load a pre-existing session's history, replacing nothing in the
    /// live registries — the caller owns the returned state.
    pub async fn load_session_history(
        &self,
        session_id: &str,
        project_id: Option<&str>,
    ) -> Result<StreamSnapshot, ShellError> {
        let mut stream = SessionStream::new();
        stream
            .load_messages(self.backend.as_ref(), session_id, project_id)
            .await?;
        Ok(stream.snapshot())
    }

    // ── Checkpoints ──────────────────────────────────────────────

    /// The attached checkpoint engine, surfaced untouched.
    pub fn checkpoints(&self) -> Option<&Arc<C>> {
        self.checkpoints.as_ref()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Stop polling and tear down every live listener. Never blocks.
    pub fn shutdown(&mut self) {
        self.poller.stop();
        for (run_id, live) in self.listeners.drain() {
            debug!("unsubscribing listener for {run_id}");
            live.unsubscribe();
        }
    }

    fn drain_cleanup(&mut self) {
        while let Ok(event) = self.cleanup_rx.try_recv() {
            let TabEvent::SessionCleanup {
                tab_id,
                session_id,
                run_id,
            } = event;
            debug!("session cleanup for tab {tab_id} (session {session_id:?})");
            if let Some(run_id) = run_id
                && self.listeners.remove(&run_id).is_some()
            {
                debug!("listener for {run_id} detached");
            }
        }
    }
}
