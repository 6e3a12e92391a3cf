//! Tab store: bounded, ordered collection of logical views and their
//! focus state. Single-owner mutation; every external consumer goes
//! through these operations.
//!
//! Absent-id operations are successful no-ops so that late-arriving
//! events referencing an already-closed tab cannot fault the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use agentdock_core::backend::KeyValueStore;
use agentdock_core::error::TabError;
use agentdock_core::types::{TabKind, TabStatus};

use crate::focus::choose_next_active;
use crate::titles::TitleStore;

/// Hard ceiling on concurrently open tabs.
pub const DEFAULT_MAX_TABS: usize = 20;

/// Navigation-history depth.
pub const HISTORY_LIMIT: usize = 50;

// ─── Tab ──────────────────────────────────────────────────────────

/// One logical view. `order` is always the dense permutation `0..N-1`
/// across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tab {
    pub id: String,
    pub kind: TabKind,
    pub title: String,
    pub custom_title: Option<String>,
    pub session_id: Option<String>,
    pub run_id: Option<String>,
    pub status: TabStatus,
    pub order: usize,
    pub parent_tab_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tab {
    /// True when closing this tab requires external process teardown.
    fn has_live_session(&self) -> bool {
        self.kind.is_process_bearing() && (self.session_id.is_some() || self.run_id.is_some())
    }
}

// ─── Seed & Patch ─────────────────────────────────────────────────

/// Creation data for [`TabStore::add_tab`].
#[derive(Debug, Clone)]
pub struct TabSeed {
    pub kind: TabKind,
    pub title: String,
    pub session_id: Option<String>,
    pub run_id: Option<String>,
    pub parent_tab_id: Option<String>,
}

impl TabSeed {
    pub fn new(kind: TabKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            session_id: None,
            run_id: None,
            parent_tab_id: None,
        }
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent_tab_id: impl Into<String>) -> Self {
        self.parent_tab_id = Some(parent_tab_id.into());
        self
    }
}

/// Partial update for [`TabStore::update_tab`]. Outer `None` leaves the
/// field untouched; `custom_title`/`session_id`/`run_id` use a nested
/// option so callers can clear them explicitly.
#[derive(Debug, Default, Clone)]
pub struct TabPatch {
    pub title: Option<String>,
    pub custom_title: Option<Option<String>>,
    pub status: Option<TabStatus>,
    pub session_id: Option<Option<String>>,
    pub run_id: Option<Option<String>>,
}

impl TabPatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn custom_title(mut self, title: Option<String>) -> Self {
        self.custom_title = Some(title);
        self
    }

    #[must_use]
    pub fn status(mut self, status: TabStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn session(mut self, session_id: Option<String>) -> Self {
        self.session_id = Some(session_id);
        self
    }

    #[must_use]
    pub fn run(mut self, run_id: Option<String>) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

// ─── Events ───────────────────────────────────────────────────────

/// Emitted before a process-bearing tab with live session data leaves
/// the store. External teardown consumers subscribe to this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    SessionCleanup {
        tab_id: String,
        session_id: Option<String>,
        run_id: Option<String>,
    },
}

// ─── Store ────────────────────────────────────────────────────────

pub struct TabStore<S: KeyValueStore> {
    tabs: Vec<Tab>,
    active_tab_id: Option<String>,
    /// Previously-active tab ids, oldest first, deduplicated, ≤ 50.
    history: Vec<String>,
    max_tabs: usize,
    titles: TitleStore<S>,
    events: Option<UnboundedSender<TabEvent>>,
}

impl<S: KeyValueStore> TabStore<S> {
    pub fn new(titles: TitleStore<S>) -> Self {
        Self {
            tabs: Vec::new(),
            active_tab_id: None,
            history: Vec::new(),
            max_tabs: DEFAULT_MAX_TABS,
            titles,
            events: None,
        }
    }

    #[must_use]
    pub fn with_max_tabs(mut self, max_tabs: usize) -> Self {
        self.max_tabs = max_tabs;
        self
    }

    #[must_use]
    pub fn with_events(mut self, sender: UnboundedSender<TabEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab(&self, id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == id)
    }

    pub fn tabs_by_kind(&self, kind: TabKind) -> Vec<&Tab> {
        self.tabs.iter().filter(|t| t.kind == kind).collect()
    }

    pub fn active_tab_id(&self) -> Option<&str> {
        self.active_tab_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    // ── Mutations ────────────────────────────────────────────────

    /// Add a tab and focus it. Rejects with [`TabError::Capacity`] when
    /// the store is full, leaving the store unchanged.
    pub fn add_tab(&mut self, seed: TabSeed) -> Result<String, TabError> {
        if self.tabs.len() >= self.max_tabs {
            return Err(TabError::Capacity { max: self.max_tabs });
        }

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        // Restore a previously persisted custom name for this session.
        let custom_title = match (&seed.session_id, seed.kind.is_process_bearing()) {
            (Some(session_id), true) => self.titles.load(session_id).unwrap_or_else(|e| {
                tracing::warn!("custom title load failed for {session_id}: {e}");
                None
            }),
            _ => None,
        };

        self.tabs.push(Tab {
            id: id.clone(),
            kind: seed.kind,
            title: seed.title,
            custom_title,
            session_id: seed.session_id,
            run_id: seed.run_id,
            status: TabStatus::Idle,
            order: self.tabs.len(),
            parent_tab_id: seed.parent_tab_id,
            created_at: now,
            updated_at: now,
        });

        self.focus(&id);
        Ok(id)
    }

    /// Remove a tab. Absent id is a no-op. Emits a cleanup event before
    /// removal when the tab holds live session data, keeps `order`
    /// dense, and replaces the active tab per the three-tier policy.
    pub fn remove_tab(&mut self, id: &str) {
        let Some(index) = self.tabs.iter().position(|t| t.id == id) else {
            return;
        };

        if self.tabs[index].has_live_session() {
            self.emit_cleanup(&self.tabs[index]);
        }

        let removed = self.tabs.remove(index);
        self.history.retain(|h| h != id);
        self.renumber();

        if self.active_tab_id.as_deref() == Some(id) {
            let next = choose_next_active(&removed, index, &self.tabs, &self.history);
            self.active_tab_id = None;
            if let Some(next_id) = next {
                self.focus(&next_id);
            }
        }
    }

    /// Merge partial fields into a tab and bump `updated_at`. Absent id
    /// is a no-op. Custom-title changes on process-bearing tabs are
    /// persisted to (or cleared from) the side-store.
    pub fn update_tab(&mut self, id: &str, patch: TabPatch) {
        let Some(index) = self.tabs.iter().position(|t| t.id == id) else {
            return;
        };

        // Persist the rename before mutating, keyed by the tab's session.
        if let Some(ref new_custom) = patch.custom_title {
            let tab = &self.tabs[index];
            if tab.kind.is_process_bearing()
                && let Some(session_id) = tab.session_id.clone()
            {
                let result = match new_custom {
                    Some(title) => self.titles.save(&session_id, title),
                    None => self.titles.clear(&session_id),
                };
                if let Err(e) = result {
                    tracing::warn!("custom title persist failed for {session_id}: {e}");
                }
            }
        }

        let tab = &mut self.tabs[index];
        if let Some(title) = patch.title {
            tab.title = title;
        }
        if let Some(custom_title) = patch.custom_title {
            tab.custom_title = custom_title;
        }
        if let Some(status) = patch.status {
            tab.status = status;
        }
        if let Some(session_id) = patch.session_id {
            tab.session_id = session_id;
        }
        if let Some(run_id) = patch.run_id {
            tab.run_id = run_id;
        }
        tab.updated_at = Utc::now();
    }

    /// Focus a tab. Absent id is a no-op.
    pub fn set_active_tab(&mut self, id: &str) {
        if self.tab(id).is_none() {
            return;
        }
        self.focus(id);
    }

    /// Move the tab at `from` to `to` and renumber. Out-of-range `from`
    /// is a no-op; `to` is clamped.
    pub fn reorder_tabs(&mut self, from: usize, to: usize) {
        if from >= self.tabs.len() {
            return;
        }
        let to = to.min(self.tabs.len() - 1);
        if from == to {
            return;
        }
        let tab = self.tabs.remove(from);
        self.tabs.insert(to, tab);
        self.renumber();
    }

    /// Drop every tab and all derived state atomically. Live
    /// process-bearing tabs get their cleanup event first.
    pub fn close_all_tabs(&mut self) {
        let live: Vec<Tab> = self
            .tabs
            .iter()
            .filter(|t| t.has_live_session())
            .cloned()
            .collect();
        for tab in &live {
            self.emit_cleanup(tab);
        }
        self.tabs.clear();
        self.active_tab_id = None;
        self.history.clear();
    }

    // ── Internals ────────────────────────────────────────────────

    /// Switch focus to `id` (which must exist). The previous active id
    /// moves onto the history stack; status flags keep exactly one tab
    /// `Active`. Process states (`Running`/`Complete`/`Error`) are not
    /// clobbered by focus changes.
    fn focus(&mut self, id: &str) {
        if self.active_tab_id.as_deref() == Some(id) {
            return;
        }

        if let Some(prev) = self.active_tab_id.take() {
            self.push_history(prev.clone());
            if let Some(tab) = self.tabs.iter_mut().find(|t| t.id == prev)
                && tab.status == TabStatus::Active
            {
                tab.status = TabStatus::Idle;
                tab.updated_at = Utc::now();
            }
        }

        if let Some(tab) = self.tabs.iter_mut().find(|t| t.id == id) {
            if tab.status == TabStatus::Idle {
                tab.status = TabStatus::Active;
            }
            tab.updated_at = Utc::now();
        }
        self.active_tab_id = Some(id.to_owned());
    }

    /// Move-to-top deduplicated push, bounded at [`HISTORY_LIMIT`].
    fn push_history(&mut self, id: String) {
        self.history.retain(|h| h != &id);
        self.history.push(id);
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }
    }

    fn renumber(&mut self) {
        let now = Utc::now();
        for (i, tab) in self.tabs.iter_mut().enumerate() {
            if tab.order != i {
                tab.order = i;
                tab.updated_at = now;
            }
        }
    }

    fn emit_cleanup(&self, tab: &Tab) {
        if let Some(ref sender) = self.events {
            let _ = sender.send(TabEvent::SessionCleanup {
                tab_id: tab.id.clone(),
                session_id: tab.session_id.clone(),
                run_id: tab.run_id.clone(),
            });
        }
    }
}
