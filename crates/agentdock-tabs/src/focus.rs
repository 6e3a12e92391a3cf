//! Focus replacement policy: which tab becomes active after a removal.
//! Pure decision function, unit-testable apart from the store's
//! mutation path.

use crate::store::Tab;

/// Pick the next active tab after `removed` has been taken out.
///
/// Priority (highest to lowest):
/// 1. the removed tab's parent, if still present
/// 2. the most recent navigation-history entry that still exists
/// 3. the tab now sitting at `min(removed_index, remaining - 1)`
///
/// Returns `None` iff `remaining` is empty. `history` is ordered oldest
/// first and must no longer contain the removed id.
pub fn choose_next_active(
    removed: &Tab,
    removed_index: usize,
    remaining: &[Tab],
    history: &[String],
) -> Option<String> {
    if remaining.is_empty() {
        return None;
    }

    // 1. Parent tab takes precedence
    if let Some(ref parent_id) = removed.parent_tab_id
        && remaining.iter().any(|t| &t.id == parent_id)
    {
        return Some(parent_id.clone());
    }

    // 2. Newest surviving history entry
    for id in history.iter().rev() {
        if remaining.iter().any(|t| &t.id == id) {
            return Some(id.clone());
        }
    }

    // 3. Positional fallback, clamped to the shrunken collection
    let idx = removed_index.min(remaining.len() - 1);
    Some(remaining[idx].id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdock_core::types::{TabKind, TabStatus};
    use chrono::Utc;

    fn tab(id: &str, parent: Option<&str>) -> Tab {
        let now = Utc::now();
        Tab {
            id: id.to_owned(),
            kind: TabKind::Chat,
            title: id.to_owned(),
            custom_title: None,
            session_id: None,
            run_id: None,
            status: TabStatus::Idle,
            order: 0,
            parent_tab_id: parent.map(str::to_owned),
            created_at: now,
            updated_at: now,
        }
    }

    // ── 1. Parent wins over history and index ───────────────────────

    #[test]
    fn parent_takes_precedence() {
        let removed = tab("exec", Some("agents"));
        let remaining = [tab("chat", None), tab("agents", None)];
        let history = vec!["chat".to_owned()];
        let next = choose_next_active(&removed, 1, &remaining, &history);
        assert_eq!(next.as_deref(), Some("agents"));
    }

    #[test]
    fn missing_parent_falls_through() {
        let removed = tab("exec", Some("gone"));
        let remaining = [tab("chat", None)];
        let next = choose_next_active(&removed, 0, &remaining, &[]);
        assert_eq!(next.as_deref(), Some("chat"));
    }

    // ── 2. History fallback ─────────────────────────────────────────

    #[test]
    fn newest_surviving_history_entry_wins() {
        let removed = tab("current", None);
        let remaining = [tab("a", None), tab("b", None), tab("c", None)];
        let history = vec!["a".to_owned(), "stale".to_owned(), "b".to_owned()];
        let next = choose_next_active(&removed, 0, &remaining, &history);
        assert_eq!(next.as_deref(), Some("b"));
    }

    #[test]
    fn history_entries_for_closed_tabs_skipped() {
        let removed = tab("current", None);
        let remaining = [tab("a", None)];
        let history = vec!["x".to_owned(), "y".to_owned()];
        let next = choose_next_active(&removed, 0, &remaining, &history);
        assert_eq!(next.as_deref(), Some("a"));
    }

    // ── 3. Index clamp fallback ─────────────────────────────────────

    #[test]
    fn index_fallback_same_position() {
        let removed = tab("middle", None);
        let remaining = [tab("a", None), tab("b", None)];
        let next = choose_next_active(&removed, 1, &remaining, &[]);
        assert_eq!(next.as_deref(), Some("b"));
    }

    #[test]
    fn index_fallback_clamps_at_end() {
        let removed = tab("last", None);
        let remaining = [tab("a", None), tab("b", None)];
        let next = choose_next_active(&removed, 5, &remaining, &[]);
        assert_eq!(next.as_deref(), Some("b"));
    }

    // ── Empty collection ────────────────────────────────────────────

    #[test]
    fn empty_remaining_yields_none() {
        let removed = tab("only", Some("parent"));
        let next = choose_next_active(&removed, 0, &[], &["parent".to_owned()]);
        assert!(next.is_none());
    }
}
