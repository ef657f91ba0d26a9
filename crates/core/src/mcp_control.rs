// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project arbitration lock over the active browser tab, acquired by
//! MCP tool invocations (§4.10).

use serde::{Deserialize, Serialize};

use crate::browser_tab::BrowserTabId;
use crate::project::ProjectId;

/// Tracks which tab, if any, an automated (MCP) actor currently controls.
///
/// Acquire is non-blocking: it returns `false` if another tab already holds
/// the lock (§5 shared-resource policy). Callers serialize access to this
/// state with a per-project mutex; this type itself is not internally
/// synchronized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpControlState {
    pub project_id: ProjectId,
    pub controlled_tab_id: Option<BrowserTabId>,
    pub acquired_at: Option<String>,
    pub last_action_at: Option<String>,
}

impl McpControlState {
    pub fn new(project_id: ProjectId) -> Self {
        Self { project_id, controlled_tab_id: None, acquired_at: None, last_action_at: None }
    }

    /// Attempts to acquire control of `tab_id`. Succeeds if no tab is
    /// currently controlled, or if `tab_id` is already the controlled tab
    /// (re-acquiring a previously idle tab that's touched again).
    pub fn try_acquire(&mut self, tab_id: BrowserTabId, now: impl Into<String>) -> bool {
        match self.controlled_tab_id {
            None => {
                let now = now.into();
                self.controlled_tab_id = Some(tab_id);
                self.acquired_at = Some(now.clone());
                self.last_action_at = Some(now);
                true
            }
            Some(held) if held == tab_id => {
                self.last_action_at = Some(now.into());
                true
            }
            Some(_) => false,
        }
    }

    pub fn touch(&mut self, now: impl Into<String>) {
        if self.controlled_tab_id.is_some() {
            self.last_action_at = Some(now.into());
        }
    }

    /// Releases control, e.g. on tab switch or close.
    pub fn release(&mut self) {
        self.controlled_tab_id = None;
        self.acquired_at = None;
        self.last_action_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_succeeds_when_no_tab_is_controlled() {
        let mut state = McpControlState::new(ProjectId::new());
        let tab = BrowserTabId::new();
        assert!(state.try_acquire(tab, "2026-01-01T00:00:00Z"));
        assert_eq!(state.controlled_tab_id, Some(tab));
    }

    #[test]
    fn acquire_fails_for_a_different_tab_while_one_is_held() {
        let mut state = McpControlState::new(ProjectId::new());
        let first = BrowserTabId::new();
        let second = BrowserTabId::new();
        assert!(state.try_acquire(first, "2026-01-01T00:00:00Z"));
        assert!(!state.try_acquire(second, "2026-01-01T00:00:01Z"));
    }

    #[test]
    fn re_acquiring_the_same_tab_touches_last_action() {
        let mut state = McpControlState::new(ProjectId::new());
        let tab = BrowserTabId::new();
        state.try_acquire(tab, "2026-01-01T00:00:00Z");
        assert!(state.try_acquire(tab, "2026-01-01T00:05:00Z"));
        assert_eq!(state.last_action_at.as_deref(), Some("2026-01-01T00:05:00Z"));
    }

    #[test]
    fn release_clears_all_fields() {
        let mut state = McpControlState::new(ProjectId::new());
        state.try_acquire(BrowserTabId::new(), "2026-01-01T00:00:00Z");
        state.release();
        assert!(state.controlled_tab_id.is_none());
        assert!(state.acquired_at.is_none());
    }
}
