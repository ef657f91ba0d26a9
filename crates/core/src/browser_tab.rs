// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project headless browser tabs.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::define_id;
use crate::project::ProjectId;

define_id! {
    /// Short random ID for a [`BrowserTab`].
    pub struct BrowserTabId("tab-");
}

define_id! {
    /// Short random ID for a pending dialog (see [`PendingDialog`]).
    pub struct DialogId("dlg-");
}

/// Device viewport presets (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSize {
    Desktop,
    Laptop,
    Tablet,
    Mobile,
}

impl DeviceSize {
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            DeviceSize::Desktop => (1920, 1080),
            DeviceSize::Laptop => (1280, 800),
            DeviceSize::Tablet => (820, 1050),
            DeviceSize::Mobile => (393, 740),
        }
    }

    /// Default rotation for this device: landscape for desktop/laptop,
    /// portrait for tablet/mobile.
    pub const fn default_rotation(self) -> Rotation {
        match self {
            DeviceSize::Desktop | DeviceSize::Laptop => Rotation::Landscape,
            DeviceSize::Tablet | DeviceSize::Mobile => Rotation::Portrait,
        }
    }
}

impl Default for DeviceSize {
    fn default() -> Self {
        DeviceSize::Laptop
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    Landscape,
    Portrait,
}

/// A dialog raised by the page (`alert`/`confirm`/`prompt`), awaiting a
/// client reply via `preview:browser-dialog-input`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDialog {
    pub id: DialogId,
    pub kind: String,
    pub message: String,
    pub default_prompt_text: Option<String>,
}

/// One browser tab belonging to a project. At most one tab per project has
/// `is_active = true` (invariant 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserTab {
    pub id: BrowserTabId,
    pub project_id: ProjectId,
    pub url: String,
    pub title: String,
    pub device_size: DeviceSize,
    pub rotation: Rotation,
    pub is_active: bool,
    pub console_ring: VecDeque<String>,
    pub pending_dialogs: HashMap<DialogId, PendingDialog>,
}

/// Console ring buffers are capped per tab to bound memory use (§5 back-pressure).
pub const MAX_CONSOLE_ENTRIES: usize = 500;

impl BrowserTab {
    pub fn new(project_id: ProjectId, url: impl Into<String>, device_size: DeviceSize) -> Self {
        Self {
            id: BrowserTabId::new(),
            project_id,
            url: url.into(),
            title: String::new(),
            device_size,
            rotation: device_size.default_rotation(),
            is_active: false,
            console_ring: VecDeque::new(),
            pending_dialogs: HashMap::new(),
        }
    }

    pub fn push_console(&mut self, line: impl Into<String>) {
        self.console_ring.push_back(line.into());
        while self.console_ring.len() > MAX_CONSOLE_ENTRIES {
            self.console_ring.pop_front();
        }
    }

    pub fn raise_dialog(&mut self, dialog: PendingDialog) -> DialogId {
        let id = dialog.id;
        self.pending_dialogs.insert(id, dialog);
        id
    }

    /// Resolves a dialog by id, removing it from the pending set. Returns
    /// `None` for unknown dialog ids — callers should log and drop rather
    /// than error, per §4.8.
    pub fn resolve_dialog(&mut self, id: &DialogId) -> Option<PendingDialog> {
        self.pending_dialogs.remove(id)
    }

    /// Drops all pending dialogs (dismissing them), e.g. on tab close.
    pub fn clear_dialogs(&mut self) -> Vec<PendingDialog> {
        self.pending_dialogs.drain().map(|(_, d)| d).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_presets_match_spec_dimensions() {
        assert_eq!(DeviceSize::Desktop.dimensions(), (1920, 1080));
        assert_eq!(DeviceSize::Laptop.dimensions(), (1280, 800));
        assert_eq!(DeviceSize::Tablet.dimensions(), (820, 1050));
        assert_eq!(DeviceSize::Mobile.dimensions(), (393, 740));
    }

    #[test]
    fn default_rotation_follows_device_class() {
        assert_eq!(DeviceSize::Desktop.default_rotation(), Rotation::Landscape);
        assert_eq!(DeviceSize::Tablet.default_rotation(), Rotation::Portrait);
    }

    #[test]
    fn console_ring_is_capped() {
        let mut tab = BrowserTab::new(ProjectId::new(), "about:blank", DeviceSize::default());
        for i in 0..MAX_CONSOLE_ENTRIES + 5 {
            tab.push_console(format!("log-{i}"));
        }
        assert_eq!(tab.console_ring.len(), MAX_CONSOLE_ENTRIES);
    }

    #[test]
    fn unknown_dialog_id_resolves_to_none() {
        let mut tab = BrowserTab::new(ProjectId::new(), "about:blank", DeviceSize::default());
        assert!(tab.resolve_dialog(&DialogId::new()).is_none());
    }

    #[test]
    fn clear_dialogs_drains_all_pending() {
        let mut tab = BrowserTab::new(ProjectId::new(), "about:blank", DeviceSize::default());
        tab.raise_dialog(PendingDialog {
            id: DialogId::new(),
            kind: "confirm".into(),
            message: "proceed?".into(),
            default_prompt_text: None,
        });
        assert_eq!(tab.clear_dialogs().len(), 1);
        assert!(tab.pending_dialogs.is_empty());
    }
}
