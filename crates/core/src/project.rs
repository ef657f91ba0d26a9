// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The root entity of all per-project state.

use serde::{Deserialize, Serialize};

use crate::define_uuid_id;

define_uuid_id! {
    /// Identifies a [`Project`]. Deletion cascades to its chat sessions,
    /// messages, snapshots, and browser services.
    pub struct ProjectId;
}

/// Root of all per-project state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub absolute_path: String,
    pub created_at: String,
    pub last_opened_at: String,
}

impl Project {
    pub fn new(name: impl Into<String>, absolute_path: impl Into<String>, now: impl Into<String>) -> Self {
        let now = now.into();
        Self {
            id: ProjectId::new(),
            name: name.into(),
            absolute_path: absolute_path.into(),
            created_at: now.clone(),
            last_opened_at: now,
        }
    }

    pub fn touch_opened(&mut self, now: impl Into<String>) {
        self.last_opened_at = now.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_project_has_matching_created_and_opened_timestamps() {
        let p = Project::new("demo", "/home/demo", "2026-01-01T00:00:00Z");
        assert_eq!(p.created_at, p.last_opened_at);
    }

    #[test]
    fn touch_opened_only_updates_last_opened() {
        let mut p = Project::new("demo", "/home/demo", "2026-01-01T00:00:00Z");
        p.touch_opened("2026-01-02T00:00:00Z");
        assert_eq!(p.created_at, "2026-01-01T00:00:00Z");
        assert_eq!(p.last_opened_at, "2026-01-02T00:00:00Z");
    }

    #[test]
    fn project_id_displays_as_uuid_text() {
        let id = ProjectId::new();
        assert_eq!(id.to_string().len(), 36);
    }
}
