// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser Tab Manager (§4.8, C8).
//!
//! The actual headless-browser engine (a CDP-speaking process) is an
//! external collaborator reached only through the narrow [`BrowserEngine`]
//! trait; production wiring shells out to / drives that process, tests
//! substitute [`FakeBrowserEngine`] — the same adapter-trait-plus-fake
//! shape as the teacher's `AgentAdapter`/`FakeAgentAdapter`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hearth_core::{BrowserTab, BrowserTabId, DeviceSize, DialogId, McpControlState, PendingDialog, ProjectId, Rotation};
use parking_lot::Mutex as SyncMutex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdapterError;

/// Narrow boundary to the real headless-browser process.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn navigate(&self, tab: BrowserTabId, url: &str) -> Result<(), AdapterError>;
    /// Returns a PNG-encoded viewport capture.
    async fn screenshot(&self, tab: BrowserTabId) -> Result<Vec<u8>, AdapterError>;
    async fn evaluate(&self, tab: BrowserTabId, script: &str) -> Result<Value, AdapterError>;
    async fn set_viewport(&self, tab: BrowserTabId, width: u32, height: u32) -> Result<(), AdapterError>;
    /// Installs the dialog pre-binding (print interception) and listener.
    async fn register_dialog_handler(&self, tab: BrowserTabId) -> Result<(), AdapterError>;
    async fn close(&self, tab: BrowserTabId) -> Result<(), AdapterError>;
}

/// In-memory double used by tests and by anything compiled with the
/// `test-support` feature.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeBrowserEngine {
    pub navigations: SyncMutex<Vec<(BrowserTabId, String)>>,
    pub evaluations: SyncMutex<Vec<(BrowserTabId, String)>>,
    pub closed: SyncMutex<Vec<BrowserTabId>>,
    pub dom_response: Value,
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl BrowserEngine for FakeBrowserEngine {
    async fn navigate(&self, tab: BrowserTabId, url: &str) -> Result<(), AdapterError> {
        self.navigations.lock().push((tab, url.to_string()));
        Ok(())
    }

    async fn screenshot(&self, _tab: BrowserTabId) -> Result<Vec<u8>, AdapterError> {
        // A minimal but valid 1x1 PNG, so base64 round-tripping is real.
        Ok(vec![
            0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
        ])
    }

    async fn evaluate(&self, tab: BrowserTabId, script: &str) -> Result<Value, AdapterError> {
        self.evaluations.lock().push((tab, script.to_string()));
        if script.contains(DOM_ANALYSIS_PROBE_MARKER) {
            return Ok(self.dom_response.clone());
        }
        Ok(Value::Null)
    }

    async fn set_viewport(&self, _tab: BrowserTabId, _width: u32, _height: u32) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn register_dialog_handler(&self, _tab: BrowserTabId) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn close(&self, tab: BrowserTabId) -> Result<(), AdapterError> {
        self.closed.lock().push(tab);
        Ok(())
    }
}

/// Stand-in [`BrowserEngine`] for deployments with no CDP-speaking process
/// configured. Every call fails with [`AdapterError::Engine`] rather than
/// pretending to succeed — this is not a test double, it's an honest
/// "not wired up" default so the rest of the daemon still boots and the
/// other channels keep working.
#[derive(Default)]
pub struct UnavailableBrowserEngine;

#[async_trait]
impl BrowserEngine for UnavailableBrowserEngine {
    async fn navigate(&self, _tab: BrowserTabId, _url: &str) -> Result<(), AdapterError> {
        Err(AdapterError::Engine("no browser engine configured for this deployment".to_string()))
    }

    async fn screenshot(&self, _tab: BrowserTabId) -> Result<Vec<u8>, AdapterError> {
        Err(AdapterError::Engine("no browser engine configured for this deployment".to_string()))
    }

    async fn evaluate(&self, _tab: BrowserTabId, _script: &str) -> Result<Value, AdapterError> {
        Err(AdapterError::Engine("no browser engine configured for this deployment".to_string()))
    }

    async fn set_viewport(&self, _tab: BrowserTabId, _width: u32, _height: u32) -> Result<(), AdapterError> {
        Err(AdapterError::Engine("no browser engine configured for this deployment".to_string()))
    }

    async fn register_dialog_handler(&self, _tab: BrowserTabId) -> Result<(), AdapterError> {
        Err(AdapterError::Engine("no browser engine configured for this deployment".to_string()))
    }

    async fn close(&self, _tab: BrowserTabId) -> Result<(), AdapterError> {
        Err(AdapterError::Engine("no browser engine configured for this deployment".to_string()))
    }
}

const DOM_ANALYSIS_PROBE_MARKER: &str = "__hearth_analyze_dom__";

/// `analyze_dom(include?)` result shape (§4.8).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomNavigation {
    #[serde(default)]
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomStructure {
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomContent {
    #[serde(default)]
    pub paragraphs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSummary {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub has_iframes: bool,
    #[serde(default)]
    pub has_captcha: bool,
    #[serde(default)]
    pub scrollable_height: u32,
    #[serde(default)]
    pub viewport_height: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomAnalysis {
    #[serde(default)]
    pub navigation: DomNavigation,
    #[serde(default)]
    pub structure: DomStructure,
    #[serde(default)]
    pub content: DomContent,
    #[serde(default)]
    pub forms: Vec<Value>,
    #[serde(default)]
    pub summary: DomSummary,
}

const MAX_PARAGRAPHS: usize = 100;

/// Well-known selectors whose presence implies a CAPTCHA challenge.
const CAPTCHA_SELECTORS: &[&str] = &[".g-recaptcha", "#h-captcha", "iframe[src*='hcaptcha']", "[data-sitekey]"];

/// One step of a `actions(action[])` sequence (§4.8 Actions).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrowserAction {
    Click { selector: String },
    Type { text: String, #[serde(default = "default_true")] clear_first: bool },
    Move { x: f64, y: f64 },
    Scroll { dx: f64, dy: f64 },
    Wait { ms: u64 },
    ExtractData { selector: String },
}

fn default_true() -> bool {
    true
}

const TYPE_PACING_MS: u64 = 30;

struct ProjectState {
    tabs: HashMap<BrowserTabId, BrowserTab>,
    active: Option<BrowserTabId>,
    control: McpControlState,
}

impl ProjectState {
    fn new(project_id: ProjectId) -> Self {
        Self { tabs: HashMap::new(), active: None, control: McpControlState::new(project_id) }
    }
}

/// Owns every project's tab set and dispatches to the [`BrowserEngine`]
/// collaborator for anything that actually touches a live page.
pub struct BrowserTabManager<E: BrowserEngine> {
    engine: Arc<E>,
    projects: SyncMutex<HashMap<ProjectId, ProjectState>>,
    now: Arc<dyn Fn() -> String + Send + Sync>,
}

impl<E: BrowserEngine> BrowserTabManager<E> {
    pub fn new(engine: Arc<E>, now: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        Self { engine, projects: SyncMutex::new(HashMap::new()), now }
    }

    pub fn list_tabs(&self, project_id: ProjectId) -> Vec<BrowserTab> {
        self.projects.lock().get(&project_id).map(|p| p.tabs.values().cloned().collect()).unwrap_or_default()
    }

    /// Opens a new tab: installs the dialog pre-binding, navigates, sets
    /// the device viewport, then registers the post-navigation dialog
    /// listener (§4.8 order: pre-bind before navigation, listener after).
    pub async fn open_tab(
        &self,
        project_id: ProjectId,
        url: Option<String>,
        device_size: DeviceSize,
        rotation: Option<Rotation>,
    ) -> Result<BrowserTabId, AdapterError> {
        let mut tab = BrowserTab::new(project_id, url.clone().unwrap_or_else(|| "about:blank".to_string()), device_size);
        if let Some(rotation) = rotation {
            tab.rotation = rotation;
        }
        let id = tab.id;

        self.engine.register_dialog_handler(id).await?;
        if let Some(url) = &url {
            self.engine.navigate(id, url).await?;
        }
        let (width, height) = device_size.dimensions();
        let (width, height) = match tab.rotation {
            Rotation::Landscape => (width.max(height), width.min(height)),
            Rotation::Portrait => (width.min(height), width.max(height)),
        };
        self.engine.set_viewport(id, width, height).await?;
        self.engine.register_dialog_handler(id).await?;

        let mut projects = self.projects.lock();
        let state = projects.entry(project_id).or_insert_with(|| ProjectState::new(project_id));
        for existing in state.tabs.values_mut() {
            existing.is_active = false;
        }
        tab.is_active = true;
        state.tabs.insert(id, tab);
        state.active = Some(id);
        Ok(id)
    }

    pub fn switch_tab(&self, project_id: ProjectId, tab_id: BrowserTabId) -> Result<(), AdapterError> {
        let mut projects = self.projects.lock();
        let state = projects.get_mut(&project_id).ok_or_else(|| AdapterError::ProjectNotFound(project_id.to_string()))?;
        if !state.tabs.contains_key(&tab_id) {
            return Err(AdapterError::TabNotFound(tab_id.to_string()));
        }
        for (id, tab) in state.tabs.iter_mut() {
            tab.is_active = *id == tab_id;
        }
        state.active = Some(tab_id);
        // MCP control is scoped to the active tab; switching releases it.
        state.control.release();
        Ok(())
    }

    pub async fn close_tab(&self, project_id: ProjectId, tab_id: BrowserTabId) -> Result<(), AdapterError> {
        let dropped_dialogs = {
            let mut projects = self.projects.lock();
            let state =
                projects.get_mut(&project_id).ok_or_else(|| AdapterError::ProjectNotFound(project_id.to_string()))?;
            let mut tab = state.tabs.remove(&tab_id).ok_or_else(|| AdapterError::TabNotFound(tab_id.to_string()))?;
            let dialogs = tab.clear_dialogs();
            if state.active == Some(tab_id) {
                state.active = None;
                state.control.release();
            }
            dialogs
        };
        let _ = dropped_dialogs;
        self.engine.close(tab_id).await
    }

    pub async fn navigate(&self, project_id: ProjectId, tab_id: BrowserTabId, url: &str) -> Result<(), AdapterError> {
        self.with_tab(project_id, tab_id, |tab| tab.url = url.to_string())?;
        self.engine.navigate(tab_id, url).await
    }

    pub async fn set_viewport(
        &self,
        project_id: ProjectId,
        tab_id: BrowserTabId,
        device_size: Option<DeviceSize>,
        rotation: Option<Rotation>,
    ) -> Result<(), AdapterError> {
        let (width, height, final_rotation) = self.with_tab(project_id, tab_id, |tab| {
            if let Some(size) = device_size {
                tab.device_size = size;
            }
            if let Some(rotation) = rotation {
                tab.rotation = rotation;
            }
            let (w, h) = tab.device_size.dimensions();
            (w, h, tab.rotation)
        })?;
        let (width, height) = match final_rotation {
            Rotation::Landscape => (width.max(height), width.min(height)),
            Rotation::Portrait => (width.min(height), width.max(height)),
        };
        self.engine.set_viewport(tab_id, width, height).await
    }

    fn with_tab<R>(&self, project_id: ProjectId, tab_id: BrowserTabId, f: impl FnOnce(&mut BrowserTab) -> R) -> Result<R, AdapterError> {
        let mut projects = self.projects.lock();
        let state = projects.get_mut(&project_id).ok_or_else(|| AdapterError::ProjectNotFound(project_id.to_string()))?;
        let tab = state.tabs.get_mut(&tab_id).ok_or_else(|| AdapterError::TabNotFound(tab_id.to_string()))?;
        Ok(f(tab))
    }

    /// Runs `f` against this project's MCP control lock, used by the tool
    /// dispatcher to arbitrate automated actions against the active tab.
    pub fn with_control<R>(&self, project_id: ProjectId, f: impl FnOnce(&mut McpControlState) -> R) -> Result<R, AdapterError> {
        let mut projects = self.projects.lock();
        let state = projects.get_mut(&project_id).ok_or_else(|| AdapterError::ProjectNotFound(project_id.to_string()))?;
        Ok(f(&mut state.control))
    }

    /// The first project with at least one open tab, used as the MCP
    /// dispatcher's last-resort `project_id` fallback.
    pub fn first_project_with_tabs(&self) -> Option<ProjectId> {
        self.projects.lock().iter().find(|(_, state)| !state.tabs.is_empty()).map(|(id, _)| *id)
    }

    /// Raises a dialog, broadcasting is the router's job; this only files
    /// it into the tab's pending set and returns its id.
    pub fn raise_dialog(&self, project_id: ProjectId, tab_id: BrowserTabId, dialog: PendingDialog) -> Result<DialogId, AdapterError> {
        self.with_tab(project_id, tab_id, |tab| tab.raise_dialog(dialog))
    }

    /// A client's reply to `preview:browser-dialog-input`. Unknown dialog
    /// ids are dropped (per §4.8), not errored.
    pub fn resolve_dialog(&self, project_id: ProjectId, tab_id: BrowserTabId, dialog_id: DialogId) -> Result<Option<PendingDialog>, AdapterError> {
        self.with_tab(project_id, tab_id, |tab| tab.resolve_dialog(&dialog_id))
    }

    pub fn console_get(&self, project_id: ProjectId, tab_id: BrowserTabId) -> Result<Vec<String>, AdapterError> {
        self.with_tab(project_id, tab_id, |tab| tab.console_ring.iter().cloned().collect())
    }

    pub fn console_clear(&self, project_id: ProjectId, tab_id: BrowserTabId) -> Result<(), AdapterError> {
        self.with_tab(project_id, tab_id, |tab| tab.console_ring.clear())
    }

    pub async fn console_execute(&self, project_id: ProjectId, tab_id: BrowserTabId, script: &str) -> Result<Value, AdapterError> {
        let result = self.engine.evaluate(tab_id, script).await?;
        self.with_tab(project_id, tab_id, |tab| tab.push_console(format!("> {script}")))?;
        Ok(result)
    }

    /// Runs the in-page DOM probe and deserializes its result.
    pub async fn analyze_dom(&self, tab_id: BrowserTabId) -> Result<DomAnalysis, AdapterError> {
        let probe = format!("{DOM_ANALYSIS_PROBE_MARKER}()");
        let raw = self.engine.evaluate(tab_id, &probe).await?;
        let mut analysis: DomAnalysis =
            serde_json::from_value(raw).map_err(|e| AdapterError::Engine(format!("malformed analyze_dom result: {e}")))?;
        analysis.content.paragraphs.dedup();
        analysis.content.paragraphs.truncate(MAX_PARAGRAPHS);
        analysis.summary.has_captcha = analysis.summary.has_captcha
            || CAPTCHA_SELECTORS.iter().any(|sel| analysis.structure.sections.iter().any(|s| s.contains(sel)));
        Ok(analysis)
    }

    pub async fn take_screenshot(&self, tab_id: BrowserTabId) -> Result<String, AdapterError> {
        let png = self.engine.screenshot(tab_id).await?;
        Ok(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, png))
    }

    /// Runs a sequence of actions against one tab, in order.
    pub async fn actions(&self, tab_id: BrowserTabId, steps: Vec<BrowserAction>) -> Result<Vec<Value>, AdapterError> {
        let mut results = Vec::with_capacity(steps.len());
        for step in steps {
            let result = match step {
                BrowserAction::Click { selector } => {
                    let script = format!("document.querySelector({:?})?.click()", selector);
                    self.engine.evaluate(tab_id, &script).await?
                }
                BrowserAction::Type { text, clear_first } => {
                    if clear_first {
                        self.engine.evaluate(tab_id, "document.activeElement.value=''").await?;
                    }
                    for ch in text.chars() {
                        let script = format!("document.activeElement.value += {:?}", ch.to_string());
                        self.engine.evaluate(tab_id, &script).await?;
                        tokio::time::sleep(std::time::Duration::from_millis(TYPE_PACING_MS)).await;
                    }
                    Value::Null
                }
                BrowserAction::Move { x, y } => {
                    let script = format!("window.dispatchEvent(new MouseEvent('mousemove',{{clientX:{x},clientY:{y}}}))");
                    self.engine.evaluate(tab_id, &script).await?
                }
                BrowserAction::Scroll { dx, dy } => {
                    let script = format!("window.scrollBy({dx},{dy})");
                    self.engine.evaluate(tab_id, &script).await?
                }
                BrowserAction::Wait { ms } => {
                    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
                    Value::Null
                }
                BrowserAction::ExtractData { selector } => {
                    let script = format!("document.querySelector({:?})?.textContent", selector);
                    self.engine.evaluate(tab_id, &script).await?
                }
            };
            results.push(result);
        }
        let _ = &self.now;
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> Arc<dyn Fn() -> String + Send + Sync> {
        Arc::new(|| "2026-01-01T00:00:00Z".to_string())
    }

    #[tokio::test]
    async fn open_tab_becomes_the_sole_active_tab() {
        let engine = Arc::new(FakeBrowserEngine::default());
        let manager = BrowserTabManager::new(engine, clock());
        let project_id = ProjectId::new();

        let first = manager.open_tab(project_id, Some("https://a.test".into()), DeviceSize::Laptop, None).await.unwrap();
        let second = manager.open_tab(project_id, Some("https://b.test".into()), DeviceSize::Laptop, None).await.unwrap();

        let tabs = manager.list_tabs(project_id);
        let active: Vec<_> = tabs.iter().filter(|t| t.is_active).map(|t| t.id).collect();
        assert_eq!(active, vec![second]);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn switching_tabs_releases_mcp_control() {
        let engine = Arc::new(FakeBrowserEngine::default());
        let manager = BrowserTabManager::new(engine, clock());
        let project_id = ProjectId::new();
        let a = manager.open_tab(project_id, None, DeviceSize::Laptop, None).await.unwrap();
        let b = manager.open_tab(project_id, None, DeviceSize::Laptop, None).await.unwrap();

        {
            let mut projects = manager.projects.lock();
            projects.get_mut(&project_id).unwrap().control.try_acquire(a, "2026-01-01T00:00:00Z");
        }
        manager.switch_tab(project_id, b).unwrap();
        let projects = manager.projects.lock();
        assert!(projects.get(&project_id).unwrap().control.controlled_tab_id.is_none());
    }

    #[tokio::test]
    async fn closing_a_tab_drops_its_pending_dialogs() {
        let engine = Arc::new(FakeBrowserEngine::default());
        let manager = BrowserTabManager::new(engine.clone(), clock());
        let project_id = ProjectId::new();
        let tab_id = manager.open_tab(project_id, None, DeviceSize::Laptop, None).await.unwrap();

        manager
            .raise_dialog(
                project_id,
                tab_id,
                PendingDialog { id: DialogId::new(), kind: "alert".into(), message: "hi".into(), default_prompt_text: None },
            )
            .unwrap();

        manager.close_tab(project_id, tab_id).await.unwrap();
        assert_eq!(engine.closed.lock().as_slice(), &[tab_id]);
    }

    #[tokio::test]
    async fn analyze_dom_dedups_and_caps_paragraphs() {
        let paragraphs: Vec<String> = (0..150).map(|i| format!("p{i}")).collect();
        let dom_response = serde_json::json!({
            "navigation": {"links": []},
            "structure": {"headings": [], "sections": []},
            "content": {"paragraphs": paragraphs},
            "forms": [],
            "summary": {"url": "https://a.test", "title": "A", "hasIframes": false, "hasCaptcha": false, "scrollableHeight": 0, "viewportHeight": 0},
        });

        let engine = Arc::new(FakeBrowserEngine { dom_response, ..Default::default() });
        let manager = BrowserTabManager::new(engine, clock());
        let project_id = ProjectId::new();
        let tab_id = manager.open_tab(project_id, None, DeviceSize::Laptop, None).await.unwrap();

        let analysis = manager.analyze_dom(tab_id).await.unwrap();
        assert_eq!(analysis.content.paragraphs.len(), MAX_PARAGRAPHS);
    }

    #[tokio::test]
    async fn take_screenshot_returns_valid_base64() {
        let engine = Arc::new(FakeBrowserEngine::default());
        let manager = BrowserTabManager::new(engine, clock());
        let project_id = ProjectId::new();
        let tab_id = manager.open_tab(project_id, None, DeviceSize::Laptop, None).await.unwrap();

        let encoded = manager.take_screenshot(tab_id).await.unwrap();
        assert!(!encoded.is_empty());
    }
}
