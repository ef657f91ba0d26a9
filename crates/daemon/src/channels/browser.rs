// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `preview:*` channels over the Browser Tab Manager (§4.8, C8).

use std::sync::Arc;

use hearth_adapters::webrtc_bridge::{StreamAnswer, StreamIceCandidate, StreamOffer, StreamSession};
use hearth_core::{BrowserTabId, DeviceSize, DialogId, PendingDialog, ProjectId, Rotation, WireError};
use hearth_wire::ChannelRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectScoped {
    project_id: ProjectId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenTabParams {
    project_id: ProjectId,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    device_size: DeviceSize,
    #[serde(default)]
    rotation: Option<Rotation>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenTabResult {
    tab_id: BrowserTabId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TabScoped {
    project_id: ProjectId,
    tab_id: BrowserTabId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NavigateParams {
    project_id: ProjectId,
    tab_id: BrowserTabId,
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetViewportParams {
    project_id: ProjectId,
    tab_id: BrowserTabId,
    width: u32,
    height: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RaiseDialogParams {
    project_id: ProjectId,
    tab_id: BrowserTabId,
    dialog: PendingDialog,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RaiseDialogResult {
    dialog_id: DialogId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveDialogParams {
    project_id: ProjectId,
    tab_id: BrowserTabId,
    dialog_id: DialogId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsoleExecuteParams {
    project_id: ProjectId,
    tab_id: BrowserTabId,
    script: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TabOnly {
    tab_id: BrowserTabId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionsParams {
    tab_id: BrowserTabId,
    actions: Vec<hearth_adapters::BrowserAction>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScreenshotResult {
    png_base64: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamScoped {
    project_id: ProjectId,
    tab_id: BrowserTabId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamAnswerParams {
    project_id: ProjectId,
    tab_id: BrowserTabId,
    #[serde(flatten)]
    answer: StreamAnswer,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamIceParams {
    tab_id: BrowserTabId,
    #[serde(flatten)]
    candidate: StreamIceCandidate,
}

pub fn register(registry: &mut ChannelRegistry, state: Arc<AppState>) {
    let s = state.clone();
    registry.on("preview:list-tabs", move |params: ProjectScoped| {
        let s = s.clone();
        async move { Ok(s.browser.list_tabs(params.project_id)) }
    });

    let s = state.clone();
    registry.on("preview:open-tab", move |params: OpenTabParams| {
        let s = s.clone();
        async move {
            let tab_id = s
                .browser
                .open_tab(params.project_id, params.url, params.device_size, params.rotation)
                .await
                .map_err(WireError::from)?;
            s.connections.emit_project(params.project_id, "preview:browser-tab-opened", serde_json::json!({ "tabId": tab_id }));
            Ok(OpenTabResult { tab_id })
        }
    });

    let s = state.clone();
    registry.on("preview:switch-tab", move |params: TabScoped| {
        let s = s.clone();
        async move { s.browser.switch_tab(params.project_id, params.tab_id).map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("preview:close-tab", move |params: TabScoped| {
        let s = s.clone();
        async move { s.browser.close_tab(params.project_id, params.tab_id).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("preview:navigate", move |params: NavigateParams| {
        let s = s.clone();
        async move { s.browser.navigate(params.project_id, params.tab_id, &params.url).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("preview:set-viewport", move |params: SetViewportParams| {
        let s = s.clone();
        async move {
            s.browser
                .set_viewport(params.project_id, params.tab_id, params.width, params.height)
                .await
                .map_err(WireError::from)
        }
    });

    let s = state.clone();
    registry.on("preview:browser-dialog", move |params: RaiseDialogParams| {
        let s = s.clone();
        async move {
            let dialog_id = s.browser.raise_dialog(params.project_id, params.tab_id, params.dialog).map_err(WireError::from)?;
            Ok(RaiseDialogResult { dialog_id })
        }
    });

    let s = state.clone();
    registry.on("preview:browser-dialog-input", move |params: ResolveDialogParams| {
        let s = s.clone();
        async move {
            s.browser
                .resolve_dialog(params.project_id, params.tab_id, params.dialog_id)
                .map_err(WireError::from)
        }
    });

    let s = state.clone();
    registry.on("preview:console-get", move |params: TabScoped| {
        let s = s.clone();
        async move { s.browser.console_get(params.project_id, params.tab_id).map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("preview:console-clear", move |params: TabScoped| {
        let s = s.clone();
        async move { s.browser.console_clear(params.project_id, params.tab_id).map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("preview:console-execute", move |params: ConsoleExecuteParams| {
        let s = s.clone();
        async move {
            let result: Value = s
                .browser
                .console_execute(params.project_id, params.tab_id, &params.script)
                .await
                .map_err(WireError::from)?;
            Ok(result)
        }
    });

    let s = state.clone();
    registry.on("preview:analyze-dom", move |params: TabOnly| {
        let s = s.clone();
        async move { s.browser.analyze_dom(params.tab_id).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("preview:screenshot", move |params: TabOnly| {
        let s = s.clone();
        async move {
            let png_base64 = s.browser.take_screenshot(params.tab_id).await.map_err(WireError::from)?;
            Ok(ScreenshotResult { png_base64 })
        }
    });

    let s = state.clone();
    registry.on("preview:actions", move |params: ActionsParams| {
        let s = s.clone();
        async move { s.browser.actions(params.tab_id, params.actions).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("preview:browser-stream-start", move |params: StreamScoped| {
        let s = s.clone();
        async move { open_stream(&s, params.project_id, params.tab_id).await }
    });

    let s = state.clone();
    registry.on("preview:browser-stream-offer", move |params: StreamScoped| {
        let s = s.clone();
        async move { open_stream(&s, params.project_id, params.tab_id).await }
    });

    let s = state.clone();
    registry.on("preview:browser-stream-answer", move |params: StreamAnswerParams| {
        let s = s.clone();
        async move {
            let session = s
                .preview_streams
                .lock()
                .get(&params.tab_id)
                .cloned()
                .ok_or_else(|| WireError::not_found(format!("no preview stream for tab {:?}", params.tab_id)))?;
            session.accept_answer(params.answer).await.map_err(WireError::from)
        }
    });

    let s = state.clone();
    registry.on("preview:browser-stream-ice", move |params: StreamIceParams| {
        let s = s.clone();
        async move {
            let session = s
                .preview_streams
                .lock()
                .get(&params.tab_id)
                .cloned()
                .ok_or_else(|| WireError::not_found(format!("no preview stream for tab {:?}", params.tab_id)))?;
            session.add_ice_candidate(params.candidate).await.map_err(WireError::from)
        }
    });
}

/// Builds a fresh peer for `tab_id`, wires its ICE/state callbacks to
/// `preview:browser-stream-ice`/`-state` events on the tab's project room,
/// and replaces any previous session (handles the reconnect case, where
/// `-offer` is called again for a tab that already had a stream).
async fn open_stream(state: &Arc<AppState>, project_id: ProjectId, tab_id: BrowserTabId) -> Result<StreamOffer, WireError> {
    let (session, offer) = StreamSession::new_with_offer().await.map_err(WireError::from)?;
    let session = Arc::new(session);

    let connections = state.connections.clone();
    let ice_tab = tab_id;
    session.on_ice_candidate(move |candidate| {
        connections.emit_project(
            project_id,
            "preview:browser-stream-ice",
            serde_json::json!({ "tabId": ice_tab, "candidate": candidate.to_json().map(|c| c.candidate).unwrap_or_default() }),
        );
    });

    let connections = state.connections.clone();
    let state_tab = tab_id;
    session.on_state_change(move |connection_state| {
        connections.emit_project(
            project_id,
            "preview:browser-stream-state",
            serde_json::json!({ "tabId": state_tab, "state": connection_state }),
        );
    });

    state.preview_streams.lock().insert(tab_id, session);
    Ok(offer)
}
