// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP Dispatcher (§4.10, C10).
//!
//! Tools are registered with a name, description, argument schema, and
//! handler. Argument structs derive both `serde::Deserialize` (for the
//! handler) and `schemars::JsonSchema` (for the schema surfaced to MCP
//! clients), so the two never drift apart. Two transports share the same
//! tool table: an in-process direct call, and a child-process stdio
//! transport that frames one JSON request/response per line.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hearth_core::{BrowserTabId, ProjectId};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::browser::{BrowserAction, BrowserEngine, BrowserTabManager, DomAnalysis};
use crate::error::AdapterError;

/// One MCP content item: text or an image, never a hand-rolled tagged map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    Text { text: String },
    Image { base64: String, mime_type: String },
}

/// Resolution context passed down from the transport, used to fill in
/// `project_id` when a tool call omits it explicitly.
#[derive(Debug, Clone, Default)]
pub struct McpContext {
    pub project_id: Option<ProjectId>,
}

type ToolFuture = Pin<Box<dyn Future<Output = Result<Vec<ToolContent>, AdapterError>> + Send>>;
type ToolHandler = Box<dyn Fn(Value, McpContext) -> ToolFuture + Send + Sync>;

struct ToolEntry {
    description: &'static str,
    schema: schemars::schema::RootSchema,
    handler: ToolHandler,
}

/// Declarative tool table plus the per-project resolution/arbitration
/// policy shared by both transports.
pub struct McpDispatcher<E: BrowserEngine + 'static> {
    tools: HashMap<&'static str, ToolEntry>,
    tabs: Arc<BrowserTabManager<E>>,
    now: Arc<dyn Fn() -> String + Send + Sync>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListTabsArgs {
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NavigateArgs {
    #[serde(default)]
    pub project_id: Option<String>,
    pub tab_id: String,
    pub url: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ActionsArgs {
    #[serde(default)]
    pub project_id: Option<String>,
    pub tab_id: String,
    pub actions: Vec<BrowserAction>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalyzeDomArgs {
    #[serde(default)]
    pub project_id: Option<String>,
    pub tab_id: String,
    #[serde(default)]
    pub include: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ScreenshotArgs {
    #[serde(default)]
    pub project_id: Option<String>,
    pub tab_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConsoleArgs {
    #[serde(default)]
    pub project_id: Option<String>,
    pub tab_id: String,
    #[serde(default)]
    pub mode: ConsoleMode,
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleMode {
    #[default]
    Get,
    Clear,
    Execute,
}

impl<E: BrowserEngine + 'static> McpDispatcher<E> {
    pub fn new(tabs: Arc<BrowserTabManager<E>>, now: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        let mut dispatcher = Self { tools: HashMap::new(), tabs, now };
        dispatcher.register_default_tools();
        dispatcher
    }

    fn register_default_tools(&mut self) {
        let tabs = self.tabs.clone();
        // `tabs` lists every open tab for a project rather than acting on
        // one — it takes no `tab_id`, so there's nothing for it to hold MCP
        // control over. Every other tool below targets a specific tab and
        // acquires control of it before touching the live page.
        self.tools.insert(
            "tabs",
            ToolEntry {
                description: "List browser tabs for a project",
                schema: schemars::schema_for!(ListTabsArgs),
                handler: {
                    let tabs = tabs.clone();
                    Box::new(move |raw, ctx| {
                        let tabs = tabs.clone();
                        let raw_args: Result<ListTabsArgs, _> = serde_json::from_value(raw);
                        Box::pin(async move {
                            let args = raw_args.map_err(|e| AdapterError::Engine(e.to_string()))?;
                            let project_id = resolve_project(args.project_id, &ctx, &tabs)?;
                            let list = tabs.list_tabs(project_id);
                            Ok(vec![ToolContent::Text { text: serde_json::to_string(&list).unwrap_or_default() }])
                        })
                    })
                },
            },
        );

        self.tools.insert(
            "navigate",
            ToolEntry {
                description: "Navigate a tab to a URL",
                schema: schemars::schema_for!(NavigateArgs),
                handler: {
                    let tabs = tabs.clone();
                    let now = self.now.clone();
                    Box::new(move |raw, ctx| {
                        let tabs = tabs.clone();
                        let now = now.clone();
                        Box::pin(async move {
                            let args: NavigateArgs = serde_json::from_value(raw).map_err(|e| AdapterError::Engine(e.to_string()))?;
                            let project_id = resolve_project(args.project_id, &ctx, &tabs)?;
                            let tab_id = parse_tab_id(&args.tab_id)?;
                            tabs.acquire_control(project_id, tab_id, &now)?;
                            tabs.navigate(project_id, tab_id, &args.url).await?;
                            Ok(vec![ToolContent::Text { text: format!("navigated to {}", args.url) }])
                        })
                    })
                },
            },
        );

        self.tools.insert(
            "actions",
            ToolEntry {
                description: "Run a sequence of click/type/move/scroll/wait/extract_data actions",
                schema: schemars::schema_for!(ActionsArgs),
                handler: {
                    let tabs = tabs.clone();
                    let now = self.now.clone();
                    Box::new(move |raw, ctx| {
                        let tabs = tabs.clone();
                        let now = now.clone();
                        Box::pin(async move {
                            let args: ActionsArgs = serde_json::from_value(raw).map_err(|e| AdapterError::Engine(e.to_string()))?;
                            let project_id = resolve_project(args.project_id, &ctx, &tabs)?;
                            let tab_id = parse_tab_id(&args.tab_id)?;
                            tabs.acquire_control(project_id, tab_id, &now)?;
                            let results = tabs.actions(tab_id, args.actions).await?;
                            Ok(vec![ToolContent::Text { text: serde_json::to_string(&results).unwrap_or_default() }])
                        })
                    })
                },
            },
        );

        self.tools.insert(
            "analyze_dom",
            ToolEntry {
                description: "Analyze the current page's DOM structure",
                schema: schemars::schema_for!(AnalyzeDomArgs),
                handler: {
                    let tabs = tabs.clone();
                    let now = self.now.clone();
                    Box::new(move |raw, ctx| {
                        let tabs = tabs.clone();
                        let now = now.clone();
                        Box::pin(async move {
                            let args: AnalyzeDomArgs = serde_json::from_value(raw).map_err(|e| AdapterError::Engine(e.to_string()))?;
                            let project_id = resolve_project(args.project_id, &ctx, &tabs)?;
                            let tab_id = parse_tab_id(&args.tab_id)?;
                            tabs.acquire_control(project_id, tab_id, &now)?;
                            let analysis: DomAnalysis = tabs.analyze_dom(tab_id).await?;
                            Ok(vec![ToolContent::Text { text: serde_json::to_string(&analysis).unwrap_or_default() }])
                        })
                    })
                },
            },
        );

        self.tools.insert(
            "screenshot",
            ToolEntry {
                description: "Capture a PNG screenshot of the tab's viewport",
                schema: schemars::schema_for!(ScreenshotArgs),
                handler: {
                    let tabs = tabs.clone();
                    let now = self.now.clone();
                    Box::new(move |raw, ctx| {
                        let tabs = tabs.clone();
                        let now = now.clone();
                        Box::pin(async move {
                            let args: ScreenshotArgs = serde_json::from_value(raw).map_err(|e| AdapterError::Engine(e.to_string()))?;
                            let project_id = resolve_project(args.project_id, &ctx, &tabs)?;
                            let tab_id = parse_tab_id(&args.tab_id)?;
                            tabs.acquire_control(project_id, tab_id, &now)?;
                            let encoded = tabs.take_screenshot(tab_id).await?;
                            Ok(vec![ToolContent::Image { base64: encoded, mime_type: "image/png".to_string() }])
                        })
                    })
                },
            },
        );

        self.tools.insert(
            "console",
            ToolEntry {
                description: "Read, clear, or execute in the tab's devtools console",
                schema: schemars::schema_for!(ConsoleArgs),
                handler: {
                    let tabs = tabs.clone();
                    let now = self.now.clone();
                    Box::new(move |raw, ctx| {
                        let tabs = tabs.clone();
                        let now = now.clone();
                        Box::pin(async move {
                            let args: ConsoleArgs = serde_json::from_value(raw).map_err(|e| AdapterError::Engine(e.to_string()))?;
                            let project_id = resolve_project(args.project_id, &ctx, &tabs)?;
                            let tab_id = parse_tab_id(&args.tab_id)?;
                            tabs.acquire_control(project_id, tab_id, &now)?;
                            match args.mode {
                                ConsoleMode::Get => {
                                    let lines = tabs.console_get(project_id, tab_id)?;
                                    Ok(vec![ToolContent::Text { text: lines.join("\n") }])
                                }
                                ConsoleMode::Clear => {
                                    tabs.console_clear(project_id, tab_id)?;
                                    Ok(vec![ToolContent::Text { text: "cleared".to_string() }])
                                }
                                ConsoleMode::Execute => {
                                    let script = args.script.ok_or_else(|| AdapterError::Engine("console execute requires script".to_string()))?;
                                    let result = tabs.console_execute(project_id, tab_id, &script).await?;
                                    Ok(vec![ToolContent::Text { text: result.to_string() }])
                                }
                            }
                        })
                    })
                },
            },
        );
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    pub fn tool_schema(&self, name: &str) -> Option<(&'static str, &schemars::schema::RootSchema)> {
        self.tools.get(name).map(|entry| (entry.description, &entry.schema))
    }

    /// In-process transport: calls the handler directly.
    pub async fn call(&self, name: &str, args: Value, ctx: McpContext) -> Result<Vec<ToolContent>, AdapterError> {
        let entry = self.tools.get(name).ok_or_else(|| AdapterError::Engine(format!("unknown tool {name}")))?;
        (entry.handler)(args, ctx).await
    }

    /// Child-process stdio transport: one `{"tool": ..., "args": ...}`
    /// JSON request per line in, one `{"ok": bool, "content"/"error": ...}`
    /// JSON response per line out.
    pub async fn serve_stdio<R, W>(&self, mut input: R, mut output: W) -> Result<(), AdapterError>
    where
        R: tokio::io::AsyncRead + Unpin,
        W: tokio::io::AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(&mut input).lines();
        while let Some(line) = lines.next_line().await.map_err(AdapterError::Io)? {
            if line.trim().is_empty() {
                continue;
            }
            let response = self.handle_stdio_line(&line).await;
            let serialized = serde_json::to_string(&response).unwrap_or_else(|_| "{\"ok\":false}".to_string());
            output.write_all(serialized.as_bytes()).await.map_err(AdapterError::Io)?;
            output.write_all(b"\n").await.map_err(AdapterError::Io)?;
        }
        Ok(())
    }

    async fn handle_stdio_line(&self, line: &str) -> StdioResponse {
        #[derive(Deserialize)]
        struct StdioRequest {
            tool: String,
            #[serde(default)]
            args: Value,
            #[serde(default)]
            project_id: Option<String>,
        }

        let request: StdioRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => return StdioResponse::Err { error: format!("malformed request: {e}") },
        };
        let ctx = McpContext {
            project_id: request.project_id.and_then(|id| id.parse().ok()),
        };
        match self.call(&request.tool, request.args, ctx).await {
            Ok(content) => StdioResponse::Ok { content },
            Err(e) => StdioResponse::Err { error: e.to_string() },
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum StdioResponse {
    Ok { content: Vec<ToolContent> },
    Err { error: String },
}

fn parse_tab_id(raw: &str) -> Result<BrowserTabId, AdapterError> {
    Ok(BrowserTabId::from(raw))
}

/// `explicit argument → MCP execution context → first available project
/// (warn)` per the dispatcher's project resolution order.
fn resolve_project<E: BrowserEngine + 'static>(
    explicit: Option<String>,
    ctx: &McpContext,
    tabs: &BrowserTabManager<E>,
) -> Result<ProjectId, AdapterError> {
    if let Some(raw) = explicit {
        return raw.parse().map_err(|_| AdapterError::ProjectNotFound(raw));
    }
    if let Some(project_id) = ctx.project_id {
        return Ok(project_id);
    }
    let fallback = tabs.any_known_project().ok_or(AdapterError::NoProjectAvailable)?;
    tracing::warn!(project_id = %fallback, "mcp tool call omitted project_id; falling back to first available project");
    Ok(fallback)
}

impl<E: BrowserEngine + 'static> BrowserTabManager<E> {
    /// Acquires MCP control of `tab_id`, or re-touches it if already held.
    pub fn acquire_control(&self, project_id: ProjectId, tab_id: BrowserTabId, now: &Arc<dyn Fn() -> String + Send + Sync>) -> Result<(), AdapterError> {
        let acquired = self.with_control(project_id, |control| control.try_acquire(tab_id, now()))?;
        if acquired {
            Ok(())
        } else {
            Err(AdapterError::ControlHeld)
        }
    }

    fn any_known_project(&self) -> Option<ProjectId> {
        self.first_project_with_tabs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::FakeBrowserEngine;
    use hearth_core::DeviceSize;

    fn clock() -> Arc<dyn Fn() -> String + Send + Sync> {
        Arc::new(|| "2026-01-01T00:00:00Z".to_string())
    }

    #[tokio::test]
    async fn tool_table_registers_the_declared_tool_set() {
        let engine = Arc::new(FakeBrowserEngine::default());
        let tabs = Arc::new(BrowserTabManager::new(engine, clock()));
        let dispatcher = McpDispatcher::new(tabs, clock());
        let mut names = dispatcher.tool_names();
        names.sort_unstable();
        assert_eq!(names, vec!["actions", "analyze_dom", "console", "navigate", "screenshot", "tabs"]);
    }

    #[tokio::test]
    async fn falls_back_to_first_known_project_when_omitted() {
        let engine = Arc::new(FakeBrowserEngine::default());
        let tabs = Arc::new(BrowserTabManager::new(engine, clock()));
        let project_id = ProjectId::new();
        tabs.open_tab(project_id, None, DeviceSize::Laptop, None).await.unwrap();

        let dispatcher = McpDispatcher::new(tabs, clock());
        let content = dispatcher.call("tabs", serde_json::json!({}), McpContext::default()).await.unwrap();
        assert_eq!(content.len(), 1);
    }
}
