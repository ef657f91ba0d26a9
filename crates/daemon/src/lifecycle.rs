// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, startup, shutdown.
//!
//! Unlike a job-runner daemon there is no on-disk WAL/snapshot of daemon
//! state to replay — `InMemoryDb` starts empty every run and the durable
//! state lives in the blob/tree/terminal-cache stores, which are opened
//! lazily by the subsystems that own them. Startup's job is therefore
//! narrower: resolve paths, build [`AppState`], and bind the listener
//! LAST, after every fallible step has already succeeded, so a bind
//! failure never leaves half-initialized state directories behind.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hearth_engine::TunnelBinary;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::channels::tunnel::spawn_progress_forwarder;
use crate::state::AppState;

/// Daemon configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. `~/.local/state/hearth`).
    pub state_dir: PathBuf,
    /// Address the WebSocket listener binds to.
    pub host: String,
    pub port: u16,
    /// Content-addressed blob store root (§4.2).
    pub blobs_path: PathBuf,
    /// Tree snapshot store root (§4.2).
    pub trees_path: PathBuf,
    /// On-disk terminal output cache root (§4.4).
    pub terminal_cache_path: PathBuf,
    /// Optional `.env`-format file whose keys are stripped from every
    /// shelled-out child's environment (§4.1).
    pub dotenv_path: Option<PathBuf>,
    /// How long an idle tunnel survives before the manager kills it
    /// (§4.7).
    pub tunnel_auto_stop_after: Duration,
    /// Where the tunnel binary is expected to live once installed.
    pub tunnel_binary_path: PathBuf,
}

impl Config {
    /// Resolves configuration from (in ascending precedence) built-in
    /// defaults, the process environment (already layered over `.env` by
    /// the caller — see `app`'s bootstrap), and finally the `dotenv_path`
    /// discovered by that same bootstrap. CLI flags are applied by the
    /// caller on top of the returned `Config`, last and therefore highest
    /// precedence.
    ///
    /// State directory resolution: `APPDATA_DIR` env var, else
    /// `$XDG_STATE_HOME/hearth`, else `~/.local/state/hearth`. One daemon
    /// serves every project for a user, matching the router's
    /// cross-project connection scoping (§4.6).
    pub fn load(dotenv_path: Option<PathBuf>) -> Result<Self, LifecycleError> {
        let state_dir = state_dir()?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = std::env::var("PORT").ok().and_then(|s| s.parse::<u16>().ok()).unwrap_or(9141);

        let tunnel_auto_stop_after = std::env::var("HEARTH_TUNNEL_AUTO_STOP_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(30 * 60));

        Ok(Self {
            blobs_path: state_dir.join("blobs"),
            trees_path: state_dir.join("trees"),
            terminal_cache_path: state_dir.join("terminal-cache"),
            tunnel_binary_path: state_dir.join("bin").join("hearth-tunnel"),
            dotenv_path,
            tunnel_auto_stop_after,
            host,
            port,
            state_dir,
        })
    }
}

/// Resolve `APPDATA_DIR` > `$XDG_STATE_HOME/hearth` > `~/.local/state/hearth`.
fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("APPDATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("hearth"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/hearth"))
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to bind {0}:{1}: {2}")]
    BindFailed(String, u16, std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a caller needs to run the accept loop: the bound listener
/// and the shared state every connection handler closes over.
pub struct StartupResult {
    pub state: Arc<AppState>,
    pub listener: TcpListener,
}

/// Brings up the daemon: resolves directories, builds [`AppState`], and
/// binds the listener as the final step.
pub async fn startup(config: &Config, tunnel_binary: Arc<dyn TunnelBinary>) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config, tunnel_binary).await {
        Ok(result) => Ok(result),
        Err(e) => {
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config, tunnel_binary: Arc<dyn TunnelBinary>) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.blobs_path)?;
    std::fs::create_dir_all(&config.trees_path)?;
    std::fs::create_dir_all(&config.terminal_cache_path)?;

    let state = AppState::build(config, tunnel_binary);
    spawn_progress_forwarder(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(config.host.clone(), config.port, e))?;

    info!(%addr, "daemon listening");
    Ok(StartupResult { state, listener })
}

/// Cleans up anything `startup_inner` may have created before the failing
/// step. There's no lock file or socket path to remove here — the
/// directories are safe to leave (the next attempt just reuses them) and
/// a bind failure means nothing was ever accepting connections.
fn cleanup_on_failure(_config: &Config) {}

/// Gracefully tears the daemon down: stop accepting new PTY/tunnel work
/// and kill everything in flight. Stream caches and blob/tree stores are
/// plain files and need no explicit flush.
pub fn shutdown(state: &AppState) {
    info!("shutting down");
    state.pty.kill_all_sync();
    state.tunnels.stop_all();
}
