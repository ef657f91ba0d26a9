// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tunnel Manager (§4.7, C7): lazily installs the tunnel binary, spawns
//! one tunnel per `(project, port)`, and reports progress as a stream of
//! stages, ending in `Connected{url}`.
//!
//! The actual tunnel binary is an external collaborator reached only
//! through the narrow [`TunnelBinary`] trait (install + spawn), the same
//! shape as the browser engine boundary in §4.8: production wiring shells
//! out to a real download/spawn, tests substitute an in-memory fake.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hearth_core::ProjectId;
use parking_lot::Mutex as SyncMutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::broadcast;

use crate::error::EngineError;

const URL_GENERATION_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelKey {
    pub project_id: ProjectId,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TunnelStage {
    CheckingBinary,
    DownloadingBinary,
    BinaryReady,
    StartingTunnel,
    GeneratingUrl,
    Connected,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TunnelProgress {
    pub key: TunnelKey,
    pub stage: TunnelStage,
    pub url: Option<String>,
}

/// Boundary to the real tunnel binary (install-on-first-use, then spawn).
#[async_trait]
pub trait TunnelBinary: Send + Sync {
    /// Ensures the binary is present on disk, downloading it if needed.
    /// The manager calls this at most once per process via its one-shot
    /// gate, so implementations don't need to debounce themselves.
    async fn ensure_installed(&self) -> Result<PathBuf, EngineError>;

    /// Spawns the tunnel process for `port`, stdout piped so the manager
    /// can scan it for the generated public URL.
    async fn spawn(&self, binary: &std::path::Path, port: u16) -> Result<Child, EngineError>;
}

/// Shells out to a configured install script, then to the installed
/// binary itself — mirroring the Git Service's "thin wrapper over a real
/// CLI" shape (§4.11).
pub struct ProcessTunnelBinary {
    binary_path: PathBuf,
    install_command: Option<(PathBuf, Vec<String>)>,
}

impl ProcessTunnelBinary {
    pub fn new(binary_path: impl Into<PathBuf>, install_command: Option<(PathBuf, Vec<String>)>) -> Self {
        Self { binary_path: binary_path.into(), install_command }
    }
}

#[async_trait]
impl TunnelBinary for ProcessTunnelBinary {
    async fn ensure_installed(&self) -> Result<PathBuf, EngineError> {
        if self.binary_path.exists() {
            return Ok(self.binary_path.clone());
        }
        let Some((program, args)) = &self.install_command else {
            return Err(EngineError::NotFound(format!(
                "tunnel binary missing at {} and no installer configured",
                self.binary_path.display()
            )));
        };
        let status = tokio::process::Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(EngineError::Io)?;
        if !status.success() || !self.binary_path.exists() {
            return Err(EngineError::PtySpawn("tunnel binary install failed".to_string()));
        }
        Ok(self.binary_path.clone())
    }

    async fn spawn(&self, binary: &std::path::Path, port: u16) -> Result<Child, EngineError> {
        tokio::process::Command::new(binary)
            .arg("--port")
            .arg(port.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(EngineError::Io)
    }
}

struct ActiveTunnel {
    child: SyncMutex<Child>,
    url: String,
    auto_stop: tokio::task::JoinHandle<()>,
}

/// Per-process supervisor for outbound tunnels, one per `(project, port)`.
pub struct TunnelManager {
    binary: Arc<dyn TunnelBinary>,
    installed: SyncMutex<bool>,
    auto_stop_after: Duration,
    tunnels: Arc<SyncMutex<HashMap<TunnelKey, ActiveTunnel>>>,
    progress: broadcast::Sender<TunnelProgress>,
}

impl TunnelManager {
    pub fn new(binary: Arc<dyn TunnelBinary>, auto_stop_after: Duration) -> Self {
        let (progress, _) = broadcast::channel(64);
        Self {
            binary,
            installed: SyncMutex::new(false),
            auto_stop_after,
            tunnels: Arc::new(SyncMutex::new(HashMap::new())),
            progress,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TunnelProgress> {
        self.progress.subscribe()
    }

    fn emit(&self, key: TunnelKey, stage: TunnelStage, url: Option<String>) {
        let _ = self.progress.send(TunnelProgress { key, stage, url });
    }

    /// Starts (or returns the existing) tunnel for `key`, returning its
    /// public URL once connected.
    pub async fn start(&self, key: TunnelKey) -> Result<String, EngineError> {
        if let Some(existing) = self.tunnels.lock().get(&key) {
            self.emit(key, TunnelStage::Connected, Some(existing.url.clone()));
            return Ok(existing.url.clone());
        }

        self.emit(key, TunnelStage::CheckingBinary, None);
        let already_installed = *self.installed.lock();
        let binary_path = if already_installed {
            self.binary.ensure_installed().await?
        } else {
            self.emit(key, TunnelStage::DownloadingBinary, None);
            let path = self.binary.ensure_installed().await?;
            *self.installed.lock() = true;
            self.emit(key, TunnelStage::BinaryReady, None);
            path
        };

        self.emit(key, TunnelStage::StartingTunnel, None);
        let mut child = self.binary.spawn(&binary_path, key.port).await?;
        let stdout = child.stdout.take().ok_or_else(|| EngineError::PtySpawn("tunnel produced no stdout".to_string()))?;

        self.emit(key, TunnelStage::GeneratingUrl, None);
        let url = match tokio::time::timeout(URL_GENERATION_TIMEOUT, read_url_line(stdout)).await {
            Ok(Ok(url)) => url,
            Ok(Err(err)) => {
                let _ = child.start_kill();
                return Err(err);
            }
            Err(_) => {
                let _ = child.start_kill();
                return Err(EngineError::Timeout);
            }
        };

        let tunnels = self.tunnels.clone();
        let auto_stop_after = self.auto_stop_after;
        let stop_key = key;
        let auto_stop = tokio::spawn(async move {
            tokio::time::sleep(auto_stop_after).await;
            if let Some(active) = tunnels.lock().remove(&stop_key) {
                let _ = active.child.lock().start_kill();
            }
        });

        self.tunnels.lock().insert(key, ActiveTunnel { child: SyncMutex::new(child), url: url.clone(), auto_stop });
        self.emit(key, TunnelStage::Connected, Some(url.clone()));
        Ok(url)
    }

    /// Stops the tunnel for `key`. A no-op (not an error) if it isn't
    /// running — stopping is idempotent per §4.7.
    pub fn stop(&self, key: TunnelKey) -> Result<(), EngineError> {
        if let Some(active) = self.tunnels.lock().remove(&key) {
            active.auto_stop.abort();
            active.child.lock().start_kill().map_err(EngineError::Io)?;
        }
        Ok(())
    }

    /// Kills every active tunnel, for process shutdown (§5).
    pub fn stop_all(&self) {
        let mut tunnels = self.tunnels.lock();
        for (_, active) in tunnels.drain() {
            active.auto_stop.abort();
            let _ = active.child.lock().start_kill();
        }
    }
}

async fn read_url_line(stdout: tokio::process::ChildStdout) -> Result<String, EngineError> {
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await.map_err(EngineError::Io)? {
        if let Some(start) = line.find("https://") {
            return Ok(line[start..].trim().to_string());
        }
    }
    Err(EngineError::PtySpawn("tunnel exited before printing a URL".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeTunnelBinary {
        ensure_calls: AtomicUsize,
    }

    #[async_trait]
    impl TunnelBinary for FakeTunnelBinary {
        async fn ensure_installed(&self) -> Result<PathBuf, EngineError> {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PathBuf::from("/bin/sh"))
        }

        async fn spawn(&self, _binary: &std::path::Path, _port: u16) -> Result<Child, EngineError> {
            // A real shell that prints a fake URL and then sleeps, standing
            // in for the tunnel binary's stdout contract.
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg("echo 'connected: https://example.tunnel.test'; sleep 30")
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
                .map_err(EngineError::Io)
        }
    }

    #[tokio::test]
    #[ignore = "spawns a real /bin/sh child, unavailable in some sandboxes"]
    async fn start_reports_progress_and_returns_the_parsed_url() {
        let binary = Arc::new(FakeTunnelBinary { ensure_calls: AtomicUsize::new(0) });
        let manager = TunnelManager::new(binary.clone(), Duration::from_secs(300));
        let mut progress = manager.subscribe();

        let key = TunnelKey { project_id: ProjectId::new(), port: 3000 };
        let url = manager.start(key).await.unwrap();
        assert_eq!(url, "https://example.tunnel.test");
        assert_eq!(binary.ensure_calls.load(Ordering::SeqCst), 1);

        let mut saw_connected = false;
        while let Ok(event) = progress.try_recv() {
            if event.stage == TunnelStage::Connected {
                saw_connected = true;
                assert_eq!(event.url.as_deref(), Some("https://example.tunnel.test"));
            }
        }
        assert!(saw_connected);

        manager.stop(key).unwrap();
        // Idempotent: stopping an already-stopped tunnel is not an error.
        manager.stop(key).unwrap();
    }

    #[test]
    fn stop_on_an_unknown_key_is_a_no_op() {
        let binary = Arc::new(FakeTunnelBinary { ensure_calls: AtomicUsize::new(0) });
        let manager = TunnelManager::new(binary, Duration::from_secs(300));
        let key = TunnelKey { project_id: ProjectId::new(), port: 4000 };
        manager.stop(key).unwrap();
    }
}
