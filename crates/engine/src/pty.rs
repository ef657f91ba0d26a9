// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY Session Manager (§4.4, C4). Spawns a real pseudo-terminal via
//! `portable-pty` so interactive programs see a proper TTY; a dedicated OS
//! thread performs the blocking reads and forwards chunks into the async
//! fan-out over a bounded channel, where a per-session flush task coalesces
//! bursts before incrementing `output_seq` and broadcasting to listeners.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use hearth_core::{PtySession, PtySessionId, PtySize, ProjectId};
use parking_lot::Mutex as SyncMutex;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize as NativePtySize};
use tokio::sync::{broadcast, mpsc};

use crate::error::EngineError;

/// A fanned-out event for one PTY session.
#[derive(Debug, Clone)]
pub enum PtyEvent {
    Output { seq: u64, data: String },
    Exit { code: i32 },
}

struct LivePty {
    session: SyncMutex<PtySession>,
    master: SyncMutex<Box<dyn MasterPty + Send>>,
    child: SyncMutex<Box<dyn Child + Send + Sync>>,
    events: broadcast::Sender<PtyEvent>,
    pending: SyncMutex<Vec<String>>,
}

/// Handle returned to callers registering interest in a session's output.
pub type PtySubscription = broadcast::Receiver<PtyEvent>;

/// Hook invoked on every flush, before fan-out, so the stream store can
/// persist output ahead of in-memory listeners seeing it (§4.4 step 2).
pub trait OutputSink: Send + Sync {
    fn on_output(&self, session_id: PtySessionId, seq: u64, data: &str);
    fn on_exit(&self, session_id: PtySessionId, code: i32);
}

pub struct PtyManager {
    sessions: SyncMutex<HashMap<PtySessionId, Arc<LivePty>>>,
    sink: Arc<dyn OutputSink>,
    now: Arc<dyn Fn() -> String + Send + Sync>,
}

impl PtyManager {
    pub fn new(sink: Arc<dyn OutputSink>, now: Arc<dyn Fn() -> String + Send + Sync>) -> Self {
        Self { sessions: SyncMutex::new(HashMap::new()), sink, now }
    }

    /// Creates a PTY session, or returns the existing one for `explicit_id`
    /// (idempotent reuse per §4.4).
    pub fn create(
        &self,
        explicit_id: Option<PtySessionId>,
        cwd: String,
        project_id: Option<ProjectId>,
        size: PtySize,
        env: HashMap<String, String>,
    ) -> Result<PtySessionId, EngineError> {
        if let Some(id) = explicit_id {
            if self.sessions.lock().contains_key(&id) {
                self.touch(id);
                return Ok(id);
            }
        }

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(NativePtySize { rows: size.rows, cols: size.cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| EngineError::PtySpawn(e.to_string()))?;

        let mut builder = default_shell_command();
        builder.cwd(&cwd);
        for (key, value) in &env {
            builder.env(key, value);
        }
        builder.env("TERM", "xterm-256color");
        builder.env("COLUMNS", size.cols.to_string());
        builder.env("LINES", size.rows.to_string());
        builder.env("LANG", "en_US.UTF-8");
        builder.env("LC_ALL", "en_US.UTF-8");

        let child =
            pair.slave.spawn_command(builder).map_err(|e| EngineError::PtySpawn(e.to_string()))?;
        drop(pair.slave);

        let now = (self.now)();
        let session = PtySession::new(cwd, project_id, size, now);
        let id = explicit_id.unwrap_or(session.id);

        let (events_tx, _) = broadcast::channel(256);
        let live = Arc::new(LivePty {
            session: SyncMutex::new(session),
            master: SyncMutex::new(pair.master),
            child: SyncMutex::new(child),
            events: events_tx,
            pending: SyncMutex::new(Vec::new()),
        });

        self.sessions.lock().insert(id, live.clone());
        self.spawn_reader(id, live.clone());
        self.prime_prompt(live);

        Ok(id)
    }

    /// After ~100ms, write a single `\r` to prime the shell prompt — many
    /// shells don't emit the first prompt until they see input or a tick.
    fn prime_prompt(&self, live: Arc<LivePty>) {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let mut master = live.master.lock();
            if let Ok(mut writer) = master.take_writer() {
                let _ = writer.write_all(b"\r");
            }
        });
    }

    /// Spawns the blocking OS-thread reader and its async flush consumer.
    fn spawn_reader(&self, id: PtySessionId, live: Arc<LivePty>) {
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<Vec<u8>>(64);
        let sink = self.sink.clone();

        let reader_master = live.clone();
        std::thread::spawn(move || {
            let mut reader = {
                let master = reader_master.master.lock();
                match master.try_clone_reader() {
                    Ok(r) => r,
                    Err(_) => return,
                }
            };
            let mut buf = [0u8; 8192];
            loop {
                match std::io::Read::read(&mut reader, &mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if chunk_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let flush_live = live.clone();
        tokio::spawn(async move {
            while let Some(bytes) = chunk_rx.recv().await {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                flush_live.pending.lock().push(text);
                flush(id, &flush_live, &sink);
            }
            // Reader closed: the shell exited. `wait()` blocks, so run it
            // off the async worker thread.
            let wait_live = flush_live.clone();
            let code = tokio::task::spawn_blocking(move || {
                wait_live.child.lock().wait().ok().map(|s| s.exit_code() as i32).unwrap_or(-1)
            })
            .await
            .unwrap_or(-1);
            flush_live.session.lock().mark_exited();
            sink.on_exit(id, code);
            let _ = flush_live.events.send(PtyEvent::Exit { code });
        });
    }

    pub fn subscribe(&self, id: PtySessionId) -> Result<PtySubscription, EngineError> {
        let sessions = self.sessions.lock();
        let live = sessions.get(&id).ok_or_else(|| EngineError::PtyNotFound(id.to_string()))?;
        Ok(live.events.subscribe())
    }

    pub fn write(&self, id: PtySessionId, data: &str) -> Result<(), EngineError> {
        let live = self.get(id)?;
        let mut master = live.master.lock();
        let mut writer =
            master.take_writer().map_err(|e| EngineError::PtySpawn(e.to_string()))?;
        writer.write_all(data.as_bytes()).map_err(EngineError::Io)?;
        live.session.lock().touch((self.now)());
        Ok(())
    }

    pub fn resize(&self, id: PtySessionId, size: PtySize) -> Result<(), EngineError> {
        let live = self.get(id)?;
        live.master
            .lock()
            .resize(NativePtySize { rows: size.rows, cols: size.cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| EngineError::PtySpawn(e.to_string()))?;
        live.session.lock().size = size;
        Ok(())
    }

    /// Kills the session. If `signal` is unspecified, sends `\x03` first and
    /// force-kills after one second if the process hasn't exited (§4.4).
    pub async fn kill(&self, id: PtySessionId, force: bool) -> Result<(), EngineError> {
        let live = self.get(id)?;
        if force {
            live.child.lock().kill().map_err(EngineError::Io)?;
            return Ok(());
        }

        if let Ok(mut writer) = live.master.lock().take_writer() {
            let _ = writer.write_all(b"\x03");
        }
        let live_for_wait = live.clone();
        let already_exited = tokio::task::spawn_blocking(move || {
            live_for_wait.child.lock().try_wait().ok().flatten().is_some()
        })
        .await
        .unwrap_or(false);

        if !already_exited {
            tokio::time::sleep(Duration::from_secs(1)).await;
            live.child.lock().kill().map_err(EngineError::Io)?;
        }
        Ok(())
    }

    fn touch(&self, id: PtySessionId) {
        if let Some(live) = self.sessions.lock().get(&id) {
            live.session.lock().touch((self.now)());
        }
    }

    fn get(&self, id: PtySessionId) -> Result<Arc<LivePty>, EngineError> {
        self.sessions
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::PtyNotFound(id.to_string()))
    }

    pub fn session(&self, id: PtySessionId) -> Result<PtySession, EngineError> {
        Ok(self.get(id)?.session.lock().clone())
    }

    pub fn remove(&self, id: PtySessionId) {
        self.sessions.lock().remove(&id);
    }

    /// Returns ids of sessions idle longer than the kill threshold, for the
    /// periodic sweep (§4.4) to act on.
    pub fn idle_session_ids(&self, now_epoch_ms: u64, last_activity_epoch_ms_of: impl Fn(&PtySession) -> u64) -> Vec<PtySessionId> {
        self.sessions
            .lock()
            .values()
            .filter_map(|live| {
                let session = live.session.lock();
                let last = last_activity_epoch_ms_of(&session);
                session.idle_for(now_epoch_ms, last).then_some(session.id)
            })
            .collect()
    }

    pub fn kill_all_sync(&self) {
        let sessions = self.sessions.lock();
        for live in sessions.values() {
            let _ = live.child.lock().kill();
        }
    }
}

/// Flushes pending chunks: drains `pending`, advances `output_seq` once
/// per flush, notifies the sink, then fans out to subscribers.
fn flush(id: PtySessionId, live: &LivePty, sink: &Arc<dyn OutputSink>) {
    let chunks: Vec<String> = std::mem::take(&mut *live.pending.lock());
    if chunks.is_empty() {
        return;
    }
    let combined = chunks.concat();
    let seq = live.session.lock().next_output_seq();
    sink.on_output(id, seq, &combined);
    // Best-effort: a lagging/absent subscriber must never stall the session.
    let _ = live.events.send(PtyEvent::Output { seq, data: combined });
}

#[cfg(unix)]
fn default_shell_command() -> CommandBuilder {
    let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
    CommandBuilder::new(shell)
}

#[cfg(windows)]
fn default_shell_command() -> CommandBuilder {
    let mut cmd = CommandBuilder::new("powershell.exe");
    cmd.arg("-NoLogo");
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct RecordingSink {
        outputs: SyncMutex<Vec<(PtySessionId, u64, String)>>,
        exits: AtomicI32,
    }

    impl OutputSink for RecordingSink {
        fn on_output(&self, session_id: PtySessionId, seq: u64, data: &str) {
            self.outputs.lock().push((session_id, seq, data.to_string()));
        }
        fn on_exit(&self, _session_id: PtySessionId, code: i32) {
            self.exits.store(code, Ordering::SeqCst);
        }
    }

    fn manager() -> (Arc<RecordingSink>, PtyManager) {
        let sink = Arc::new(RecordingSink { outputs: SyncMutex::new(Vec::new()), exits: AtomicI32::new(-999) });
        let manager = PtyManager::new(sink.clone(), Arc::new(|| "2026-01-01T00:00:00Z".to_string()));
        (sink, manager)
    }

    #[test]
    #[ignore = "requires a real PTY device, unavailable in some sandboxes"]
    fn create_spawns_a_shell_and_reuses_existing_id() {
        let (_, manager) = manager();
        let cwd = std::env::temp_dir().to_string_lossy().into_owned();
        let id = manager.create(None, cwd.clone(), None, PtySize::default(), HashMap::new()).unwrap();
        let reused = manager.create(Some(id), cwd, None, PtySize::default(), HashMap::new()).unwrap();
        assert_eq!(id, reused);
        manager.kill_all_sync();
    }

    #[tokio::test]
    #[ignore = "requires a real PTY device, unavailable in some sandboxes"]
    async fn write_then_output_round_trips_through_the_flush() {
        let (sink, manager) = manager();
        let cwd = std::env::temp_dir().to_string_lossy().into_owned();
        let id = manager.create(None, cwd, None, PtySize::default(), HashMap::new()).unwrap();
        let mut sub = manager.subscribe(id).unwrap();

        manager.write(id, "echo hello\n").unwrap();
        let event = tokio::time::timeout(Duration::from_secs(5), sub.recv()).await.unwrap().unwrap();
        match event {
            PtyEvent::Output { seq, .. } => assert!(seq >= 1),
            PtyEvent::Exit { .. } => panic!("unexpected exit before output"),
        }
        assert!(!sink.outputs.lock().is_empty());
        manager.kill_all_sync();
    }

    #[test]
    fn idle_session_ids_uses_the_injected_clock() {
        let (_, manager) = manager();
        // No live sessions: always empty, regardless of the clock.
        assert!(manager.idle_session_ids(u64::MAX, |s| s.output_seq).is_empty());
    }
}
