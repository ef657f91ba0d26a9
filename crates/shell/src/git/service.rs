// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin shell-out layer over the `git` CLI (§4.11, C11). Every command is
//! independently retriable and never mutates in-memory state; results are
//! parsed fresh from porcelain output on each call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use super::error::GitError;
use super::parse::{self, FileStatus, LogRecord};

/// Default timeout for most git commands.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Longer timeout for network operations.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(60);

/// Ahead/behind counts for a local branch against its upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AheadBehind {
    pub ahead: u32,
    pub behind: u32,
}

pub struct GitService {
    repo_path: PathBuf,
    env: HashMap<String, String>,
}

impl GitService {
    pub fn new(repo_path: impl Into<PathBuf>, env: HashMap<String, String>) -> Self {
        Self { repo_path: repo_path.into(), env }
    }

    async fn run(&self, args: &[&str], timeout_dur: Duration) -> Result<String, GitError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_path)
            .args(args)
            .env_clear()
            .envs(&self.env)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LANG", "en_US.UTF-8")
            .env("LC_ALL", "en_US.UTF-8")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = timeout(timeout_dur, cmd.output())
            .await
            .map_err(|_| GitError::Timeout(timeout_dur))?
            .map_err(GitError::Spawn)?;

        if !output.status.success() {
            return Err(GitError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn run_bytes(&self, args: &[&str], timeout_dur: Duration) -> Result<Vec<u8>, GitError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.repo_path)
            .args(args)
            .env_clear()
            .envs(&self.env)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = timeout(timeout_dur, cmd.output())
            .await
            .map_err(|_| GitError::Timeout(timeout_dur))?
            .map_err(GitError::Spawn)?;

        if !output.status.success() {
            return Err(GitError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output.stdout)
    }

    pub async fn status(&self) -> Result<Vec<FileStatus>, GitError> {
        let raw = self.run_bytes(&["status", "--porcelain=v1", "-z"], DEFAULT_TIMEOUT).await?;
        Ok(parse::parse_status_z(&raw))
    }

    pub async fn stage(&self, paths: &[&str]) -> Result<(), GitError> {
        let mut args = vec!["add", "--"];
        args.extend(paths);
        self.run(&args, DEFAULT_TIMEOUT).await?;
        Ok(())
    }

    /// Unstages `paths`. Falls back to `rm --cached` when there is no HEAD
    /// yet (the very first commit), since `git reset HEAD --` fails there.
    pub async fn unstage(&self, paths: &[&str]) -> Result<(), GitError> {
        let mut args = vec!["reset", "HEAD", "--"];
        args.extend(paths);
        match self.run(&args, DEFAULT_TIMEOUT).await {
            Ok(_) => Ok(()),
            Err(GitError::Failed { stderr, .. }) if stderr.contains("ambiguous argument 'HEAD'") => {
                let mut fallback = vec!["rm", "--cached", "--"];
                fallback.extend(paths);
                self.run(&fallback, DEFAULT_TIMEOUT).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn discard(&self, paths: &[&str]) -> Result<(), GitError> {
        let mut args = vec!["checkout", "--", ];
        args.extend(paths);
        self.run(&args, DEFAULT_TIMEOUT).await?;
        Ok(())
    }

    pub async fn commit(&self, message: &str, amend: bool) -> Result<(), GitError> {
        let mut args = vec!["commit", "-m", message];
        if amend {
            args.push("--amend");
        }
        self.run(&args, DEFAULT_TIMEOUT).await?;
        Ok(())
    }

    pub async fn diff_unstaged(&self, path: Option<&str>) -> Result<String, GitError> {
        let mut args = vec!["diff"];
        if let Some(p) = path {
            args.push("--");
            args.push(p);
        }
        self.run(&args, DEFAULT_TIMEOUT).await
    }

    pub async fn diff_staged(&self, path: Option<&str>) -> Result<String, GitError> {
        let mut args = vec!["diff", "--cached"];
        if let Some(p) = path {
            args.push("--");
            args.push(p);
        }
        self.run(&args, DEFAULT_TIMEOUT).await
    }

    pub async fn diff_commit(&self, commit: &str) -> Result<String, GitError> {
        self.run(&["show", commit], DEFAULT_TIMEOUT).await
    }

    pub async fn diff_range(&self, from: &str, to: &str) -> Result<String, GitError> {
        self.run(&["diff", &format!("{from}..{to}")], DEFAULT_TIMEOUT).await
    }

    pub async fn log(&self, limit: u32) -> Result<Vec<LogRecord>, GitError> {
        let limit_arg = format!("-{limit}");
        let format_arg = format!("--pretty=format:{}\0", parse::LOG_FORMAT);
        let raw = self.run(&["log", &limit_arg, &format_arg], DEFAULT_TIMEOUT).await?;
        Ok(parse::parse_log(&raw))
    }

    pub async fn ahead_behind(&self, local: &str, upstream: &str) -> Result<AheadBehind, GitError> {
        let range = format!("{local}...{upstream}");
        let raw = self
            .run(&["rev-list", "--left-right", "--count", &range], DEFAULT_TIMEOUT)
            .await?;
        let (ahead, behind) = parse::parse_ahead_behind(&raw)
            .ok_or_else(|| GitError::Parse(format!("unexpected rev-list output: {raw:?}")))?;
        Ok(AheadBehind { ahead, behind })
    }

    pub async fn branches(&self) -> Result<Vec<String>, GitError> {
        let raw = self.run(&["branch", "--format=%(refname:short)"], DEFAULT_TIMEOUT).await?;
        Ok(raw.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
    }

    pub async fn remotes(&self) -> Result<Vec<String>, GitError> {
        let raw = self.run(&["remote"], DEFAULT_TIMEOUT).await?;
        Ok(raw.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
    }

    pub async fn fetch(&self, remote: &str) -> Result<(), GitError> {
        self.run(&["fetch", remote], NETWORK_TIMEOUT).await?;
        Ok(())
    }

    pub async fn pull(&self) -> Result<(), GitError> {
        self.run(&["pull"], NETWORK_TIMEOUT).await?;
        Ok(())
    }

    pub async fn push(&self, force_with_lease: bool) -> Result<(), GitError> {
        let mut args = vec!["push"];
        if force_with_lease {
            args.push("--force-with-lease");
        }
        self.run(&args, NETWORK_TIMEOUT).await?;
        Ok(())
    }

    pub async fn stash_list(&self) -> Result<Vec<String>, GitError> {
        let raw = self.run(&["stash", "list"], DEFAULT_TIMEOUT).await?;
        Ok(raw.lines().map(str::to_string).collect())
    }

    pub async fn stash_save(&self, message: Option<&str>) -> Result<(), GitError> {
        let mut args = vec!["stash", "push"];
        if let Some(m) = message {
            args.push("-m");
            args.push(m);
        }
        self.run(&args, DEFAULT_TIMEOUT).await?;
        Ok(())
    }

    pub async fn stash_pop(&self) -> Result<(), GitError> {
        self.run(&["stash", "pop"], DEFAULT_TIMEOUT).await?;
        Ok(())
    }

    pub async fn stash_drop(&self) -> Result<(), GitError> {
        self.run(&["stash", "drop"], DEFAULT_TIMEOUT).await?;
        Ok(())
    }

    pub async fn tags(&self) -> Result<Vec<String>, GitError> {
        let raw = self.run(&["tag", "--list"], DEFAULT_TIMEOUT).await?;
        Ok(raw.lines().map(str::to_string).collect())
    }

    pub async fn merge(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["merge", branch], DEFAULT_TIMEOUT).await?;
        Ok(())
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::process::Command::new("git").args(["init", "-q"]).current_dir(dir.path()).status().unwrap();
        std::process::Command::new("git")
            .args(["config", "user.email", "demo@example.com"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        std::process::Command::new("git")
            .args(["config", "user.name", "Demo"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        dir
    }

    #[tokio::test]
    #[ignore = "requires a git binary on PATH"]
    async fn status_reports_untracked_file() {
        let dir = init_repo();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let service = GitService::new(dir.path(), HashMap::new());
        let status = service.status().await.unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].path, "a.txt");
    }

    #[tokio::test]
    #[ignore = "requires a git binary on PATH"]
    async fn commit_then_log_round_trips_subject() {
        let dir = init_repo();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let service = GitService::new(dir.path(), HashMap::new());
        service.stage(&["a.txt"]).await.unwrap();
        service.commit("initial commit", false).await.unwrap();

        let log = service.log(10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].subject, "initial commit");
    }
}
