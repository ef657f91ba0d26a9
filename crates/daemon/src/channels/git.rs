// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `git:*` channels over the Git Service (§4.11, C11). Each handler builds
//! a fresh [`GitService`](hearth_shell::GitService) from the request's
//! `repo_path` — the service is a stateless shell-out wrapper, so there is
//! nothing to cache across calls.

use std::path::PathBuf;
use std::sync::Arc;

use hearth_core::WireError;
use hearth_wire::ChannelRegistry;
use serde::Deserialize;

use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoParams {
    repo_path: PathBuf,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathsParams {
    repo_path: PathBuf,
    paths: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitParams {
    repo_path: PathBuf,
    message: String,
    #[serde(default)]
    amend: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiffParams {
    repo_path: PathBuf,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiffCommitParams {
    repo_path: PathBuf,
    commit: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiffRangeParams {
    repo_path: PathBuf,
    from: String,
    to: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogParams {
    repo_path: PathBuf,
    #[serde(default = "default_log_limit")]
    limit: u32,
}

fn default_log_limit() -> u32 {
    50
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AheadBehindParams {
    repo_path: PathBuf,
    local: String,
    upstream: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteParams {
    repo_path: PathBuf,
    remote: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushParams {
    repo_path: PathBuf,
    #[serde(default)]
    force_with_lease: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StashSaveParams {
    repo_path: PathBuf,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeParams {
    repo_path: PathBuf,
    branch: String,
}

macro_rules! simple_repo_channel {
    ($registry:expr, $state:expr, $channel:literal, $method:ident) => {{
        let s = $state.clone();
        $registry.on($channel, move |params: RepoParams| {
            let s = s.clone();
            async move { s.git_service(params.repo_path).$method().await.map_err(WireError::from) }
        });
    }};
}

pub fn register(registry: &mut ChannelRegistry, state: Arc<AppState>) {
    simple_repo_channel!(registry, state, "git:status", status);
    simple_repo_channel!(registry, state, "git:branches", branches);
    simple_repo_channel!(registry, state, "git:remotes", remotes);
    simple_repo_channel!(registry, state, "git:stash-list", stash_list);
    simple_repo_channel!(registry, state, "git:stash-pop", stash_pop);
    simple_repo_channel!(registry, state, "git:stash-drop", stash_drop);
    simple_repo_channel!(registry, state, "git:tags", tags);
    simple_repo_channel!(registry, state, "git:pull", pull);

    let s = state.clone();
    registry.on("git:stage", move |p: PathsParams| {
        let s = s.clone();
        async move {
            let refs: Vec<&str> = p.paths.iter().map(String::as_str).collect();
            s.git_service(p.repo_path).stage(&refs).await.map_err(WireError::from)
        }
    });

    let s = state.clone();
    registry.on("git:unstage", move |p: PathsParams| {
        let s = s.clone();
        async move {
            let refs: Vec<&str> = p.paths.iter().map(String::as_str).collect();
            s.git_service(p.repo_path).unstage(&refs).await.map_err(WireError::from)
        }
    });

    let s = state.clone();
    registry.on("git:discard", move |p: PathsParams| {
        let s = s.clone();
        async move {
            let refs: Vec<&str> = p.paths.iter().map(String::as_str).collect();
            s.git_service(p.repo_path).discard(&refs).await.map_err(WireError::from)
        }
    });

    let s = state.clone();
    registry.on("git:commit", move |p: CommitParams| {
        let s = s.clone();
        async move { s.git_service(p.repo_path).commit(&p.message, p.amend).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("git:diff-unstaged", move |p: DiffParams| {
        let s = s.clone();
        async move { s.git_service(p.repo_path).diff_unstaged(p.path.as_deref()).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("git:diff-staged", move |p: DiffParams| {
        let s = s.clone();
        async move { s.git_service(p.repo_path).diff_staged(p.path.as_deref()).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("git:diff-commit", move |p: DiffCommitParams| {
        let s = s.clone();
        async move { s.git_service(p.repo_path).diff_commit(&p.commit).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("git:diff-range", move |p: DiffRangeParams| {
        let s = s.clone();
        async move { s.git_service(p.repo_path).diff_range(&p.from, &p.to).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("git:log", move |p: LogParams| {
        let s = s.clone();
        async move { s.git_service(p.repo_path).log(p.limit).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("git:ahead-behind", move |p: AheadBehindParams| {
        let s = s.clone();
        async move { s.git_service(p.repo_path).ahead_behind(&p.local, &p.upstream).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("git:fetch", move |p: RemoteParams| {
        let s = s.clone();
        async move { s.git_service(p.repo_path).fetch(&p.remote).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("git:push", move |p: PushParams| {
        let s = s.clone();
        async move { s.git_service(p.repo_path).push(p.force_with_lease).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("git:stash-save", move |p: StashSaveParams| {
        let s = s.clone();
        async move { s.git_service(p.repo_path).stash_save(p.message.as_deref()).await.map_err(WireError::from) }
    });

    let s = state.clone();
    registry.on("git:merge", move |p: MergeParams| {
        let s = s.clone();
        async move { s.git_service(p.repo_path).merge(&p.branch).await.map_err(WireError::from) }
    });
}
