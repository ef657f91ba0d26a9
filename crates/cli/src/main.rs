// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `app`: the daemon's sole bootstrap entry point. Sanitizes the process
//! environment before anything else runs, applies the layered config
//! resolver (defaults → `.env` → process environment → CLI flags), and
//! binds the listener without `SO_REUSEADDR` so a second instance on the
//! same port fails fast.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hearth_daemon::Config;
use hearth_engine::ProcessTunnelBinary;
use tracing_subscriber::EnvFilter;

/// The collaborative coding workspace daemon.
#[derive(Parser)]
#[command(name = "app", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Port to listen on (1024-65535).
    #[arg(long, value_parser = clap::value_parser!(u16).range(1024..=65535))]
    port: Option<u16>,

    /// Host/address to bind.
    #[arg(long)]
    host: Option<String>,
}

const DOTENV_PATH: &str = ".env";
const DOTENV_EXAMPLE_PATH: &str = ".env.example";

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    install_panic_hook();

    let dotenv_path = bootstrap_dotenv()?;

    let mut config = Config::load(dotenv_path).context("failed to resolve daemon configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(host) = cli.host {
        config.host = host;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), git_hash = env!("BUILD_GIT_HASH"), "hearth daemon starting");

    let tunnel_binary: Arc<dyn hearth_engine::TunnelBinary> =
        Arc::new(ProcessTunnelBinary::new(config.tunnel_binary_path.clone(), None));

    let runtime = tokio::runtime::Runtime::new().context("failed to start the async runtime")?;
    runtime.block_on(hearth_daemon::run(config, tunnel_binary)).context("daemon exited with an error")
}

/// Routes panics through `tracing` instead of the default stderr writer, so
/// a panic inside a spawned connection task shows up in the same log
/// stream as everything else instead of an unparented stderr line.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("{info}");
        default_hook(info);
    }));
}

/// Creates `.env` from `.env.example` on first run, then loads it into the
/// process environment (vars already set by the parent shell win, matching
/// the resolver's defaults-<-env-<-process precedence).
fn bootstrap_dotenv() -> Result<Option<std::path::PathBuf>> {
    let dotenv_path = Path::new(DOTENV_PATH);
    if !dotenv_path.exists() && Path::new(DOTENV_EXAMPLE_PATH).exists() {
        std::fs::copy(DOTENV_EXAMPLE_PATH, dotenv_path).context("failed to create .env from .env.example")?;
    }
    if !dotenv_path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(dotenv_path).context("failed to read .env")?;
    for (key, value) in hearth_shell::parse_dotenv(&contents) {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(key, value);
        }
    }
    Ok(Some(dotenv_path.to_path_buf()))
}
