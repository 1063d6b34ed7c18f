// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `trd`: run the configured stages on a schedule until interrupted.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tr_daemon::{build_scheduler, env, logging, open_store, Config};

#[derive(Debug, Parser)]
#[command(name = "trd", version, about = "Recurring task runner daemon")]
struct Cli {
    /// Config file (defaults to $TR_CONFIG, then <state dir>/taskrun.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run once and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = env::config_path(cli.config)?;
    let config = Config::load(&path)?;
    let _guard = logging::init(&config.log)?;
    tracing::info!(config = %path.display(), name = %config.name, once = cli.once, "starting trd");

    let store = open_store(&config)?;
    let scheduler = build_scheduler(&config, Arc::new(store), cli.once)?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone()));

    let summary = scheduler.run(&cancel).await.context("scheduler stopped")?;
    tracing::info!(runs = summary.runs, failed_runs = summary.failed_runs, "trd stopped");
    Ok(())
}

async fn cancel_on_shutdown(cancel: CancellationToken) {
    shutdown_signal().await;
    tracing::info!("shutdown signal received");
    cancel.cancel();
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for SIGTERM");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c().await;
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
