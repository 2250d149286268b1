// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use munge_core::{
    cfg::{
        cli::{MungedArgs, resolve_config_path},
        config::DaemonConfig,
        logger::init_logger,
    },
    daemon::lifecycle,
};
use tracing::info;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_CONFIG_PATH: &str = "/etc/munge/munged.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = MungedArgs::parse();
    let config_path = args
        .config
        .as_deref()
        .and_then(|p| p.to_str())
        .unwrap_or(DEFAULT_CONFIG_PATH);

    let _init_logger = init_logger(config_path).ok();

    let cfg = resolve_config_path(config_path)
        .and_then(DaemonConfig::load_from_file)
        .context("failed to resolve or load munged configuration")?;

    let (daemon, dispatch_handle) = lifecycle::start(cfg)
        .await
        .context("munged startup failed")?;

    wait_for_shutdown_signal().await;
    info!("shutdown signal received");
    lifecycle::shutdown(daemon, dispatch_handle, SHUTDOWN_GRACE).await;

    Ok(())
}

async fn wait_for_shutdown_signal() {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(s) => s,
        Err(_) => return,
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
