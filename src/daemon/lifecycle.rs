// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Startup and shutdown sequencing (§4.6).

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use tokio::net::{UnixListener, UnixStream};
use tracing::info;

use crate::{
    cfg::config::DaemonConfig,
    daemon::{dispatcher, group::GroupSnapshot, state::Daemon},
    replay,
    utils,
};

/// Run startup step (f): bind the listener, unlinking a stale socket
/// path only after confirming no live daemon is still holding it.
pub async fn bind_listener(socket_path: &Path) -> Result<UnixListener> {
    if socket_path.exists() {
        if UnixStream::connect(socket_path).await.is_ok() {
            anyhow::bail!(
                "a daemon is already listening on {}",
                socket_path.display()
            );
        }
        std::fs::remove_file(socket_path)
            .with_context(|| format!("failed to remove stale socket {}", socket_path.display()))?;
    }
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind {}", socket_path.display()))
}

/// Run the full startup sequence (§4.6 steps a-j) and return the
/// running daemon's handle plus the task driving its accept loop.
pub async fn start(config: DaemonConfig) -> Result<(Arc<Daemon>, tokio::task::JoinHandle<()>)> {
    let seed_path = Path::new(&config.paths.seed_file);
    utils::read_or_create_seed(seed_path, 32).context("failed to read or create PRNG seed file")?;

    let key_path = Path::new(&config.paths.key_file);
    let key = utils::load_key_file(key_path).context("failed to load symmetric key")?;

    let socket_path = Path::new(&config.paths.socket_name).to_path_buf();
    let listener = bind_listener(&socket_path)
        .await
        .context("failed to bind request socket")?;

    let pid_path = Path::new(&config.paths.pid_file).to_path_buf();
    utils::write_pidfile(&pid_path, std::process::id()).context("failed to write pidfile")?;

    let daemon = Daemon::new(config, key);

    spawn_group_refresh(Arc::clone(&daemon));
    spawn_replay_purge(Arc::clone(&daemon));

    let handle = {
        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move { dispatcher::run(daemon, listener).await })
    };

    info!(socket = %socket_path.display(), "munged ready");
    Ok((daemon, handle))
}

fn spawn_group_refresh(daemon: Arc<Daemon>) {
    let interval = daemon.config.listener.group_refresh_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = daemon.cancel.cancelled() => return,
                _ = ticker.tick() => {
                    let fresh = GroupSnapshot::rebuild();
                    daemon.group.store(Arc::new(fresh));
                }
            }
        }
    });
}

fn spawn_replay_purge(daemon: Arc<Daemon>) {
    let cache = Arc::clone(&daemon.replay);
    let cancel = daemon.cancel.clone();
    tokio::spawn(replay::run_purge_task(cache, cancel));
}

/// Shutdown (§4.6): stop accepting, let in-flight workers drain inside
/// `grace`, unlink the socket, remove the pidfile. The key buffer is
/// zeroed automatically when `daemon` (and its `Zeroizing<Vec<u8>>`)
/// drops.
pub async fn shutdown(
    daemon: Arc<Daemon>,
    dispatch_handle: tokio::task::JoinHandle<()>,
    grace: std::time::Duration,
) {
    daemon.cancel.cancel();
    if tokio::time::timeout(grace, dispatch_handle).await.is_err() {
        tracing::warn!("grace period elapsed before all workers finished");
    }
    let _ = std::fs::remove_file(&daemon.config.paths.socket_name);
    let _ = std::fs::remove_file(&daemon.config.paths.pid_file);
    info!("munged stopped");
}
