// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{os::unix::fs::PermissionsExt, sync::Arc, time::Duration};

use munge_core::{
    cfg::config::DaemonConfig,
    daemon::{lifecycle, state::Daemon},
};
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// A running daemon under test, plus the scratch directory it lives in.
/// Keep `_dir` alive for the harness's lifetime or the socket/key/pid
/// files disappear out from under the daemon.
pub struct Harness {
    pub daemon: Arc<Daemon>,
    pub socket_path: std::path::PathBuf,
    handle: JoinHandle<()>,
    _dir: TempDir,
}

impl Harness {
    /// Start a real daemon listening on a Unix socket inside a fresh
    /// temporary directory, with `configure` applied before startup.
    pub async fn start(configure: impl FnOnce(&mut DaemonConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let key_path = dir.path().join("munge.key");
        std::fs::write(&key_path, [7u8; 32]).unwrap();
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600)).unwrap();

        let mut config = DaemonConfig::default();
        config.paths.key_file = key_path.to_str().unwrap().to_string();
        config.paths.seed_file = dir.path().join("munge.seed").to_str().unwrap().to_string();
        config.paths.pid_file = dir.path().join("munged.pid").to_str().unwrap().to_string();
        config.paths.socket_name = dir.path().join("munge.socket").to_str().unwrap().to_string();
        config.listener.threads = 2;
        configure(&mut config);

        let socket_path = std::path::PathBuf::from(&config.paths.socket_name);
        let (daemon, handle) = lifecycle::start(config).await.unwrap();

        Self {
            daemon,
            socket_path,
            handle,
            _dir: dir,
        }
    }

    pub async fn shutdown(self) {
        lifecycle::shutdown(self.daemon, self.handle, Duration::from_secs(2)).await;
    }
}
