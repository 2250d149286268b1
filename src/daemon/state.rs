// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `Daemon`: the single owned value holding every piece of process-wide
//! state (§9 design note — no globals, no `lazy_static`/`OnceCell`
//! singletons). Constructed once at startup and handed to the acceptor
//! and worker tasks behind an `Arc`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use zeroize::Zeroizing;

use crate::{
    cfg::config::DaemonConfig,
    daemon::group::{SharedSnapshot, new_shared},
    replay::ReplayCache,
};

/// Everything a request worker needs to serve one connection.
pub struct Daemon {
    pub config: DaemonConfig,
    /// The shared symmetric key. Wrapped so its backing buffer is
    /// zeroed the moment the daemon (and therefore this value) drops
    /// (§4.6 shutdown step "zeroize the key buffer").
    pub key: Zeroizing<Vec<u8>>,
    pub replay: Arc<ReplayCache>,
    pub group: Arc<SharedSnapshot>,
    pub cancel: CancellationToken,
}

impl Daemon {
    pub fn new(config: DaemonConfig, key: Vec<u8>) -> Arc<Self> {
        let replay = Arc::new(ReplayCache::new(config.listener.replay_soft_ceiling));
        let group = Arc::new(new_shared());
        Arc::new(Self {
            config,
            key: Zeroizing::new(key),
            replay,
            group,
            cancel: CancellationToken::new(),
        })
    }
}
