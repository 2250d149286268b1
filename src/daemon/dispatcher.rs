// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The acceptor loop and fixed worker pool (§4.5, §5): a single task
//! accepts connections and enqueues them onto a bounded channel; `N`
//! worker tasks drain it, each handling one connection at a time.

use std::sync::Arc;

use tokio::{net::UnixListener, sync::mpsc};
use tracing::{info, warn};

use crate::daemon::{state::Daemon, worker};

/// Depth of the queue between the acceptor and the worker pool. Bounded
/// so a burst of connections applies backpressure to `accept()` rather
/// than growing memory without limit.
const ACCEPT_QUEUE_DEPTH: usize = 64;

/// Run the acceptor loop and worker pool until `daemon.cancel` fires.
pub async fn run(daemon: Arc<Daemon>, listener: UnixListener) {
    let (tx, rx) = mpsc::channel(ACCEPT_QUEUE_DEPTH);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));

    let mut workers = Vec::with_capacity(daemon.config.listener.threads);
    for id in 0..daemon.config.listener.threads {
        let daemon = Arc::clone(&daemon);
        let rx = Arc::clone(&rx);
        workers.push(tokio::spawn(async move {
            worker_loop(id, daemon, rx).await;
        }));
    }

    let acceptor = {
        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move { accept_loop(daemon, listener, tx).await })
    };

    let _ = acceptor.await;
    for worker in workers {
        let _ = worker.await;
    }
}

async fn accept_loop(
    daemon: Arc<Daemon>,
    listener: UnixListener,
    tx: mpsc::Sender<tokio::net::UnixStream>,
) {
    loop {
        tokio::select! {
            _ = daemon.cancel.cancelled() => {
                info!("acceptor stopping");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        if tx.send(stream).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                }
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    daemon: Arc<Daemon>,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<tokio::net::UnixStream>>>,
) {
    loop {
        let stream = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = daemon.cancel.cancelled() => None,
                stream = rx.recv() => stream,
            }
        };
        let Some(stream) = stream else {
            info!(worker = id, "worker stopping");
            return;
        };
        worker::handle_connection(Arc::clone(&daemon), stream).await;
    }
}
