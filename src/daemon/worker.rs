// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One worker's handling of one accepted connection (§4.5 worker loop,
//! §5 cancellation/timeouts): read one framed request, authenticate the
//! peer, dispatch, write one framed reply, close.

use std::{os::unix::io::AsRawFd, sync::Arc};

use tokio::net::UnixStream;
use tracing::{debug, warn};

use crate::{
    auth::{PeerIdentity, fd_passing, peercred},
    daemon::{decode, encode, state::Daemon},
    error::MungeError,
    wire::frame::{MsgType, read_frame, write_frame},
};

/// Handle exactly one request on `stream`, enforcing the configured
/// per-request wall-clock deadline over the whole exchange.
pub async fn handle_connection(daemon: Arc<Daemon>, stream: UnixStream) {
    let deadline = daemon.config.listener.request_deadline;
    match tokio::time::timeout(deadline, serve(&daemon, stream)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "request failed"),
        Err(_) => warn!(?deadline, "request exceeded its deadline; connection dropped"),
    }
}

async fn serve(daemon: &Daemon, mut stream: UnixStream) -> Result<(), MungeError> {
    let peer = authenticate_peer(daemon, &mut stream).await?;
    let frame = read_frame(&mut stream).await?;

    let (msg_type, body, fingerprint) = match frame.msg_type {
        MsgType::EncodeRequest => {
            (MsgType::EncodeResponse, encode::handle_encode(daemon, peer, &frame.body), None)
        }
        MsgType::DecodeRequest => {
            let (resp, fingerprint) = decode::handle_decode(daemon, peer, &frame.body);
            (MsgType::DecodeResponse, resp, fingerprint)
        }
        MsgType::EncodeResponse | MsgType::DecodeResponse => return Err(MungeError::BadArg),
    };

    write_frame(&mut stream, msg_type, &body).await?;

    // Only commit the reservation once the reply has actually reached the
    // client: a write failure here leaves the entry `Reserved`, so a retry
    // (flags & 0x1) still sees its own prior attempt instead of bouncing
    // off a false replay.
    if let Some(fp) = fingerprint {
        daemon.replay.commit(&fp);
    }

    Ok(())
}

/// §4.4: prefer `SO_PEERCRED`; fall back to the fd-passing handshake
/// only when the kernel doesn't support it.
async fn authenticate_peer(daemon: &Daemon, stream: &mut UnixStream) -> Result<PeerIdentity, MungeError> {
    if let Ok(id) = peercred::peer_credentials(stream) {
        return Ok(id);
    }
    fallback_authenticate(daemon, stream).await
}

async fn fallback_authenticate(daemon: &Daemon, stream: &mut UnixStream) -> Result<PeerIdentity, MungeError> {
    let raw_fd = stream.as_raw_fd();
    let server_dir = daemon.config.paths.auth_server_dir.clone();
    let client_dir = daemon.config.paths.auth_client_dir.clone();
    // fd_passing's handshake uses blocking syscalls directly on the
    // connection's raw descriptor; run it off the async executor so it
    // cannot stall other workers.
    tokio::task::spawn_blocking(move || {
        fd_passing::authenticate_server_side(raw_fd, &server_dir, &client_dir)
    })
    .await
    .map_err(|_| MungeError::Snafu)?
}
