// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! DECODE_REQUEST -> DECODE_RESPONSE (§6), including the identity
//! restriction check (§4.2 step 9) that `wire::credential` deliberately
//! leaves to the daemon: it needs the group snapshot and the
//! root-override policy, neither of which the wire layer depends on.

use crate::{
    auth::PeerIdentity,
    daemon::state::Daemon,
    error::MungeError,
    wire::credential::{decode_credential, is_unrestricted},
};

/// Parse a DECODE_REQUEST body, decode and restriction-check the
/// credential, and return a fully framed DECODE_RESPONSE body. Returns
/// the replay fingerprint to commit alongside the response, when the
/// decode itself succeeded (restriction failures still commit the
/// underlying credential as seen, since it genuinely was decoded).
pub fn handle_decode(daemon: &Daemon, peer: PeerIdentity, body: &[u8]) -> (Vec<u8>, Option<Vec<u8>>) {
    match try_decode(daemon, peer, body) {
        Ok((resp, fingerprint)) => (resp, Some(fingerprint)),
        Err(e) => (build_error_response(e), None),
    }
}

fn try_decode(
    daemon: &Daemon,
    peer: PeerIdentity,
    body: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), MungeError> {
    if body.len() < 5 {
        return Err(MungeError::BadLength);
    }
    let cred_len = u32::from_be_bytes(body[0..4].try_into().map_err(|_| MungeError::BadLength)?) as usize;
    let cred_bytes = body.get(4..4 + cred_len).ok_or(MungeError::BadLength)?;
    let flags = *body.get(4 + cred_len).ok_or(MungeError::BadLength)?;
    let retry_permitted = flags & 0x1 != 0;

    let credential = std::str::from_utf8(cred_bytes).map_err(|_| MungeError::BadCred)?;
    let decoded = decode_credential(
        credential,
        &daemon.key,
        &daemon.replay,
        daemon.config.policy.clock_skew_tolerance_secs,
        retry_permitted,
    )?;

    check_restriction(daemon, peer, decoded.uid_restriction, decoded.gid_restriction)?;

    let fingerprint = decoded.fingerprint.clone();
    Ok((build_success_response(&decoded), fingerprint))
}

/// §8 property 6: decode succeeds iff the authenticated peer's UID
/// matches `uid_restriction` and its (membership in) `gid_restriction`,
/// unless root override is configured and the peer is UID 0.
fn check_restriction(
    daemon: &Daemon,
    peer: PeerIdentity,
    uid_restriction: u32,
    gid_restriction: u32,
) -> Result<(), MungeError> {
    if daemon.config.policy.auth_root_allow && peer.uid == 0 {
        return Ok(());
    }
    if !is_unrestricted(uid_restriction) && peer.uid != uid_restriction {
        return Err(MungeError::UidMismatch);
    }
    if !is_unrestricted(gid_restriction) {
        let snapshot = daemon.group.load();
        if peer.gid != gid_restriction && !snapshot.is_member(gid_restriction, peer.uid) {
            return Err(MungeError::GidMismatch);
        }
    }
    Ok(())
}

fn build_success_response(decoded: &crate::wire::credential::DecodedCredential) -> Vec<u8> {
    let mut body = Vec::with_capacity(35 + decoded.payload.len());
    body.extend_from_slice(&MungeError::Success.to_wire().to_be_bytes());
    body.extend_from_slice(&decoded.uid.to_be_bytes());
    body.extend_from_slice(&decoded.gid.to_be_bytes());
    body.extend_from_slice(&decoded.encode_time.to_be_bytes());
    body.extend_from_slice(&decoded.ttl.to_be_bytes());
    body.push(decoded.cipher.to_wire());
    body.push(decoded.mac.to_wire());
    body.push(decoded.zip.to_wire());
    body.extend_from_slice(&decoded.uid_restriction.to_be_bytes());
    body.extend_from_slice(&decoded.gid_restriction.to_be_bytes());
    body.extend_from_slice(&(decoded.payload.len() as u32).to_be_bytes());
    body.extend_from_slice(&decoded.payload);
    body
}

fn build_error_response(status: MungeError) -> Vec<u8> {
    let mut body = vec![0u8; 35];
    body[0..4].copy_from_slice(&status.to_wire().to_be_bytes());
    body
}
