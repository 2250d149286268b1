// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! ENCODE_REQUEST -> ENCODE_RESPONSE (§6). The credential's uid/gid are
//! always the authenticated peer's identity, never caller-supplied.

use crate::{
    auth::PeerIdentity,
    cfg::defaults::RESTRICTION_ANY,
    daemon::state::Daemon,
    error::MungeError,
    wire::credential::{EncodeInput, encode_credential},
};

/// Resolve the wire TTL convention (`0` = default, negative = maximum,
/// positive = explicit, clamped to the configured maximum).
fn resolve_ttl(daemon: &Daemon, raw: i32) -> u32 {
    let policy = &daemon.config.policy;
    if raw == 0 {
        policy.default_ttl
    } else if raw < 0 {
        policy.maximum_ttl
    } else {
        (raw as u32).min(policy.maximum_ttl)
    }
}

/// Parse an ENCODE_REQUEST body, mint a credential, and return a fully
/// framed ENCODE_RESPONSE body.
pub fn handle_encode(daemon: &Daemon, peer: PeerIdentity, body: &[u8]) -> Vec<u8> {
    match try_encode(daemon, peer, body) {
        Ok(credential) => build_response(MungeError::Success, credential.as_bytes()),
        Err(e) => build_response(e, &[]),
    }
}

fn try_encode(daemon: &Daemon, peer: PeerIdentity, body: &[u8]) -> Result<String, MungeError> {
    if body.len() < 15 {
        return Err(MungeError::BadLength);
    }
    let cipher = crate::cfg::enums::MungeCipher::from_wire(body[0]).ok_or(MungeError::BadArg)?;
    let mac = crate::cfg::enums::MungeMac::from_wire(body[1]).ok_or(MungeError::BadArg)?;
    let zip = crate::cfg::enums::MungeZip::from_wire(body[2]).ok_or(MungeError::BadArg)?;
    let ttl_raw = i32::from_be_bytes(body[3..7].try_into().map_err(|_| MungeError::BadLength)?);
    let uid_restriction = u32::from_be_bytes(body[7..11].try_into().map_err(|_| MungeError::BadLength)?);
    let gid_restriction = u32::from_be_bytes(body[11..15].try_into().map_err(|_| MungeError::BadLength)?);
    let payload_len =
        u32::from_be_bytes(body.get(15..19).ok_or(MungeError::BadLength)?.try_into().map_err(|_| MungeError::BadLength)?)
            as usize;
    let payload = body.get(19..19 + payload_len).ok_or(MungeError::BadLength)?.to_vec();

    let cipher = if cipher == crate::cfg::enums::MungeCipher::Default {
        daemon.config.policy.default_cipher
    } else {
        cipher
    };
    let mac = if mac == crate::cfg::enums::MungeMac::Default {
        daemon.config.policy.default_mac
    } else {
        mac
    };
    let zip = if zip == crate::cfg::enums::MungeZip::Default {
        daemon.config.policy.default_zip
    } else {
        zip
    };
    let ttl = resolve_ttl(daemon, ttl_raw);

    let input = EncodeInput {
        cipher,
        mac,
        zip,
        realm: Vec::new(),
        uid: peer.uid,
        gid: peer.gid,
        ttl,
        uid_restriction,
        gid_restriction,
        payload,
    };
    let mut rng = rand::rng();
    encode_credential(input, &daemon.key, &mut rng)
}

fn build_response(status: MungeError, credential: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(8 + credential.len());
    body.extend_from_slice(&status.to_wire().to_be_bytes());
    body.extend_from_slice(&(credential.len() as u32).to_be_bytes());
    body.extend_from_slice(credential);
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{config::DaemonConfig, enums::{MungeCipher, MungeMac, MungeZip}};

    fn sample_body(payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.push(MungeCipher::Aes128.to_wire());
        body.push(MungeMac::Sha256.to_wire());
        body.push(MungeZip::None.to_wire());
        body.extend_from_slice(&0i32.to_be_bytes());
        body.extend_from_slice(&RESTRICTION_ANY.to_be_bytes());
        body.extend_from_slice(&RESTRICTION_ANY.to_be_bytes());
        body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        body.extend_from_slice(payload);
        body
    }

    #[test]
    fn well_formed_request_mints_a_credential() {
        let daemon = Daemon::new(DaemonConfig::default(), vec![0u8; 32]);
        let peer = PeerIdentity { uid: 1000, gid: 1000 };
        let resp = handle_encode(&daemon, peer, &sample_body(b"hi"));
        let status = u32::from_be_bytes(resp[0..4].try_into().unwrap());
        assert_eq!(status, MungeError::Success.to_wire());
        let cred_len = u32::from_be_bytes(resp[4..8].try_into().unwrap()) as usize;
        let cred = std::str::from_utf8(&resp[8..8 + cred_len]).unwrap();
        assert!(cred.starts_with("MUNGE:"));
    }

    #[test]
    fn truncated_request_reports_bad_length() {
        let daemon = Daemon::new(DaemonConfig::default(), vec![0u8; 32]);
        let peer = PeerIdentity { uid: 1000, gid: 1000 };
        let resp = handle_encode(&daemon, peer, &[0u8; 4]);
        let status = u32::from_be_bytes(resp[0..4].try_into().unwrap());
        assert_eq!(status, MungeError::BadLength.to_wire());
    }
}
