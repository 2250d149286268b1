// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use munge_core::{
    cfg::{
        defaults::RESTRICTION_ANY,
        enums::{MungeCipher, MungeMac, MungeZip},
    },
    client::connection::{Connection, EncodeRequest},
    error::MungeError,
};

use crate::integration_tests::common::Harness;

fn current_uid() -> u32 {
    // SAFETY: getuid takes no arguments and cannot fail.
    unsafe { libc::getuid() }
}

async fn mint_restricted(harness: &Harness, uid_restriction: u32) -> String {
    let req = EncodeRequest {
        cipher: MungeCipher::Aes128,
        mac: MungeMac::Sha256,
        zip: MungeZip::None,
        ttl: 60,
        uid_restriction,
        gid_restriction: RESTRICTION_ANY,
        payload: b"restricted".to_vec(),
    };
    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let resp = conn.encode(&req).await.unwrap();
    assert!(resp.status.is_success());
    resp.credential
}

/// §8 scenario S4 and property 6: a `uid_restriction` that does not match
/// the authenticated decoder (and no root override) is `UID_MISMATCH`.
#[tokio::test]
async fn s4_uid_restriction_mismatch_is_rejected() {
    let harness = Harness::start(|cfg| {
        cfg.policy.auth_root_allow = false;
    })
    .await;

    let foreign_uid = current_uid().wrapping_add(1);
    let cred = mint_restricted(&harness, foreign_uid).await;

    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let decoded = conn.decode(&cred, false).await.unwrap();
    assert_eq!(decoded.status, MungeError::UidMismatch);

    harness.shutdown().await;
}

/// Property 6, success branch: a `uid_restriction` matching the
/// decoder's authenticated UID succeeds.
#[tokio::test]
async fn matching_uid_restriction_succeeds() {
    let harness = Harness::start(|_| {}).await;
    let cred = mint_restricted(&harness, current_uid()).await;

    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let decoded = conn.decode(&cred, false).await.unwrap();
    assert!(decoded.status.is_success());

    harness.shutdown().await;
}

/// Root-override policy: when enabled, a UID-0 decoder bypasses a
/// mismatched restriction entirely.
#[tokio::test]
async fn root_override_bypasses_uid_mismatch_when_peer_is_root() {
    let harness = Harness::start(|cfg| {
        cfg.policy.auth_root_allow = true;
    })
    .await;

    let foreign_uid = current_uid().wrapping_add(1);
    let cred = mint_restricted(&harness, foreign_uid).await;

    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let decoded = conn.decode(&cred, false).await.unwrap();
    // Only actually bypasses when the real peer UID is 0; skip under a
    // non-root test runner rather than asserting a false pass/fail.
    if current_uid() == 0 {
        assert!(decoded.status.is_success());
    } else {
        assert_eq!(decoded.status, MungeError::UidMismatch);
    }

    harness.shutdown().await;
}
