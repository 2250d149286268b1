// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use munge_core::{
    cfg::{
        defaults::RESTRICTION_ANY,
        enums::{MungeCipher, MungeMac, MungeZip},
    },
    client::connection::{Connection, EncodeRequest},
    error::MungeError,
};

use crate::integration_tests::common::Harness;

/// §8 scenario S3 and property 5: a credential decoded after
/// `ttl + clock_skew_tolerance` has elapsed is reported expired, on its
/// very first decode (so this is never confused with a replay).
#[tokio::test]
async fn s3_decode_past_ttl_plus_skew_is_expired() {
    let harness = Harness::start(|cfg| {
        cfg.policy.clock_skew_tolerance_secs = 1;
    })
    .await;

    let req = EncodeRequest {
        cipher: MungeCipher::Aes128,
        mac: MungeMac::Sha256,
        zip: MungeZip::None,
        ttl: 1,
        uid_restriction: RESTRICTION_ANY,
        gid_restriction: RESTRICTION_ANY,
        payload: b"short-lived".to_vec(),
    };
    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let encoded = conn.encode(&req).await.unwrap();
    assert!(encoded.status.is_success());

    // ttl(1) + skew(1) elapses well inside this sleep; the replay cache
    // has never seen this fingerprint, so the rejection can only be
    // attributed to expiry, not replay.
    tokio::time::sleep(Duration::from_secs(3)).await;

    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let decoded = conn.decode(&encoded.credential, false).await.unwrap();
    assert_eq!(decoded.status, MungeError::ExpiredCred);

    harness.shutdown().await;
}

/// A credential decoded comfortably inside its TTL still succeeds.
#[tokio::test]
async fn decode_within_ttl_window_succeeds() {
    let harness = Harness::start(|_| {}).await;

    let req = EncodeRequest {
        cipher: MungeCipher::Aes128,
        mac: MungeMac::Sha256,
        zip: MungeZip::None,
        ttl: 60,
        uid_restriction: RESTRICTION_ANY,
        gid_restriction: RESTRICTION_ANY,
        payload: b"still-fresh".to_vec(),
    };
    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let encoded = conn.encode(&req).await.unwrap();

    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let decoded = conn.decode(&encoded.credential, false).await.unwrap();
    assert!(decoded.status.is_success());

    harness.shutdown().await;
}
