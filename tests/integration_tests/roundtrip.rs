// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use munge_core::{
    cfg::{
        defaults::RESTRICTION_ANY,
        enums::{MungeCipher, MungeMac, MungeZip},
    },
    client::connection::{Connection, EncodeRequest},
};

use crate::integration_tests::common::Harness;

fn current_identity() -> (u32, u32) {
    // SAFETY: getuid/getgid take no arguments and cannot fail.
    unsafe { (libc::getuid(), libc::getgid()) }
}

/// §8 scenario S1 plus property 1 (round-trip): encode a payload over a
/// real daemon socket, decode it back, and check every recoverable field.
#[tokio::test]
async fn s1_encode_then_decode_recovers_payload_and_identity() {
    let harness = Harness::start(|_| {}).await;
    let (uid, gid) = current_identity();

    let req = EncodeRequest {
        cipher: MungeCipher::Aes128,
        mac: MungeMac::Sha1,
        zip: MungeZip::None,
        ttl: 300,
        uid_restriction: RESTRICTION_ANY,
        gid_restriction: RESTRICTION_ANY,
        payload: b"hello".to_vec(),
    };
    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let encoded = conn.encode(&req).await.unwrap();
    assert!(encoded.status.is_success());
    assert!(encoded.credential.starts_with("MUNGE:"));
    assert!(encoded.credential.trim_end().ends_with(':'));

    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let decoded = conn.decode(&encoded.credential, false).await.unwrap();
    assert!(decoded.status.is_success());
    assert_eq!(decoded.payload, b"hello");
    assert_eq!(decoded.uid, uid);
    assert_eq!(decoded.gid, gid);
    assert_eq!(decoded.ttl, 300);
    assert_eq!(decoded.cipher, MungeCipher::Aes128);
    assert_eq!(decoded.mac, MungeMac::Sha1);

    harness.shutdown().await;
}

/// §8 property 7: a payload that does not shrink under compression is
/// carried with `zip_type = NONE` rather than an inflated one.
#[tokio::test]
async fn incompressible_payload_round_trips_with_zip_none() {
    let harness = Harness::start(|_| {}).await;
    let payload: Vec<u8> = (0u8..=255).cycle().take(64).collect();

    let req = EncodeRequest {
        cipher: MungeCipher::Aes128,
        mac: MungeMac::Sha256,
        zip: MungeZip::Zlib,
        ttl: 60,
        uid_restriction: RESTRICTION_ANY,
        gid_restriction: RESTRICTION_ANY,
        payload: payload.clone(),
    };
    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let encoded = conn.encode(&req).await.unwrap();
    assert!(encoded.status.is_success());

    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let decoded = conn.decode(&encoded.credential, false).await.unwrap();
    assert!(decoded.status.is_success());
    assert_eq!(decoded.payload, payload);
    assert_eq!(decoded.zip, MungeZip::None);

    harness.shutdown().await;
}
