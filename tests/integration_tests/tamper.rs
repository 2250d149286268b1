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

async fn mint(harness: &Harness) -> String {
    let req = EncodeRequest {
        cipher: MungeCipher::Aes128,
        mac: MungeMac::Sha256,
        zip: MungeZip::None,
        ttl: 60,
        uid_restriction: RESTRICTION_ANY,
        gid_restriction: RESTRICTION_ANY,
        payload: b"tamper-target".to_vec(),
    };
    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let resp = conn.encode(&req).await.unwrap();
    assert!(resp.status.is_success());
    resp.credential
}

fn flip_bit_at(cred: &str, index: usize) -> String {
    let mut bytes = cred.as_bytes().to_vec();
    bytes[index] ^= 0x01;
    String::from_utf8(bytes).unwrap()
}

/// §8 scenario S5 and property 2: flipping a single bit anywhere in the
/// base64 body turns a valid credential into `INVALID_CRED`.
#[tokio::test]
async fn s5_single_bit_flip_is_invalid_cred() {
    let harness = Harness::start(|_| {}).await;
    let cred = mint(&harness).await;

    let body_start = "MUNGE:".len();
    let tampered = flip_bit_at(&cred, body_start + 34);

    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let decoded = conn.decode(&tampered, false).await.unwrap();
    assert_eq!(decoded.status, MungeError::InvalidCred);

    harness.shutdown().await;
}

/// Property 3: a MAC-verification failure and a ciphertext/padding
/// failure are indistinguishable at the wire boundary — both collapse to
/// `INVALID_CRED`, never a code that would leak which layer rejected it.
#[tokio::test]
async fn mac_failure_and_ciphertext_failure_report_the_same_code() {
    let harness = Harness::start(|_| {}).await;
    let cred = mint(&harness).await;
    let body_start = "MUNGE:".len();
    let body_len = cred.trim_end_matches('\0').len() - body_start - 1;

    // Flip a byte near the end of the base64 body: lands in the trailing
    // MAC tag, so verification itself fails.
    let mac_tampered = flip_bit_at(&cred, body_start + body_len - 2);
    // Flip a byte well before the tag: lands in the ciphertext, so the
    // MAC still verifies over the (now-wrong) bytes and fails there too —
    // either way decode must not distinguish the two failure modes.
    let ciphertext_tampered = flip_bit_at(&cred, body_start + 10);

    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let a = conn.decode(&mac_tampered, false).await.unwrap();
    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let b = conn.decode(&ciphertext_tampered, false).await.unwrap();

    assert_eq!(a.status, MungeError::InvalidCred);
    assert_eq!(b.status, MungeError::InvalidCred);

    harness.shutdown().await;
}
