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
        payload: b"replay-me".to_vec(),
    };
    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let resp = conn.encode(&req).await.unwrap();
    assert!(resp.status.is_success());
    resp.credential
}

/// §8 scenario S2 and property 4: a credential decoded successfully once
/// is reported as replayed on every subsequent decode.
#[tokio::test]
async fn s2_second_decode_is_replayed() {
    let harness = Harness::start(|_| {}).await;
    let cred = mint(&harness).await;

    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let first = conn.decode(&cred, false).await.unwrap();
    assert!(first.status.is_success());

    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let second = conn.decode(&cred, false).await.unwrap();
    assert_eq!(second.status, MungeError::ReplayedCred);

    harness.shutdown().await;
}

/// §8 property 8: of `K` parallel decodes of the same credential, exactly
/// one succeeds and the rest are reported as replays.
#[tokio::test]
async fn property_8_concurrent_decodes_yield_exactly_one_success() {
    let harness = Harness::start(|_| {}).await;
    let cred = mint(&harness).await;

    const K: usize = 8;
    let mut tasks = Vec::with_capacity(K);
    for _ in 0..K {
        let socket_path = harness.socket_path.clone();
        let cred = cred.clone();
        tasks.push(tokio::spawn(async move {
            let conn = Connection::connect(&socket_path).await.unwrap();
            conn.decode(&cred, false).await.unwrap().status
        }));
    }

    let mut successes = 0;
    let mut replays = 0;
    for t in tasks {
        match t.await.unwrap() {
            MungeError::Success => successes += 1,
            MungeError::ReplayedCred => replays += 1,
            other => panic!("unexpected status {other:?}"),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(replays, K - 1);

    harness.shutdown().await;
}
