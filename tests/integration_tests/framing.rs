// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use munge_core::{
    cfg::{
        defaults::{MAXIMUM_REQ_LEN, RESTRICTION_ANY, WIRE_MAGIC, WIRE_VERSION},
        enums::{MungeCipher, MungeMac, MungeZip},
    },
    client::connection::{Connection, EncodeRequest},
};
use tokio::{io::AsyncWriteExt, net::UnixStream};

use crate::integration_tests::common::Harness;

/// §8 scenario S6, client side: a 2 MiB payload is rejected by the
/// client's own framing layer before a single byte reaches the socket.
#[tokio::test]
async fn s6_oversized_payload_is_rejected_before_it_is_sent() {
    let harness = Harness::start(|_| {}).await;

    let req = EncodeRequest {
        cipher: MungeCipher::Aes128,
        mac: MungeMac::Sha256,
        zip: MungeZip::None,
        ttl: 60,
        uid_restriction: RESTRICTION_ANY,
        gid_restriction: RESTRICTION_ANY,
        payload: vec![0u8; 2 * 1024 * 1024],
    };
    let conn = Connection::connect(&harness.socket_path).await.unwrap();
    let result = conn.encode(&req).await;
    assert!(result.is_err());

    harness.shutdown().await;
}

/// §8 scenario S6, server side: a frame header that declares a body
/// longer than `MAXIMUM_REQ_LEN` is rejected before the daemon reads any
/// body bytes, and the connection is dropped without a reply.
#[tokio::test]
async fn oversized_frame_header_closes_the_connection_without_a_reply() {
    let harness = Harness::start(|_| {}).await;

    let mut stream = UnixStream::connect(&harness.socket_path).await.unwrap();
    let mut header = Vec::with_capacity(10);
    header.extend_from_slice(&WIRE_MAGIC.to_be_bytes());
    header.push(WIRE_VERSION);
    header.push(0); // EncodeRequest
    header.extend_from_slice(&((MAXIMUM_REQ_LEN as u32) + 1).to_be_bytes());
    stream.write_all(&header).await.unwrap();
    stream.flush().await.unwrap();

    let mut reply = [0u8; 1];
    let n = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        tokio::io::AsyncReadExt::read(&mut stream, &mut reply),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(n, 0, "daemon must not write a reply to an oversized frame");

    harness.shutdown().await;
}
