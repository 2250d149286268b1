// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Client-side connection to a running daemon's request socket (§4.5, §6).
//! Used by both the `munge` CLI and anything embedding this library as a
//! credential client.

use std::{future::Future, path::Path, time::Duration};

use anyhow::{Context, Result, bail};
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;

use crate::{
    cfg::{
        defaults::{SOCKET_XFER_USLEEP, SOCKET_XFER_ATTEMPTS},
        enums::{MungeCipher, MungeMac, MungeZip},
    },
    client::common::io_with_timeout,
    error::MungeError,
    wire::frame::{Frame, MsgType, read_frame, write_frame},
};

const IO_TIMEOUT: Duration = Duration::from_secs(10);

/// Fields a caller supplies to encode a fresh credential.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub cipher: MungeCipher,
    pub mac: MungeMac,
    pub zip: MungeZip,
    /// Raw CLI/wire TTL semantics: `0` = daemon default, negative = the
    /// daemon's configured maximum, positive = an explicit TTL in seconds.
    pub ttl: i32,
    pub uid_restriction: u32,
    pub gid_restriction: u32,
    pub payload: Vec<u8>,
}

/// What the daemon handed back for an encode.
#[derive(Debug, Clone)]
pub struct EncodeResponse {
    pub status: MungeError,
    pub credential: String,
}

/// What the daemon handed back for a decode.
#[derive(Debug, Clone)]
pub struct DecodeResponse {
    pub status: MungeError,
    pub uid: u32,
    pub gid: u32,
    pub encode_time: u32,
    pub ttl: u32,
    pub cipher: MungeCipher,
    pub mac: MungeMac,
    pub zip: MungeZip,
    pub uid_restriction: u32,
    pub gid_restriction: u32,
    pub payload: Vec<u8>,
}

/// A connection to the daemon's socket, good for exactly one
/// request/response transaction (§4.5 worker loop: "at most one request
/// per connection").
pub struct Connection {
    stream: UnixStream,
    cancel: CancellationToken,
}

impl Connection {
    pub async fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path)
            .await
            .with_context(|| format!("failed to connect to {}", socket_path.display()))?;
        Ok(Self {
            stream,
            cancel: CancellationToken::new(),
        })
    }

    pub async fn encode(mut self, req: &EncodeRequest) -> Result<EncodeResponse> {
        let body = build_encode_request(req);
        write_frame(&mut self.stream, MsgType::EncodeRequest, &body)
            .await
            .context("failed to send encode request")?;
        let frame = io_with_timeout(
            "encode response",
            read_frame(&mut self.stream),
            IO_TIMEOUT,
            &self.cancel,
        )
        .await?;
        if frame.msg_type != MsgType::EncodeResponse {
            bail!("unexpected reply type from daemon");
        }
        parse_encode_response(&frame)
    }

    pub async fn decode(mut self, credential: &str, retry_permitted: bool) -> Result<DecodeResponse> {
        let body = build_decode_request(credential, retry_permitted);
        write_frame(&mut self.stream, MsgType::DecodeRequest, &body)
            .await
            .context("failed to send decode request")?;
        let frame = io_with_timeout(
            "decode response",
            read_frame(&mut self.stream),
            IO_TIMEOUT,
            &self.cancel,
        )
        .await?;
        if frame.msg_type != MsgType::DecodeResponse {
            bail!("unexpected reply type from daemon");
        }
        parse_decode_response(&frame)
    }
}

fn build_encode_request(req: &EncodeRequest) -> Vec<u8> {
    let mut body = Vec::with_capacity(15 + req.payload.len());
    body.push(req.cipher.to_wire());
    body.push(req.mac.to_wire());
    body.push(req.zip.to_wire());
    body.extend_from_slice(&req.ttl.to_be_bytes());
    body.extend_from_slice(&req.uid_restriction.to_be_bytes());
    body.extend_from_slice(&req.gid_restriction.to_be_bytes());
    body.extend_from_slice(&(req.payload.len() as u32).to_be_bytes());
    body.extend_from_slice(&req.payload);
    body
}

fn build_decode_request(credential: &str, retry_permitted: bool) -> Vec<u8> {
    let cred_bytes = credential.as_bytes();
    let mut body = Vec::with_capacity(5 + cred_bytes.len());
    body.extend_from_slice(&(cred_bytes.len() as u32).to_be_bytes());
    body.extend_from_slice(cred_bytes);
    body.push(if retry_permitted { 1 } else { 0 });
    body
}

fn parse_encode_response(frame: &Frame) -> Result<EncodeResponse> {
    let b = &frame.body;
    if b.len() < 8 {
        bail!("encode response too short");
    }
    let status = MungeError::from_wire(u32::from_be_bytes(b[0..4].try_into()?));
    let cred_len = u32::from_be_bytes(b[4..8].try_into()?) as usize;
    let cred_bytes = b
        .get(8..8 + cred_len)
        .ok_or_else(|| anyhow::anyhow!("encode response truncated"))?;
    let credential = String::from_utf8(cred_bytes.to_vec()).context("credential is not valid UTF-8")?;
    Ok(EncodeResponse { status, credential })
}

fn parse_decode_response(frame: &Frame) -> Result<DecodeResponse> {
    let b = &frame.body;
    if b.len() < 35 {
        bail!("decode response too short");
    }
    let status = MungeError::from_wire(u32::from_be_bytes(b[0..4].try_into()?));
    let uid = u32::from_be_bytes(b[4..8].try_into()?);
    let gid = u32::from_be_bytes(b[8..12].try_into()?);
    let encode_time = u32::from_be_bytes(b[12..16].try_into()?);
    let ttl = u32::from_be_bytes(b[16..20].try_into()?);
    let cipher = MungeCipher::from_wire(b[20]).ok_or_else(|| anyhow::anyhow!("bad cipher byte"))?;
    let mac = MungeMac::from_wire(b[21]).ok_or_else(|| anyhow::anyhow!("bad mac byte"))?;
    let zip = MungeZip::from_wire(b[22]).ok_or_else(|| anyhow::anyhow!("bad zip byte"))?;
    let uid_restriction = u32::from_be_bytes(b[23..27].try_into()?);
    let gid_restriction = u32::from_be_bytes(b[27..31].try_into()?);
    let payload_len = u32::from_be_bytes(b[31..35].try_into()?) as usize;
    let payload = b
        .get(35..35 + payload_len)
        .ok_or_else(|| anyhow::anyhow!("decode response truncated"))?
        .to_vec();
    Ok(DecodeResponse {
        status,
        uid,
        gid,
        encode_time,
        ttl,
        cipher,
        mac,
        zip,
        uid_restriction,
        gid_restriction,
        payload,
    })
}

/// Run `attempt` up to `SOCKET_XFER_ATTEMPTS` times, sleeping a linearly
/// increasing back-off between tries (§4.5 client retry contract).
pub async fn with_xfer_retries<F, Fut, T>(mut attempt: F) -> Result<T>
where
    F: FnMut(bool) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for n in 0..SOCKET_XFER_ATTEMPTS {
        let retry_permitted = n > 0;
        match attempt(retry_permitted).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_err = Some(e);
                tokio::time::sleep(Duration::from_micros(SOCKET_XFER_USLEEP * u64::from(n + 1))).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("exhausted transfer attempts")))
}
