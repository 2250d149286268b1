// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    io::{Read, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use munge_core::{
    cfg::{
        cli::MungeArgs,
        config::ClientConfig,
        defaults::{DEFAULT_TTL_SECS, MAXIMUM_TTL_SECS, RESTRICTION_ANY},
        enums::{MungeCipher, MungeMac, MungeZip},
    },
    client::connection::{Connection, EncodeRequest, with_xfer_retries},
    error::MungeError,
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = MungeArgs::parse();

    if args.list_ciphers {
        for c in [MungeCipher::None, MungeCipher::Default, MungeCipher::Blowfish, MungeCipher::Cast5, MungeCipher::Aes128, MungeCipher::Aes256] {
            println!("{c}");
        }
        return ExitCode::SUCCESS;
    }
    if args.list_macs {
        for m in [MungeMac::None, MungeMac::Default, MungeMac::Md5, MungeMac::Sha1, MungeMac::Ripemd160, MungeMac::Sha256] {
            println!("{m}");
        }
        return ExitCode::SUCCESS;
    }
    if args.list_zips {
        for z in [MungeZip::None, MungeZip::Default, MungeZip::Bzlib, MungeZip::Zlib] {
            println!("{z}");
        }
        return ExitCode::SUCCESS;
    }
    if args.list_defaults {
        println!("cipher: {}", MungeCipher::Default);
        println!("mac: {}", MungeMac::Default);
        println!("zip: {}", MungeZip::Default);
        println!("ttl: {DEFAULT_TTL_SECS} (max {MAXIMUM_TTL_SECS})");
        println!("socket: {}", socket_path(&args).display());
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("munge: {e:#}");
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(e: &anyhow::Error) -> ExitCode {
    match e.downcast_ref::<MungeError>() {
        Some(status) => ExitCode::from(status.exit_code() as u8),
        None => ExitCode::from(MungeError::Snafu.exit_code() as u8),
    }
}

fn socket_path(args: &MungeArgs) -> PathBuf {
    args.socket
        .clone()
        .unwrap_or_else(|| PathBuf::from(ClientConfig::default().socket_path))
}

async fn run(args: MungeArgs) -> Result<()> {
    let payload = read_payload(&args)?;
    let socket = socket_path(&args);

    let req = EncodeRequest {
        cipher: args.cipher.unwrap_or(MungeCipher::Default),
        mac: args.mac.unwrap_or(MungeMac::Default),
        zip: args.zip.unwrap_or(MungeZip::Default),
        ttl: args.ttl.map(|t| t as i32).unwrap_or(0),
        uid_restriction: args.restrict_uid.unwrap_or(RESTRICTION_ANY),
        gid_restriction: args.restrict_gid.unwrap_or(RESTRICTION_ANY),
        payload,
    };

    let resp = with_xfer_retries(|_retry_permitted| {
        let socket = socket.clone();
        let req = req.clone();
        async move {
            let conn = Connection::connect(&socket).await?;
            conn.encode(&req).await
        }
    })
    .await
    .context("encode request failed")?;

    if !resp.status.is_success() {
        return Err(resp.status.into());
    }

    write_credential(&args, &resp.credential)
}

fn read_payload(args: &MungeArgs) -> Result<Vec<u8>> {
    if let Some(s) = &args.string {
        return Ok(s.as_bytes().to_vec());
    }
    if let Some(path) = &args.input {
        return std::fs::read(path).with_context(|| format!("failed to read {}", path.display()));
    }
    if args.no_input {
        return Ok(Vec::new());
    }
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("failed to read payload from stdin")?;
    Ok(buf)
}

fn write_credential(args: &MungeArgs, credential: &str) -> Result<()> {
    match &args.output {
        Some(path) => {
            std::fs::write(path, credential).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{credential}").context("failed to write credential to stdout")
        }
    }
}
