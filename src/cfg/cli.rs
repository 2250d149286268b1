// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use crate::cfg::enums::{MungeCipher, MungeMac, MungeZip};

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}

/// Client-side encoder/decoder CLI (§6). Mirrors `munge.c`'s
/// `getopt_long` table one flag at a time.
#[derive(Parser, Debug)]
#[command(name = "munge", version, about = "Local credential encoder/decoder")]
pub struct MungeArgs {
    /// Do not read a payload from stdin.
    #[arg(short = 'n', long = "no-input")]
    pub no_input: bool,

    /// Use STRING as the payload instead of reading one.
    #[arg(short = 's', long = "string", value_name = "STRING")]
    pub string: Option<String>,

    /// Read the payload from FILE instead of stdin.
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Write the credential to FILE instead of stdout.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Cipher type used to encrypt the credential.
    #[arg(short = 'c', long = "cipher", value_name = "CIPHER")]
    pub cipher: Option<MungeCipher>,

    /// List supported ciphers and exit.
    #[arg(short = 'C', long = "list-ciphers")]
    pub list_ciphers: bool,

    /// Mac type used to authenticate the credential.
    #[arg(short = 'm', long = "mac", value_name = "MAC")]
    pub mac: Option<MungeMac>,

    /// List supported MACs and exit.
    #[arg(short = 'M', long = "list-macs")]
    pub list_macs: bool,

    /// Compression type applied to the payload.
    #[arg(short = 'z', long = "zip", value_name = "ZIP")]
    pub zip: Option<MungeZip>,

    /// List supported compression types and exit.
    #[arg(short = 'Z', long = "list-zips")]
    pub list_zips: bool,

    /// Restrict decoding to the given UID.
    #[arg(short = 'u', long = "restrict-uid", value_name = "UID")]
    pub restrict_uid: Option<u32>,

    /// Restrict decoding to the given GID.
    #[arg(short = 'g', long = "restrict-gid", value_name = "GID")]
    pub restrict_gid: Option<u32>,

    /// Time-to-live in seconds. 0 = daemon default, negative = maximum.
    #[arg(short = 't', long = "ttl", value_name = "SECONDS")]
    pub ttl: Option<i64>,

    /// Path to the local munged socket.
    #[arg(short = 'S', long = "socket", value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// List configured default values and exit.
    #[arg(short = 'L', long = "list-defaults")]
    pub list_defaults: bool,
}

/// `munged` daemon CLI: just enough to point at a config file and
/// control foreground/daemonized startup.
#[derive(Parser, Debug)]
#[command(name = "munged", version, about = "Local credential authentication daemon")]
pub struct MungedArgs {
    /// Path to the daemon's YAML configuration file.
    #[arg(short = 'f', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Stay in the foreground instead of daemonizing.
    #[arg(short = 'F', long = "foreground")]
    pub foreground: bool,
}

impl clap::ValueEnum for MungeCipher {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self::None,
            Self::Default,
            Self::Blowfish,
            Self::Cast5,
            Self::Aes128,
            Self::Aes256,
        ]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.to_string()))
    }
}

impl clap::ValueEnum for MungeMac {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self::None,
            Self::Default,
            Self::Md5,
            Self::Sha1,
            Self::Ripemd160,
            Self::Sha256,
        ]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.to_string()))
    }
}

impl clap::ValueEnum for MungeZip {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::None, Self::Default, Self::Bzlib, Self::Zlib]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.to_string()))
    }
}
