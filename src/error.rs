// SPDX-License-Identifier: GPL-3.0-or-later

//! Stable error taxonomy shared by the wire protocol, the CLI exit status,
//! and the daemon's logging (§7). Every variant carries a fixed numeric
//! code; never renumber an existing one.

use thiserror::Error;

/// A MUNGE outcome, as it travels on the wire (`status` field of
/// ENCODE_RESPONSE / DECODE_RESPONSE) and as the client's process exit code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MungeError {
    #[error("success")]
    Success = 0,
    #[error("internal error")]
    Snafu = 1,
    #[error("invalid argument")]
    BadArg = 2,
    #[error("invalid length")]
    BadLength = 3,
    #[error("buffer overflow")]
    Overflow = 4,
    #[error("out of memory")]
    NoMemory = 5,
    #[error("socket error")]
    Socket = 6,
    #[error("timeout")]
    Timeout = 7,
    #[error("malformed credential")]
    BadCred = 8,
    #[error("invalid credential")]
    InvalidCred = 9,
    #[error("expired credential")]
    ExpiredCred = 10,
    #[error("rewound credential")]
    RewoundCred = 11,
    #[error("replayed credential")]
    ReplayedCred = 12,
    #[error("uid mismatch")]
    UidMismatch = 13,
    #[error("gid mismatch")]
    GidMismatch = 14,
    #[error("peer authentication failed")]
    AuthFailure = 15,
}

impl MungeError {
    pub fn to_wire(self) -> u32 {
        self as u32
    }

    pub fn from_wire(v: u32) -> Self {
        match v {
            0 => Self::Success,
            2 => Self::BadArg,
            3 => Self::BadLength,
            4 => Self::Overflow,
            5 => Self::NoMemory,
            6 => Self::Socket,
            7 => Self::Timeout,
            8 => Self::BadCred,
            9 => Self::InvalidCred,
            10 => Self::ExpiredCred,
            11 => Self::RewoundCred,
            12 => Self::ReplayedCred,
            13 => Self::UidMismatch,
            14 => Self::GidMismatch,
            15 => Self::AuthFailure,
            _ => Self::Snafu,
        }
    }

    /// Process exit status, matching the wire code one-for-one.
    pub fn exit_code(self) -> i32 {
        self.to_wire() as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Errors internal to the crypto layer collapse to a single uniform
/// outcome (§4.1, §7): an unknown enumeration, unavailable backend, bad
/// padding, or MAC mismatch must all look identical to a caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cryptographic operation failed")]
pub struct CryptoError;

impl From<CryptoError> for MungeError {
    fn from(_: CryptoError) -> Self {
        MungeError::InvalidCred
    }
}
