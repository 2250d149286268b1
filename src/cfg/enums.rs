// SPDX-License-Identifier: GPL-3.0-or-later

use core::fmt;

use serde::{Deserialize, Serialize};

/// Block cipher used to encrypt a credential's inner structure (§4.1).
///
/// The numeric encoding is stable across releases: it is written to the
/// wire and must never be renumbered.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MungeCipher {
    None,
    Default,
    Blowfish,
    Cast5,
    Aes128,
    Aes256,
}

impl MungeCipher {
    pub fn from_wire(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::None,
            1 => Self::Default,
            2 => Self::Blowfish,
            3 => Self::Cast5,
            4 => Self::Aes128,
            5 => Self::Aes256,
            _ => return None,
        })
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Default => 1,
            Self::Blowfish => 2,
            Self::Cast5 => 3,
            Self::Aes128 => 4,
            Self::Aes256 => 5,
        }
    }

    /// Resolve `Default` to the concrete cipher the daemon actually uses.
    pub fn resolve(self) -> Self {
        match self {
            Self::Default => Self::Aes128,
            other => other,
        }
    }

    pub fn block_size(self) -> usize {
        match self.resolve() {
            Self::Blowfish | Self::Cast5 => 8,
            Self::Aes128 | Self::Aes256 => 16,
            Self::None | Self::Default => 0,
        }
    }

    pub fn iv_size(self) -> usize {
        self.block_size()
    }

    pub fn key_size(self) -> usize {
        match self.resolve() {
            Self::Blowfish | Self::Cast5 | Self::Aes128 => 16,
            Self::Aes256 => 32,
            Self::None | Self::Default => 0,
        }
    }
}

impl fmt::Display for MungeCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Default => "default",
            Self::Blowfish => "blowfish",
            Self::Cast5 => "cast5",
            Self::Aes128 => "aes128",
            Self::Aes256 => "aes256",
        })
    }
}

/// Keyed message-authentication-code algorithm used to seal a credential (§4.1).
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MungeMac {
    None,
    Default,
    Md5,
    Sha1,
    Ripemd160,
    Sha256,
}

impl MungeMac {
    pub fn from_wire(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::None,
            1 => Self::Default,
            2 => Self::Md5,
            3 => Self::Sha1,
            4 => Self::Ripemd160,
            5 => Self::Sha256,
            _ => return None,
        })
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Default => 1,
            Self::Md5 => 2,
            Self::Sha1 => 3,
            Self::Ripemd160 => 4,
            Self::Sha256 => 5,
        }
    }

    pub fn resolve(self) -> Self {
        match self {
            Self::Default => Self::Sha256,
            other => other,
        }
    }

    pub fn output_size(self) -> usize {
        match self.resolve() {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Ripemd160 => 20,
            Self::Sha256 => 32,
            Self::None | Self::Default => 0,
        }
    }
}

impl fmt::Display for MungeMac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Default => "default",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Ripemd160 => "ripemd160",
            Self::Sha256 => "sha256",
        })
    }
}

/// Payload compressor applied before encryption (§4.1).
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MungeZip {
    None,
    Default,
    Bzlib,
    Zlib,
}

impl MungeZip {
    pub fn from_wire(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::None,
            1 => Self::Default,
            2 => Self::Bzlib,
            3 => Self::Zlib,
            _ => return None,
        })
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Default => 1,
            Self::Bzlib => 2,
            Self::Zlib => 3,
        }
    }

    pub fn resolve(self) -> Self {
        match self {
            Self::Default => Self::None,
            other => other,
        }
    }
}

impl fmt::Display for MungeZip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Default => "default",
            Self::Bzlib => "bzlib",
            Self::Zlib => "zlib",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cipher_roundtrips_through_wire_encoding() {
        for c in [
            MungeCipher::None,
            MungeCipher::Default,
            MungeCipher::Blowfish,
            MungeCipher::Cast5,
            MungeCipher::Aes128,
            MungeCipher::Aes256,
        ] {
            assert_eq!(MungeCipher::from_wire(c.to_wire()), Some(c));
        }
    }

    #[test]
    fn mac_default_resolves_to_a_named_mac() {
        assert_eq!(MungeMac::Default.resolve(), MungeMac::Sha256);
        assert_ne!(MungeMac::Default.resolve(), MungeMac::None);
    }

    #[test]
    fn zip_default_resolves_to_none() {
        assert_eq!(MungeZip::Default.resolve(), MungeZip::None);
    }
}
