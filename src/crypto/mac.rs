//! Keyed message authentication over a credential's outer structure
//! (§4.1, §4.2 step 4). Verification always runs in constant time so a
//! forger cannot learn anything from how quickly a tag was rejected.

use hmac::{Hmac, Mac as _};
use md5::Md5;
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{cfg::enums::MungeMac, error::CryptoError};

enum Keyed {
    Md5(Hmac<Md5>),
    Sha1(Hmac<Sha1>),
    Ripemd160(Hmac<Ripemd160>),
    Sha256(Hmac<Sha256>),
}

/// A single-use MAC computation, analogous to the cipher's
/// init/update/final shape but without a distinct typestate: HMAC has no
/// padding step whose failure needs to be distinguished from "wrong key".
pub struct CredentialMac(Keyed);

impl CredentialMac {
    pub fn new(mac: MungeMac, key: &[u8]) -> Result<Self, CryptoError> {
        let keyed = match mac.resolve() {
            MungeMac::Md5 => Keyed::Md5(Hmac::new_from_slice(key).map_err(|_| CryptoError)?),
            MungeMac::Sha1 => Keyed::Sha1(Hmac::new_from_slice(key).map_err(|_| CryptoError)?),
            MungeMac::Ripemd160 => {
                Keyed::Ripemd160(Hmac::new_from_slice(key).map_err(|_| CryptoError)?)
            }
            MungeMac::Sha256 => Keyed::Sha256(Hmac::new_from_slice(key).map_err(|_| CryptoError)?),
            MungeMac::None | MungeMac::Default => return Err(CryptoError),
        };
        Ok(Self(keyed))
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.0 {
            Keyed::Md5(h) => h.update(data),
            Keyed::Sha1(h) => h.update(data),
            Keyed::Ripemd160(h) => h.update(data),
            Keyed::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self.0 {
            Keyed::Md5(h) => h.finalize().into_bytes().to_vec(),
            Keyed::Sha1(h) => h.finalize().into_bytes().to_vec(),
            Keyed::Ripemd160(h) => h.finalize().into_bytes().to_vec(),
            Keyed::Sha256(h) => h.finalize().into_bytes().to_vec(),
        }
    }
}

/// Compute a MAC tag over `data` in one call.
pub fn compute(mac: MungeMac, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut m = CredentialMac::new(mac, key)?;
    m.update(data);
    Ok(m.finalize())
}

/// Recompute the tag over `data` and compare it against `tag` in
/// constant time. Any mismatch — wrong key, tampered data, or truncated
/// tag — reports as the same [`CryptoError`].
pub fn verify(mac: MungeMac, key: &[u8], data: &[u8], tag: &[u8]) -> Result<(), CryptoError> {
    let expected = compute(mac, key, data)?;
    if expected.len() != tag.len() {
        return Err(CryptoError);
    }
    if expected.ct_eq(tag).into() {
        Ok(())
    } else {
        Err(CryptoError)
    }
}
