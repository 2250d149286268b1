//! Block ciphers in CBC mode with PKCS#7 padding (§4.1).
//!
//! Mirrors the shape of the upstream `cipher_init` / `cipher_update` /
//! `cipher_final` / `cipher_cleanup` calls, but the phases are distinct
//! Rust types instead of a mutable `finalized` flag: `finalize` consumes
//! the cipher, so calling it twice (or calling `update` afterward) is a
//! compile error rather than an assertion the caller could ignore.

use std::marker::PhantomData;

use aes::{Aes128, Aes256};
use blowfish::Blowfish;
use cast5::Cast5;
use cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use digest::Digest;
use generic_array::GenericArray;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{cfg::enums::MungeCipher, error::CryptoError};

/// Derive an exact-length cipher subkey from arbitrary-length key material
/// (§3 recommends a key of 64+ bytes, but `KeyInit::new_from_slice`
/// requires the slice to equal the cipher's key size exactly). Hashing with
/// SHA-256 and truncating to `cipher.key_size()` bytes mirrors upstream
/// MUNGE's use of a digest to turn the on-disk key into per-cipher key
/// material.
fn derive_cipher_key(cipher: MungeCipher, key: &[u8]) -> zeroize::Zeroizing<Vec<u8>> {
    let key_size = cipher.resolve().key_size();
    let mut hasher = Sha256::new();
    hasher.update(key);
    let digest = hasher.finalize();
    zeroize::Zeroizing::new(digest[..key_size].to_vec())
}

/// Direction a [`CbcCipher`] was opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

enum Backend {
    Blowfish(Box<Blowfish>),
    Cast5(Box<Cast5>),
    Aes128(Box<Aes128>),
    Aes256(Box<Aes256>),
}

impl Backend {
    fn new(cipher: MungeCipher, key: &[u8]) -> Result<Self, CryptoError> {
        let subkey = derive_cipher_key(cipher, key);
        match cipher.resolve() {
            MungeCipher::Blowfish => Ok(Self::Blowfish(Box::new(
                Blowfish::new_from_slice(&subkey).map_err(|_| CryptoError)?,
            ))),
            MungeCipher::Cast5 => Ok(Self::Cast5(Box::new(
                Cast5::new_from_slice(&subkey).map_err(|_| CryptoError)?,
            ))),
            MungeCipher::Aes128 => Ok(Self::Aes128(Box::new(
                Aes128::new_from_slice(&subkey).map_err(|_| CryptoError)?,
            ))),
            MungeCipher::Aes256 => Ok(Self::Aes256(Box::new(
                Aes256::new_from_slice(&subkey).map_err(|_| CryptoError)?,
            ))),
            MungeCipher::None | MungeCipher::Default => Err(CryptoError),
        }
    }

    fn block_size(&self) -> usize {
        match self {
            Self::Blowfish(_) | Self::Cast5(_) => 8,
            Self::Aes128(_) | Self::Aes256(_) => 16,
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        match self {
            Self::Blowfish(c) => encrypt_in_place(c.as_ref(), block),
            Self::Cast5(c) => encrypt_in_place(c.as_ref(), block),
            Self::Aes128(c) => encrypt_in_place(c.as_ref(), block),
            Self::Aes256(c) => encrypt_in_place(c.as_ref(), block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        match self {
            Self::Blowfish(c) => decrypt_in_place(c.as_ref(), block),
            Self::Cast5(c) => decrypt_in_place(c.as_ref(), block),
            Self::Aes128(c) => decrypt_in_place(c.as_ref(), block),
            Self::Aes256(c) => decrypt_in_place(c.as_ref(), block),
        }
    }
}

fn encrypt_in_place<C: BlockEncrypt + BlockSizeUser>(c: &C, block: &mut [u8]) {
    let mut b = GenericArray::clone_from_slice(block);
    c.encrypt_block(&mut b);
    block.copy_from_slice(&b);
}

fn decrypt_in_place<C: BlockDecrypt + BlockSizeUser>(c: &C, block: &mut [u8]) {
    let mut b = GenericArray::clone_from_slice(block);
    c.decrypt_block(&mut b);
    block.copy_from_slice(&b);
}

/// Phase marker: cipher has consumed zero or more `update` calls and may
/// still accept more input or be finalized.
pub struct Updating;

/// A CBC cipher instance mid-transaction. `CbcCipher<Updating>` is the
/// only reachable state after [`CbcCipher::new`] — there is no `Init`
/// value distinct from it because nothing meaningful happens between
/// "opened" and "ready for the first update".
pub struct CbcCipher<S = Updating> {
    backend: Backend,
    direction: Direction,
    prev: Vec<u8>,
    buffer: Vec<u8>,
    _state: PhantomData<S>,
}

impl<S> Drop for CbcCipher<S> {
    fn drop(&mut self) {
        self.prev.zeroize();
        self.buffer.zeroize();
    }
}

impl CbcCipher<Updating> {
    /// Open a cipher transaction (`cipher_init`). `iv` must be exactly
    /// one block long.
    pub fn new(
        cipher: MungeCipher,
        key: &[u8],
        iv: &[u8],
        direction: Direction,
    ) -> Result<Self, CryptoError> {
        let backend = Backend::new(cipher, key)?;
        if iv.len() != backend.block_size() {
            return Err(CryptoError);
        }
        Ok(Self {
            backend,
            direction,
            prev: iv.to_vec(),
            buffer: Vec::new(),
            _state: PhantomData,
        })
    }

    /// Feed more input, returning whatever output bytes are now fully
    /// determined (`cipher_update`). Decryption always holds back one
    /// block, since the final block may carry padding that only
    /// [`finalize`](Self::finalize) can validate.
    pub fn update(&mut self, src: &[u8]) -> Vec<u8> {
        let block_size = self.backend.block_size();
        self.buffer.extend_from_slice(src);
        let mut out = Vec::new();
        match self.direction {
            Direction::Encrypt => {
                while self.buffer.len() >= block_size {
                    let mut block: Vec<u8> = self.buffer.drain(..block_size).collect();
                    xor_in_place(&mut block, &self.prev);
                    self.backend.encrypt_block(&mut block);
                    self.prev.copy_from_slice(&block);
                    out.extend_from_slice(&block);
                }
            }
            Direction::Decrypt => {
                while self.buffer.len() > block_size {
                    let cipher_block: Vec<u8> = self.buffer.drain(..block_size).collect();
                    let mut plain = cipher_block.clone();
                    self.backend.decrypt_block(&mut plain);
                    xor_in_place(&mut plain, &self.prev);
                    self.prev = cipher_block;
                    out.extend_from_slice(&plain);
                }
            }
        }
        out
    }

    /// Finish the transaction (`cipher_final` followed implicitly by
    /// `cipher_cleanup`, since `self` is consumed and its key material
    /// zeroized on drop). Encrypting always emits exactly one padded
    /// block; decrypting requires exactly one block of input remaining
    /// and validates its PKCS#7 padding.
    pub fn finalize(mut self) -> Result<Vec<u8>, CryptoError> {
        let block_size = self.backend.block_size();
        match self.direction {
            Direction::Encrypt => {
                let pad = block_size - (self.buffer.len() % block_size);
                self.buffer.resize(self.buffer.len() + pad, pad as u8);
                let mut block: Vec<u8> = self.buffer.drain(..block_size).collect();
                xor_in_place(&mut block, &self.prev);
                self.backend.encrypt_block(&mut block);
                Ok(block)
            }
            Direction::Decrypt => {
                if self.buffer.len() != block_size {
                    return Err(CryptoError);
                }
                let cipher_block = std::mem::take(&mut self.buffer);
                let mut plain = cipher_block.clone();
                self.backend.decrypt_block(&mut plain);
                xor_in_place(&mut plain, &self.prev);
                strip_pkcs7(&mut plain, block_size)?;
                Ok(plain)
            }
        }
    }
}

fn xor_in_place(block: &mut [u8], mask: &[u8]) {
    for (b, m) in block.iter_mut().zip(mask.iter()) {
        *b ^= m;
    }
}

fn strip_pkcs7(block: &mut Vec<u8>, block_size: usize) -> Result<(), CryptoError> {
    let pad = *block.last().ok_or(CryptoError)? as usize;
    if pad == 0 || pad > block_size {
        return Err(CryptoError);
    }
    if block[block.len() - pad..].iter().any(|&b| b as usize != pad) {
        return Err(CryptoError);
    }
    block.truncate(block.len() - pad);
    Ok(())
}

/// One-shot encrypt helper for callers that have the whole plaintext in
/// hand (the common case in the credential codec).
pub fn encrypt(
    cipher: MungeCipher,
    key: &[u8],
    iv: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut c = CbcCipher::new(cipher, key, iv, Direction::Encrypt)?;
    let mut out = c.update(plaintext);
    out.extend(c.finalize()?);
    Ok(out)
}

/// One-shot decrypt helper, the inverse of [`encrypt`].
pub fn decrypt(
    cipher: MungeCipher,
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut c = CbcCipher::new(cipher, key, iv, Direction::Decrypt)?;
    let mut out = c.update(ciphertext);
    out.extend(c.finalize()?);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(cipher: MungeCipher) {
        let key = vec![0x42u8; cipher.resolve().key_size()];
        let iv = vec![0x24u8; cipher.resolve().block_size()];
        for len in [0usize, 1, 15, 16, 17, 31, 32, 100] {
            let plaintext: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let ct = encrypt(cipher, &key, &iv, &plaintext).unwrap();
            let pt = decrypt(cipher, &key, &iv, &ct).unwrap();
            assert_eq!(pt, plaintext, "len={len} cipher={cipher:?}");
        }
    }

    #[test]
    fn aes128_roundtrips_across_block_boundaries() {
        roundtrip(MungeCipher::Aes128);
    }

    #[test]
    fn aes256_roundtrips_across_block_boundaries() {
        roundtrip(MungeCipher::Aes256);
    }

    #[test]
    fn blowfish_roundtrips_across_block_boundaries() {
        roundtrip(MungeCipher::Blowfish);
    }

    #[test]
    fn cast5_roundtrips_across_block_boundaries() {
        roundtrip(MungeCipher::Cast5);
    }

    #[test]
    fn tampered_ciphertext_fails_padding_check() {
        let key = vec![0x11u8; 16];
        let iv = vec![0x22u8; 16];
        let mut ct = encrypt(MungeCipher::Aes128, &key, &iv, b"hello world").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xff;
        assert!(decrypt(MungeCipher::Aes128, &key, &iv, &ct).is_err());
    }

    #[test]
    fn wrong_key_fails_padding_check_with_overwhelming_probability() {
        let key = vec![0x11u8; 16];
        let wrong_key = vec![0x99u8; 16];
        let iv = vec![0x22u8; 16];
        let ct = encrypt(MungeCipher::Aes128, &key, &iv, b"a longer message than one block").unwrap();
        assert!(decrypt(MungeCipher::Aes128, &wrong_key, &iv, &ct).is_err());
    }

    #[test]
    fn arbitrary_length_key_material_roundtrips() {
        // §3 recommends a 64-byte on-disk key; none of the ciphers accept
        // a key that long directly, so this exercises the subkey derivation.
        let key = vec![0x5au8; 64];
        let iv = vec![0x24u8; 16];
        let ct = encrypt(MungeCipher::Aes256, &key, &iv, b"arbitrary length key").unwrap();
        let pt = decrypt(MungeCipher::Aes256, &key, &iv, &ct).unwrap();
        assert_eq!(pt, b"arbitrary length key");
    }

    #[test]
    fn rejects_short_iv() {
        let key = vec![0x11u8; 16];
        let iv = vec![0x22u8; 8];
        assert!(CbcCipher::new(MungeCipher::Aes128, &key, &iv, Direction::Encrypt).is_err());
    }
}
