//! The printable credential string (§4.2): `MUNGE:<base64>:\0` wrapping
//! an outer header (authenticated, MAC'd in the clear) around an inner
//! structure (encrypted, carrying the identity and payload).
//!
//! This module implements encode/decode steps 1-8 and 10 of §4.2.
//! Identity-restriction evaluation (step 9) needs the group database and
//! the root-override policy, both daemon concerns, so it is left to the
//! caller (`daemon::decode`) — matching the documented dependency order
//! of `wire` on `crypto` and `replay` only.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::RngCore;
use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::{
    cfg::{
        defaults::{CRED_PREFIX, CRED_SALT_LEN, CRED_SUFFIX, CRED_VERSION, RESTRICTION_ANY},
        enums::{MungeCipher, MungeMac, MungeZip},
    },
    crypto::{cipher, compress, mac},
    error::MungeError,
    replay::{ProbeOutcome, ReplayCache},
};

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct InnerHeader {
    salt: [u8; CRED_SALT_LEN],
    uid: U32<BigEndian>,
    gid: U32<BigEndian>,
    encode_time: U32<BigEndian>,
    ttl: U32<BigEndian>,
    uid_restriction: U32<BigEndian>,
    gid_restriction: U32<BigEndian>,
    payload_len: U32<BigEndian>,
}

/// Everything needed to mint a new credential, already resolved to
/// concrete (non-`DEFAULT`) enum values by the caller.
pub struct EncodeInput {
    pub cipher: MungeCipher,
    pub mac: MungeMac,
    pub zip: MungeZip,
    pub realm: Vec<u8>,
    pub uid: u32,
    pub gid: u32,
    pub ttl: u32,
    pub uid_restriction: u32,
    pub gid_restriction: u32,
    pub payload: Vec<u8>,
}

/// A credential's fields as recovered by decode, prior to restriction
/// evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCredential {
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
    /// The replay cache's key for this credential (its MAC tag). The
    /// caller commits this fingerprint once the reply has actually
    /// reached the client (§9 replay-retry option b).
    pub fingerprint: Vec<u8>,
}

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Encode a credential record to its printable string (§4.2 steps 1-7).
pub fn encode_credential(
    input: EncodeInput,
    key: &[u8],
    rng: &mut dyn RngCore,
) -> Result<String, MungeError> {
    let cipher = input.cipher.resolve();
    let mac_alg = input.mac.resolve();
    if cipher == MungeCipher::None || mac_alg == MungeMac::None {
        return Err(MungeError::BadArg);
    }
    if input.realm.len() > u8::MAX as usize {
        return Err(MungeError::BadArg);
    }

    let (zip, payload) = compress::compress_if_smaller(input.zip, &input.payload)
        .map_err(|_| MungeError::Snafu)?;
    if payload.len() > u32::MAX as usize {
        return Err(MungeError::Overflow);
    }

    let encode_time = now_secs();
    if encode_time.checked_add(input.ttl).is_none() {
        return Err(MungeError::BadArg);
    }

    let mut salt = [0u8; CRED_SALT_LEN];
    rng.fill_bytes(&mut salt);

    let inner_header = InnerHeader {
        salt,
        uid: U32::new(input.uid),
        gid: U32::new(input.gid),
        encode_time: U32::new(encode_time),
        ttl: U32::new(input.ttl),
        uid_restriction: U32::new(input.uid_restriction),
        gid_restriction: U32::new(input.gid_restriction),
        payload_len: U32::new(payload.len() as u32),
    };
    let mut inner = inner_header.as_bytes().to_vec();
    inner.extend_from_slice(&payload);

    let mut iv = vec![0u8; cipher.iv_size()];
    rng.fill_bytes(&mut iv);
    let ciphertext = cipher::encrypt(cipher, key, &iv, &inner).map_err(|_| MungeError::Snafu)?;

    let mut outer = Vec::with_capacity(5 + input.realm.len() + iv.len() + ciphertext.len());
    outer.push(CRED_VERSION);
    outer.push(cipher.to_wire());
    outer.push(mac_alg.to_wire());
    outer.push(zip.to_wire());
    outer.push(input.realm.len() as u8);
    outer.extend_from_slice(&input.realm);
    outer.extend_from_slice(&iv);
    outer.extend_from_slice(&ciphertext);

    let tag = mac::compute(mac_alg, key, &outer).map_err(|_| MungeError::Snafu)?;
    outer.extend_from_slice(&tag);

    let body = STANDARD.encode(&outer);
    Ok(format!("{CRED_PREFIX}{body}{CRED_SUFFIX}\0"))
}

/// Decode a printable credential string, running §4.2 steps 1-8 and 10.
/// Restriction evaluation (step 9) is left to the caller.
///
/// `retry_permitted` mirrors the DECODE_REQUEST "retry" bit: when set, a
/// fingerprint that is only provisionally reserved (not yet committed)
/// is let through again instead of being bounced as a replay.
pub fn decode_credential(
    s: &str,
    key: &[u8],
    replay: &ReplayCache,
    clock_skew_tolerance_secs: u32,
    retry_permitted: bool,
) -> Result<DecodedCredential, MungeError> {
    let body = s
        .strip_prefix(CRED_PREFIX)
        .and_then(|rest| rest.strip_suffix('\0').unwrap_or(rest).strip_suffix(CRED_SUFFIX))
        .ok_or(MungeError::BadCred)?;
    let outer = STANDARD.decode(body).map_err(|_| MungeError::BadCred)?;

    if outer.len() < 5 {
        return Err(MungeError::BadCred);
    }
    let version = outer[0];
    if version != CRED_VERSION {
        return Err(MungeError::BadCred);
    }
    let cipher = MungeCipher::from_wire(outer[1]).ok_or(MungeError::BadCred)?;
    let mac_alg = MungeMac::from_wire(outer[2]).ok_or(MungeError::BadCred)?;
    let zip = MungeZip::from_wire(outer[3]).ok_or(MungeError::BadCred)?;
    if cipher.resolve() == MungeCipher::None || mac_alg.resolve() == MungeMac::None {
        return Err(MungeError::BadCred);
    }
    let realm_len = outer[4] as usize;
    let mut offset = 5;
    if outer.len() < offset + realm_len {
        return Err(MungeError::BadCred);
    }
    offset += realm_len;

    let iv_size = cipher.resolve().iv_size();
    let mac_size = mac_alg.resolve().output_size();
    if outer.len() < offset + iv_size + mac_size {
        return Err(MungeError::BadCred);
    }
    let iv = &outer[offset..offset + iv_size];
    offset += iv_size;
    let ciphertext_end = outer.len() - mac_size;
    let ciphertext = &outer[offset..ciphertext_end];
    let tag = &outer[ciphertext_end..];
    let authenticated = &outer[..ciphertext_end];

    // MAC verification precedes every other interpretation (§4.2 tie-break).
    mac::verify(mac_alg, key, authenticated, tag).map_err(|_| MungeError::InvalidCred)?;

    let inner =
        cipher::decrypt(cipher, key, iv, ciphertext).map_err(|_| MungeError::InvalidCred)?;
    let header_len = core::mem::size_of::<InnerHeader>();
    if inner.len() < header_len {
        return Err(MungeError::InvalidCred);
    }
    let header = InnerHeader::ref_from_bytes(&inner[..header_len])
        .map_err(|_| MungeError::InvalidCred)?;
    let payload_len = header.payload_len.get() as usize;
    if inner.len() - header_len != payload_len {
        return Err(MungeError::InvalidCred);
    }
    let compressed_payload = &inner[header_len..];
    let payload =
        compress::decompress(zip, compressed_payload).map_err(|_| MungeError::InvalidCred)?;

    let uid = header.uid.get();
    let gid = header.gid.get();
    let encode_time = header.encode_time.get();
    let ttl = header.ttl.get();
    let uid_restriction = header.uid_restriction.get();
    let gid_restriction = header.gid_restriction.get();

    // Replay check precedes temporal/restriction checks (§4.2 tie-break).
    let expiry = encode_time
        .saturating_add(ttl)
        .saturating_add(clock_skew_tolerance_secs);
    let outcome = if retry_permitted {
        replay.retry(tag, expiry)?
    } else {
        replay.reserve(tag, expiry)?
    };
    match outcome {
        ProbeOutcome::Replay => return Err(MungeError::ReplayedCred),
        ProbeOutcome::Fresh => {}
    }

    let now = now_secs();
    if encode_time > now.saturating_add(clock_skew_tolerance_secs) {
        return Err(MungeError::RewoundCred);
    }
    if encode_time.saturating_add(ttl).saturating_add(clock_skew_tolerance_secs) < now {
        return Err(MungeError::ExpiredCred);
    }

    Ok(DecodedCredential {
        uid,
        gid,
        encode_time,
        ttl,
        cipher: cipher.resolve(),
        mac: mac_alg.resolve(),
        zip: zip.resolve(),
        uid_restriction,
        gid_restriction,
        payload,
        fingerprint: tag.to_vec(),
    })
}

/// `true` if `restriction` is the "no restriction" sentinel.
pub fn is_unrestricted(restriction: u32) -> bool {
    restriction == RESTRICTION_ANY
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn sample_input(payload: &[u8]) -> EncodeInput {
        EncodeInput {
            cipher: MungeCipher::Aes128,
            mac: MungeMac::Sha256,
            zip: MungeZip::None,
            realm: Vec::new(),
            uid: 1000,
            gid: 1000,
            ttl: 300,
            uid_restriction: RESTRICTION_ANY,
            gid_restriction: RESTRICTION_ANY,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn encode_then_decode_recovers_the_payload() {
        let key = vec![0u8; 32];
        let replay = ReplayCache::new(0);
        let mut rng = OsRng;
        let cred = encode_credential(sample_input(b"hello"), &key, &mut rng).unwrap();
        assert!(cred.starts_with("MUNGE:"));
        assert!(cred.ends_with(":\0"));

        let decoded = decode_credential(&cred, &key, &replay, 5, false).unwrap();
        assert_eq!(decoded.payload, b"hello");
        assert_eq!(decoded.uid, 1000);
        assert_eq!(decoded.gid, 1000);
    }

    #[test]
    fn second_decode_of_the_same_credential_is_a_replay() {
        let key = vec![0u8; 32];
        let replay = ReplayCache::new(0);
        let mut rng = OsRng;
        let cred = encode_credential(sample_input(b"hi"), &key, &mut rng).unwrap();
        decode_credential(&cred, &key, &replay, 5, false).unwrap();
        let second = decode_credential(&cred, &key, &replay, 5, false);
        assert_eq!(second.unwrap_err(), MungeError::ReplayedCred);
    }

    #[test]
    fn single_bit_flip_in_the_body_is_rejected() {
        let key = vec![0u8; 32];
        let replay = ReplayCache::new(0);
        let mut rng = OsRng;
        let cred = encode_credential(sample_input(b"hello"), &key, &mut rng).unwrap();
        let mut bytes = cred.into_bytes();
        let flip_at = "MUNGE:".len() + 10;
        bytes[flip_at] ^= 0x01;
        let tampered = String::from_utf8(bytes).unwrap();
        let result = decode_credential(&tampered, &key, &replay, 5, false);
        assert!(result.is_err());
    }

    #[test]
    fn wrong_key_is_rejected_the_same_way_as_tampering() {
        let key = vec![0u8; 32];
        let wrong_key = vec![1u8; 32];
        let replay = ReplayCache::new(0);
        let mut rng = OsRng;
        let cred = encode_credential(sample_input(b"hello"), &key, &mut rng).unwrap();
        let result = decode_credential(&cred, &wrong_key, &replay, 5, false);
        assert_eq!(result.unwrap_err(), MungeError::InvalidCred);
    }

    #[test]
    fn retry_bit_permits_a_second_decode_of_an_uncommitted_reservation() {
        let key = vec![0u8; 32];
        let replay = ReplayCache::new(0);
        let mut rng = OsRng;
        let cred = encode_credential(sample_input(b"hi"), &key, &mut rng).unwrap();
        let first = decode_credential(&cred, &key, &replay, 5, false).unwrap();
        let second = decode_credential(&cred, &key, &replay, 5, true).unwrap();
        assert_eq!(first.payload, second.payload);
        replay.commit(&second.fingerprint);
        let third = decode_credential(&cred, &key, &replay, 5, true);
        assert_eq!(third.unwrap_err(), MungeError::ReplayedCred);
    }

    proptest::proptest! {
        /// §8 property 1 (round-trip): any payload up to a few KiB survives
        /// an encode/decode cycle byte-for-byte.
        #[test]
        fn round_trips_arbitrary_payloads(payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..4096)) {
            let key = vec![0u8; 32];
            let replay = ReplayCache::new(0);
            let mut rng = OsRng;
            let cred = encode_credential(sample_input(&payload), &key, &mut rng).unwrap();
            let decoded = decode_credential(&cred, &key, &replay, 5, false).unwrap();
            proptest::prop_assert_eq!(decoded.payload, payload);
        }

        /// §8 property 2 (integrity): flipping any single bit in the
        /// base64 body is rejected, never silently accepted.
        #[test]
        fn any_single_bit_flip_is_rejected(flip_index in 0usize..64) {
            let key = vec![0u8; 32];
            let replay = ReplayCache::new(0);
            let mut rng = OsRng;
            let cred = encode_credential(sample_input(b"proptest payload"), &key, &mut rng).unwrap();
            let mut bytes = cred.into_bytes();
            let body_start = CRED_PREFIX.len();
            let body_end = bytes.len() - CRED_SUFFIX.len() - 1;
            let index = body_start + (flip_index % (body_end - body_start));
            bytes[index] ^= 0x01;
            let tampered = String::from_utf8(bytes).unwrap();
            proptest::prop_assert!(decode_credential(&tampered, &key, &replay, 5, false).is_err());
        }
    }
}
