//! Payload compression, applied to the inner structure's payload before
//! encryption and reversed after decryption (§4.1, §4.2 step 2/8).
//! Compression is advisory: encoding falls back to [`MungeZip::None`]
//! whenever compressing would not shrink the payload, so decode never
//! needs to guess — the zip field on the wire always tells the truth.

use std::io::{Read, Write};

use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use flate2::{Compression as ZlibCompression, read::ZlibDecoder, write::ZlibEncoder};

use crate::{cfg::enums::MungeZip, error::CryptoError};

pub fn compress(zip: MungeZip, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    match zip.resolve() {
        MungeZip::None => Ok(data.to_vec()),
        MungeZip::Zlib => {
            let mut enc = ZlibEncoder::new(Vec::new(), ZlibCompression::default());
            enc.write_all(data).map_err(|_| CryptoError)?;
            enc.finish().map_err(|_| CryptoError)
        }
        MungeZip::Bzlib => {
            let mut enc = BzEncoder::new(Vec::new(), BzCompression::default());
            enc.write_all(data).map_err(|_| CryptoError)?;
            enc.finish().map_err(|_| CryptoError)
        }
        MungeZip::Default => unreachable!("resolve() never returns Default"),
    }
}

pub fn decompress(zip: MungeZip, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    match zip.resolve() {
        MungeZip::None => Ok(data.to_vec()),
        MungeZip::Zlib => {
            let mut out = Vec::new();
            ZlibDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|_| CryptoError)?;
            Ok(out)
        }
        MungeZip::Bzlib => {
            let mut out = Vec::new();
            BzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|_| CryptoError)?;
            Ok(out)
        }
        MungeZip::Default => unreachable!("resolve() never returns Default"),
    }
}

/// Compress `data` with `preferred`, but only if the result is actually
/// smaller; otherwise report [`MungeZip::None`] and the original bytes
/// unchanged. Returns the zip value that was actually used alongside
/// the (possibly compressed) payload, so the caller can write the
/// honest value into the wire structure.
pub fn compress_if_smaller(
    preferred: MungeZip,
    data: &[u8],
) -> Result<(MungeZip, Vec<u8>), CryptoError> {
    if preferred.resolve() == MungeZip::None || data.is_empty() {
        return Ok((MungeZip::None, data.to_vec()));
    }
    let compressed = compress(preferred, data)?;
    if compressed.len() < data.len() {
        Ok((preferred, compressed))
    } else {
        Ok((MungeZip::None, data.to_vec()))
    }
}
