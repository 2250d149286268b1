//! Crypto primitives (§4.1): block ciphers in CBC mode, keyed MACs, and
//! payload compressors. Nothing in this module talks to the wire format,
//! the replay cache, or the daemon's socket loop — it only turns bytes
//! into other bytes.

pub mod cipher;
pub mod compress;
pub mod mac;
