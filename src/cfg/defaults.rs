// SPDX-License-Identifier: GPL-3.0-or-later

//! Compile-time policy defaults, transcribed from the upstream MUNGE
//! `munge_defs.h` header. Kept as plain constants rather than buried
//! magic numbers so the codec, daemon, and CLI all agree on one source
//! of truth.

use std::time::Duration;

/// Literal bytes that open every printable credential string.
pub const CRED_PREFIX: &str = "MUNGE:";
/// Literal byte that closes the base64 body, just before the NUL.
pub const CRED_SUFFIX: &str = ":";

/// Bytes of random salt encoded into every credential.
pub const CRED_SALT_LEN: usize = 8;

/// Seconds before a credential expires if the caller does not specify a TTL.
pub const DEFAULT_TTL_SECS: u32 = 300;
/// Hard upper bound on a credential's TTL.
pub const MAXIMUM_TTL_SECS: u32 = 3600;

/// Largest cipher block size this implementation supports (AES/Blowfish/CAST5 all fit).
pub const MAXIMUM_BLK_LEN: usize = 16;
/// Largest cipher key size this implementation supports.
pub const MAXIMUM_KEY_LEN: usize = 32;
/// Largest MAC output size this implementation supports.
pub const MAXIMUM_MD_LEN: usize = 32;

/// Hard cap on a framed request/response body, enforced before any parsing.
pub const MAXIMUM_REQ_LEN: usize = 1_048_576;

/// Interval between group-database refreshes.
pub const GROUP_PARSE_TIMER: Duration = Duration::from_secs(900);

/// Allow a retried transaction to avoid a false replay positive.
pub const REPLAY_RETRY_FLAG: bool = true;

/// Interval between replay-cache purge sweeps.
pub const REPLAY_PURGE_TIMER: Duration = Duration::from_secs(60);

/// Listen backlog for the daemon's unix domain socket.
pub const SOCKET_BACKLOG: u32 = 256;

/// Default path for the daemon's request socket.
pub const SOCKET_NAME: &str = "/var/run/munge/munge.socket.2";

/// Attempts a client makes to establish the initial connection.
pub const SOCKET_CONNECT_ATTEMPTS: u32 = 5;
/// Attempts a client makes to complete one credential transaction.
pub const SOCKET_XFER_ATTEMPTS: u32 = 5;
/// Start of the linear back-off between transaction retry attempts.
pub const SOCKET_XFER_USLEEP: u64 = 10_000;

/// Default size of the daemon's request worker pool.
pub const DEFAULT_THREADS: usize = 2;

/// Whether UID 0 bypasses uid/gid restrictions on decode.
pub const AUTH_ROOT_ALLOW_FLAG: bool = false;

/// Directory in which the daemon creates its half of the fd-passing handshake.
pub const AUTH_SERVER_DIR: &str = "/var/lib/munge";
/// Directory in which the client creates its half of the fd-passing handshake.
pub const AUTH_CLIENT_DIR: &str = "/tmp";
/// Bytes of entropy used to name the fd-passing handshake files.
pub const AUTH_RND_BYTES: usize = 16;

/// Default path for the daemon's logfile.
pub const DEFAULT_LOGFILE: &str = "/var/log/munge/munged.log";
/// Default path for the daemon's pidfile.
pub const DEFAULT_PIDFILE: &str = "/var/run/munge/munged.pid";
/// Default path for the PRNG seed file.
pub const DEFAULT_SEED_FILE: &str = "/var/lib/munge/munge.seed";
/// Default path for the shared symmetric key.
pub const DEFAULT_KEY_FILE: &str = "/etc/munge/munge.key";

/// Clock-skew tolerance applied to encode-time and expiry checks.
pub const CLOCK_SKEW_TOLERANCE_SECS: u32 = 5;

/// Per-request wall-clock deadline covering peer-auth and I/O.
pub const REQUEST_DEADLINE: Duration = Duration::from_secs(10);

/// Environment variable a client may use to override the socket path.
pub const SOCKET_ENV_VAR: &str = "MUNGE_SOCKET";

/// 4-byte magic value that opens every socket wire frame.
pub const WIRE_MAGIC: u32 = 0x4d554e47; // "MUNG"
/// Current wire protocol version.
pub const WIRE_VERSION: u8 = 1;

/// Sentinel value meaning "no uid/gid restriction".
pub const RESTRICTION_ANY: u32 = 0xFFFF_FFFF;

/// Current credential wire format version.
pub const CRED_VERSION: u8 = 1;
