//! Primary peer-authentication path: ask the kernel directly via
//! `SO_PEERCRED`, avoiding the filesystem round-trip of
//! [`super::fd_passing`] whenever the platform supports it.

use std::os::unix::io::AsRawFd;

use tokio::net::UnixStream;

use super::PeerIdentity;
use crate::error::MungeError;

/// Query `SO_PEERCRED` on a connected Unix domain socket.
///
/// # Safety
/// `getsockopt` is called with a `libc::ucred`-sized buffer matching
/// `SOL_SOCKET`/`SO_PEERCRED`'s documented layout; the kernel writes at
/// most `optlen` bytes, which we verify on return.
pub fn peer_credentials(stream: &UnixStream) -> Result<PeerIdentity, MungeError> {
    let fd = stream.as_raw_fd();
    let mut ucred = libc::ucred {
        pid: 0,
        uid: 0,
        gid: 0,
    };
    let mut len = core::mem::size_of::<libc::ucred>() as libc::socklen_t;

    // SAFETY: `fd` is a live, connected AF_UNIX socket owned by `stream`;
    // `ucred` and `len` describe a buffer exactly `size_of::<ucred>()`
    // bytes long, matching what SO_PEERCRED expects.
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            &mut ucred as *mut libc::ucred as *mut libc::c_void,
            &mut len,
        )
    };
    if rc != 0 || len as usize != core::mem::size_of::<libc::ucred>() {
        return Err(MungeError::AuthFailure);
    }

    Ok(PeerIdentity {
        uid: ucred.uid,
        gid: ucred.gid,
    })
}
