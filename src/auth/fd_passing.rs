//! Fallback peer-authentication path (§4.4 steps 1-6), used only when
//! `SO_PEERCRED` is unavailable. The daemon and client prove identity by
//! exchanging file descriptors over the already-connected socket using
//! `SCM_RIGHTS`; the descriptor's `fstat` owner is the peer's
//! authenticated identity, and a FIFO only the daemon can create (and
//! only a legitimate client can be told the path of) gates the exchange.

use std::{
    ffi::CString,
    os::unix::{ffi::OsStrExt, io::RawFd},
    path::{Path, PathBuf},
};

use rand::RngCore;

use super::PeerIdentity;
use crate::{cfg::defaults::AUTH_RND_BYTES, error::MungeError};

/// Pick a random filename component (`AUTH_RND_BYTES` of hex-encoded
/// entropy) under `dir`.
fn random_path(dir: &str) -> PathBuf {
    let mut raw = vec![0u8; AUTH_RND_BYTES];
    rand::rng().fill_bytes(&mut raw);
    let mut name = String::with_capacity(raw.len() * 2 + 6);
    name.push_str(".munge");
    for b in raw {
        name.push_str(&format!("{b:02x}"));
    }
    Path::new(dir).join(name)
}

/// Create a FIFO at `path`, owned and readable only by this process.
///
/// # Safety
/// `path` is converted to a NUL-terminated `CString`; `mkfifo` is given
/// a valid pointer to it and a fixed, non-attacker-controlled mode.
fn make_fifo(path: &Path) -> Result<(), MungeError> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| MungeError::Snafu)?;
    // SAFETY: c_path is NUL-terminated and valid for the duration of the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc != 0 {
        return Err(MungeError::Snafu);
    }
    Ok(())
}

fn unlink_path(path: &Path) {
    if let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) {
        // SAFETY: c_path is NUL-terminated; unlink on a nonexistent path is harmless.
        unsafe {
            libc::unlink(c_path.as_ptr());
        }
    }
}

/// Send `fd` as `SCM_RIGHTS` ancillary data over `sock`, with a
/// single-byte payload (the data channel carries no meaningful bytes;
/// only the ancillary fd matters).
///
/// # Safety
/// `sock` must be a connected, writable AF_UNIX socket; `fd` must be a
/// valid, open file descriptor for the duration of the call.
unsafe fn send_fd(sock: RawFd, fd: RawFd) -> Result<(), MungeError> {
    let mut iov_base = [0u8; 1];
    let iov = libc::iovec {
        iov_base: iov_base.as_mut_ptr() as *mut libc::c_void,
        iov_len: 1,
    };
    let mut cmsg_buf = [0u8; 64];
    let mut msg: libc::msghdr = unsafe { core::mem::zeroed() };
    msg.msg_iov = &iov as *const libc::iovec as *mut libc::iovec;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = unsafe { libc::CMSG_SPACE(core::mem::size_of::<RawFd>() as u32) as _ };

    // SAFETY: msg.msg_control points at cmsg_buf, large enough for one
    // CMSG_SPACE(sizeof(RawFd)) header+payload, per the controllen set above.
    let cmsg: *mut libc::cmsghdr = unsafe { libc::CMSG_FIRSTHDR(&msg) };
    if cmsg.is_null() {
        return Err(MungeError::Snafu);
    }
    unsafe {
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(core::mem::size_of::<RawFd>() as u32) as _;
        core::ptr::write(libc::CMSG_DATA(cmsg) as *mut RawFd, fd);
    }

    // SAFETY: msg is a fully initialized msghdr over valid iovec/cmsg buffers on the stack.
    let rc = unsafe { libc::sendmsg(sock, &msg, 0) };
    if rc < 0 {
        return Err(MungeError::Socket);
    }
    Ok(())
}

/// Receive one `SCM_RIGHTS`-passed file descriptor from `sock`.
///
/// # Safety
/// `sock` must be a connected, readable AF_UNIX socket.
unsafe fn recv_fd(sock: RawFd) -> Result<RawFd, MungeError> {
    let mut iov_base = [0u8; 1];
    let iov = libc::iovec {
        iov_base: iov_base.as_mut_ptr() as *mut libc::c_void,
        iov_len: 1,
    };
    let mut cmsg_buf = [0u8; 64];
    let mut msg: libc::msghdr = unsafe { core::mem::zeroed() };
    msg.msg_iov = &iov as *const libc::iovec as *mut libc::iovec;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buf.as_mut_ptr() as *mut libc::c_void;
    msg.msg_controllen = cmsg_buf.len() as _;

    // SAFETY: msg describes valid stack buffers sized as set above.
    let rc = unsafe { libc::recvmsg(sock, &mut msg, 0) };
    if rc < 0 {
        return Err(MungeError::Socket);
    }

    // SAFETY: msg was just populated by a successful recvmsg call.
    let cmsg: *mut libc::cmsghdr = unsafe { libc::CMSG_FIRSTHDR(&msg) };
    if cmsg.is_null() {
        return Err(MungeError::AuthFailure);
    }
    // SAFETY: cmsg is non-null and was validated as the first control message.
    unsafe {
        if (*cmsg).cmsg_level != libc::SOL_SOCKET || (*cmsg).cmsg_type != libc::SCM_RIGHTS {
            return Err(MungeError::AuthFailure);
        }
        let fd = core::ptr::read(libc::CMSG_DATA(cmsg) as *const RawFd);
        Ok(fd)
    }
}

/// `fstat` a raw descriptor and return its owner, verifying it is a
/// regular file.
///
/// # Safety
/// `fd` must be a valid, open file descriptor.
unsafe fn fstat_owner(fd: RawFd) -> Result<PeerIdentity, MungeError> {
    let mut st: libc::stat = unsafe { core::mem::zeroed() };
    // SAFETY: st is a valid, appropriately sized buffer for this platform's `stat`.
    let rc = unsafe { libc::fstat(fd, &mut st) };
    if rc != 0 {
        return Err(MungeError::AuthFailure);
    }
    if st.st_mode & libc::S_IFMT != libc::S_IFREG {
        return Err(MungeError::AuthFailure);
    }
    Ok(PeerIdentity {
        uid: st.st_uid,
        gid: st.st_gid,
    })
}

/// Resolve `/proc/self/fd/<fd>` to the path the kernel thinks it's open
/// on, so the server can confirm the descriptor it was handed really is
/// the file the client claimed to have created (and not, say, an fd to
/// some other file the client happened to have open).
fn resolve_fd_path(fd: RawFd) -> Result<PathBuf, MungeError> {
    let link = format!("/proc/self/fd/{fd}");
    std::fs::read_link(link).map_err(|_| MungeError::AuthFailure)
}

/// Verify the client's claimed path both matches where its fd actually
/// resolves to and sits directly inside `client_dir` — the same
/// directory `random_path` draws from, so a legitimate client's path
/// can never claim to live anywhere else.
fn verify_client_path(fd: RawFd, claimed: &Path, client_dir: &str) -> Result<(), MungeError> {
    let resolved = resolve_fd_path(fd)?;
    if resolved != claimed {
        return Err(MungeError::AuthFailure);
    }
    let parent = claimed.parent().ok_or(MungeError::AuthFailure)?;
    let expected_dir = std::fs::canonicalize(client_dir).map_err(|_| MungeError::AuthFailure)?;
    let actual_dir = std::fs::canonicalize(parent).map_err(|_| MungeError::AuthFailure)?;
    if actual_dir != expected_dir {
        return Err(MungeError::AuthFailure);
    }
    Ok(())
}

/// Daemon side of the fd-passing handshake (steps 1-6). `sock` is the
/// already-connected request socket's raw descriptor; `server_dir` and
/// `client_dir` come from `AUTH_SERVER_DIR`/`AUTH_CLIENT_DIR`. Step 5
/// (path/type/directory verification) checks that the received fd is a
/// regular file resolving to the path the client claims to have created,
/// and that the path sits inside `client_dir`.
pub fn authenticate_server_side(
    sock: RawFd,
    server_dir: &str,
    client_dir: &str,
) -> Result<PeerIdentity, MungeError> {
    let server_path = random_path(server_dir);
    make_fifo(&server_path)?;

    let result = (|| -> Result<PeerIdentity, MungeError> {
        // SAFETY: sock is the connected request socket, live for this call.
        unsafe {
            let path_bytes = server_path.as_os_str().as_bytes();
            send_path(sock, path_bytes)?;
            let fd = recv_fd(sock)?;
            let claimed_path_bytes = recv_path(sock);
            let outcome = (|| -> Result<PeerIdentity, MungeError> {
                let claimed_path_bytes = claimed_path_bytes?;
                let claimed_path = PathBuf::from(std::ffi::OsStr::from_bytes(&claimed_path_bytes));
                verify_client_path(fd, &claimed_path, client_dir)?;
                fstat_owner(fd)
            })();
            libc::close(fd);
            outcome
        }
    })();

    unlink_path(&server_path);
    result
}

/// Client side of the fd-passing handshake. Receives the daemon's
/// chosen server path, creates its own file in `client_dir`, opens the
/// server FIFO (which only succeeds if this process is permitted to),
/// and sends that file's descriptor back.
pub fn authenticate_client_side(sock: RawFd, client_dir: &str) -> Result<(), MungeError> {
    let server_path_bytes = recv_path(sock)?;
    let client_path = random_path(client_dir);

    let result = (|| -> Result<(), MungeError> {
        let c_client = CString::new(client_path.as_os_str().as_bytes())
            .map_err(|_| MungeError::Snafu)?;
        // SAFETY: c_client is NUL-terminated; O_CREAT|O_EXCL with mode 0600
        // ensures only this process can have created/opened the file.
        let client_fd = unsafe {
            libc::open(
                c_client.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600,
            )
        };
        if client_fd < 0 {
            return Err(MungeError::Snafu);
        }

        let c_server = CString::new(server_path_bytes.as_slice()).map_err(|_| MungeError::Snafu)?;
        // SAFETY: c_server is NUL-terminated; opening for write-only blocks
        // until the daemon's fstat completes its side of the rendezvous.
        let server_fd = unsafe { libc::open(c_server.as_ptr(), libc::O_WRONLY) };
        if server_fd < 0 {
            // SAFETY: client_fd is a valid fd opened above.
            unsafe {
                libc::close(client_fd);
            }
            return Err(MungeError::Snafu);
        }

        // SAFETY: sock is the connected request socket; client_fd is the
        // just-opened regular file this process owns.
        let sent = unsafe { send_fd(sock, client_fd) }
            .and_then(|()| {
                // SAFETY: sock is the connected request socket, live for this call.
                unsafe { send_path(sock, client_path.as_os_str().as_bytes()) }
            });
        // SAFETY: both descriptors were opened above and are no longer needed.
        unsafe {
            libc::close(server_fd);
            libc::close(client_fd);
        }
        sent
    })();

    unlink_path(&client_path);
    result
}

/// Send a length-prefixed path over the connected socket (plain data,
/// no ancillary message).
///
/// # Safety
/// `sock` must be a connected, writable socket.
unsafe fn send_path(sock: RawFd, path: &[u8]) -> Result<(), MungeError> {
    let len = path.len() as u32;
    let len_bytes = len.to_be_bytes();
    // SAFETY: sock is connected and writable for the duration of this call.
    unsafe {
        if libc::write(sock, len_bytes.as_ptr() as *const libc::c_void, 4) != 4 {
            return Err(MungeError::Socket);
        }
        if libc::write(sock, path.as_ptr() as *const libc::c_void, path.len()) != path.len() as isize
        {
            return Err(MungeError::Socket);
        }
    }
    Ok(())
}

/// Receive a length-prefixed path, the inverse of [`send_path`].
fn recv_path(sock: RawFd) -> Result<Vec<u8>, MungeError> {
    let mut len_bytes = [0u8; 4];
    // SAFETY: sock is connected and readable for the duration of this call.
    unsafe {
        if libc::read(sock, len_bytes.as_mut_ptr() as *mut libc::c_void, 4) != 4 {
            return Err(MungeError::Socket);
        }
    }
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len == 0 || len > 4096 {
        return Err(MungeError::BadLength);
    }
    let mut buf = vec![0u8; len];
    // SAFETY: buf is exactly `len` bytes, matching the declared length.
    unsafe {
        if libc::read(sock, buf.as_mut_ptr() as *mut libc::c_void, len) != len as isize {
            return Err(MungeError::Socket);
        }
    }
    Ok(buf)
}
