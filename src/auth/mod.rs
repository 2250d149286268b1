//! Peer authentication (§4.4): binding the UID/GID of the process on
//! the other end of a connected local socket.

pub mod fd_passing;
pub mod peercred;

/// The authenticated identity of a connected peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerIdentity {
    pub uid: u32,
    pub gid: u32,
}
