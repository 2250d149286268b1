//! On-the-wire formats: the socket framing protocol between client and
//! daemon (§5), and the printable credential string itself (§4.2).

pub mod credential;
pub mod frame;
