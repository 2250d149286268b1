//! Socket wire framing (§4.5, §6): `magic(4) | version(1) | type(1) |
//! length(4) | body(length)`. All numeric fields are network byte order.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, U32};

use crate::{cfg::defaults::{MAXIMUM_REQ_LEN, WIRE_MAGIC, WIRE_VERSION}, error::MungeError};

/// Request/response message kinds carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    EncodeRequest,
    EncodeResponse,
    DecodeRequest,
    DecodeResponse,
}

impl MsgType {
    fn to_wire(self) -> u8 {
        match self {
            Self::EncodeRequest => 0,
            Self::EncodeResponse => 1,
            Self::DecodeRequest => 2,
            Self::DecodeResponse => 3,
        }
    }

    fn from_wire(v: u8) -> Result<Self, MungeError> {
        Ok(match v {
            0 => Self::EncodeRequest,
            1 => Self::EncodeResponse,
            2 => Self::DecodeRequest,
            3 => Self::DecodeResponse,
            _ => return Err(MungeError::BadArg),
        })
    }
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct FrameHeader {
    magic: U32<BigEndian>,
    version: u8,
    msg_type: u8,
    length: U32<BigEndian>,
}

const HEADER_LEN: usize = core::mem::size_of::<FrameHeader>();

/// One complete frame read off the wire: its declared type and body.
pub struct Frame {
    pub msg_type: MsgType,
    pub body: Vec<u8>,
}

/// Read one frame, enforcing `MAXIMUM_REQ_LEN` before allocating a buffer
/// for the body (§8 scenario S6 — oversized requests are rejected at the
/// framing layer, never handed to the codec).
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, MungeError> {
    let mut header_buf = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header_buf)
        .await
        .map_err(|_| MungeError::Socket)?;
    let header = FrameHeader::ref_from_bytes(&header_buf).map_err(|_| MungeError::Snafu)?;

    if header.magic.get() != WIRE_MAGIC {
        return Err(MungeError::BadArg);
    }
    if header.version.get() != WIRE_VERSION {
        return Err(MungeError::BadArg);
    }
    let length = header.length.get() as usize;
    if length > MAXIMUM_REQ_LEN {
        return Err(MungeError::BadLength);
    }
    let msg_type = MsgType::from_wire(header.msg_type.get())?;

    let mut body = vec![0u8; length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|_| MungeError::Socket)?;

    Ok(Frame { msg_type, body })
}

/// Write one frame, enforcing `MAXIMUM_REQ_LEN` on the outgoing body too.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg_type: MsgType,
    body: &[u8],
) -> Result<(), MungeError> {
    if body.len() > MAXIMUM_REQ_LEN {
        return Err(MungeError::BadLength);
    }
    let header = FrameHeader {
        magic: U32::new(WIRE_MAGIC),
        version: WIRE_VERSION,
        msg_type: msg_type.to_wire(),
        length: U32::new(body.len() as u32),
    };
    writer
        .write_all(header.as_bytes())
        .await
        .map_err(|_| MungeError::Socket)?;
    writer
        .write_all(body)
        .await
        .map_err(|_| MungeError::Socket)?;
    writer.flush().await.map_err(|_| MungeError::Socket)?;
    Ok(())
}
