//! Framed-pipe codec (spec.md §4.1).
//!
//! Every message on the host pipe is a fixed header followed by
//! `data_len` bytes of payload, little-endian throughout:
//!
//! ```text
//! off 0   u8   type
//! off 1   u24  data_len (0..=2^24-1)
//! off 4   i32  user_id
//! off 8   i32  entity_id
//! off 12  i32  other_id
//! off 16  u8   status
//! ```
//!
//! The explicit offsets above span 17 bytes (0..17); `HEADER_SIZE` follows
//! them rather than the "16-byte header" prose elsewhere in the spec, which
//! undercounts the trailing status byte. See `DESIGN.md` for this
//! resolution.
//!
//! Read/write helpers here are modeled on `snow-rt::dist::node`'s
//! `read_msg`/`write_msg`, generalized from a bare `u32` length prefix to
//! this richer fixed header.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Size of the fixed message header, in bytes.
pub const HEADER_SIZE: usize = 17;

/// Largest representable payload length (`data_len` is a 24-bit field).
pub const MAX_DATA_LEN: u32 = (1 << 24) - 1;

/// A decoded fixed-size message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub msg_type: u8,
    pub data_len: u32,
    pub user_id: i32,
    pub entity_id: i32,
    pub other_id: i32,
    pub status: u8,
}

impl MessageHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.msg_type;
        let len_bytes = self.data_len.to_le_bytes();
        buf[1..4].copy_from_slice(&len_bytes[0..3]);
        buf[4..8].copy_from_slice(&self.user_id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.entity_id.to_le_bytes());
        buf[12..16].copy_from_slice(&self.other_id.to_le_bytes());
        buf[16] = self.status;
        buf
    }

    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        let mut len_bytes = [0u8; 4];
        len_bytes[0..3].copy_from_slice(&buf[1..4]);
        MessageHeader {
            msg_type: buf[0],
            data_len: u32::from_le_bytes(len_bytes),
            user_id: i32::from_le_bytes(buf[4..8].try_into().unwrap()),
            entity_id: i32::from_le_bytes(buf[8..12].try_into().unwrap()),
            other_id: i32::from_le_bytes(buf[12..16].try_into().unwrap()),
            status: buf[16],
        }
    }
}

/// A fully decoded message: header plus its owned payload.
///
/// `data`'s ownership transfers with the message (spec.md §3); the consumer
/// is responsible for using it exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub header: MessageHeader,
    pub data: Vec<u8>,
}

/// Errors at the framing layer. Per spec.md §7, these terminate the router.
#[derive(Debug)]
pub enum FrameError {
    /// The stream ended before a full header or payload was read.
    ShortRead,
    /// `data_len` exceeded `MAX_DATA_LEN` (cannot occur from `decode`, but
    /// guards hand-built headers passed to `write_message`).
    DataTooLarge(u32),
    Io(io::Error),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortRead => write!(f, "short read: stream ended mid-message"),
            Self::DataTooLarge(n) => write!(f, "payload length {n} exceeds 2^24-1"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<io::Error> for FrameError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            FrameError::ShortRead
        } else {
            FrameError::Io(e)
        }
    }
}

/// Read one framed message from `r`. Returns `ShortRead` on premature EOF,
/// matching `ErrorKind::ShortRead` in spec.md §4.1.
pub fn read_message<R: Read>(r: &mut R) -> Result<RawMessage, FrameError> {
    let mut header_buf = [0u8; HEADER_SIZE];
    r.read_exact(&mut header_buf)?;
    let header = MessageHeader::decode(&header_buf);

    let mut data = vec![0u8; header.data_len as usize];
    r.read_exact(&mut data)?;

    Ok(RawMessage { header, data })
}

/// Write one framed message to `w` and flush, matching spec.md §4.1
/// ("output is flushed at each message boundary").
pub fn write_message<W: Write>(w: &mut W, msg: &RawMessage) -> Result<(), FrameError> {
    if msg.data.len() as u64 > MAX_DATA_LEN as u64 {
        return Err(FrameError::DataTooLarge(msg.data.len() as u32));
    }
    w.write_all(&msg.header.encode())?;
    w.write_all(&msg.data)?;
    w.flush()?;
    Ok(())
}

/// A process-wide guarded writer: serializes concurrent VM worker threads'
/// writes so the header and payload of one message never interleave with
/// another (spec.md §4.1, §5 "Shared resources").
pub struct PipeWriter<W: Write> {
    inner: Arc<Mutex<W>>,
}

impl<W: Write> PipeWriter<W> {
    pub fn new(w: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(w)),
        }
    }

    /// A cheap clone sharing the same underlying mutex and stream.
    pub fn clone_handle(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn send(&self, msg: &RawMessage) -> Result<(), FrameError> {
        let mut guard = self.inner.lock();
        write_message(&mut *guard, msg)
    }
}
