//! TCP top frame
//!
//! Over TCP every packet is prefixed with 8 bytes:
//!
//! ```text
//! ┌─────────────┬─────────────┬───────────────────┐
//! │   0x5050    │   0x7D82    │  length (LE u32)  │
//! └─────────────┴─────────────┴───────────────────┘
//! ```
//!
//! A socket read can return any prefix of a frame, or a frame followed by
//! the start of the next one. [`FrameDecoder`] accumulates reads and hands
//! out complete inner packets.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::{
    constants::{TCP_MAGIC_1, TCP_MAGIC_2},
    error::{Error, Result},
};

/// Size of the TCP top frame header
pub const TCP_HEADER_SIZE: usize = 8;

/// Largest inner packet accepted from a peer
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Prefix `packet` with the TCP top frame
///
/// ```
/// use zklink_core::frame;
///
/// let framed = frame::wrap(&[0xE8, 0x03]);
/// assert_eq!(framed.as_ref(), &[0x50, 0x50, 0x82, 0x7D, 2, 0, 0, 0, 0xE8, 0x03]);
/// ```
pub fn wrap(packet: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(TCP_HEADER_SIZE + packet.len());
    buf.put_u16_le(TCP_MAGIC_1);
    buf.put_u16_le(TCP_MAGIC_2);
    buf.put_u32_le(packet.len() as u32);
    buf.put_slice(packet);
    buf
}

/// Length announced by a top frame header
///
/// Returns `None` when fewer than 8 bytes are given or the magic words do
/// not match.
pub fn unwrap_header(buf: &[u8]) -> Option<usize> {
    let (magic1, magic2, length) = split_header(buf)?;
    (magic1 == TCP_MAGIC_1 && magic2 == TCP_MAGIC_2).then_some(length as usize)
}

fn split_header(buf: &[u8]) -> Option<(u16, u16, u32)> {
    let header = buf.get(..TCP_HEADER_SIZE)?;
    Some((
        u16::from_le_bytes([header[0], header[1]]),
        u16::from_le_bytes([header[2], header[3]]),
        u32::from_le_bytes([header[4], header[5], header[6], header[7]]),
    ))
}

/// Incremental TCP frame accumulator
///
/// # Examples
///
/// ```
/// use zklink_core::frame::{self, FrameDecoder};
///
/// let framed = frame::wrap(b"payload!");
/// let mut decoder = FrameDecoder::new();
///
/// decoder.extend(&framed[..5]);
/// assert!(decoder.decode().unwrap().is_none());
///
/// decoder.extend(&framed[5..]);
/// assert_eq!(decoder.decode().unwrap().unwrap().as_ref(), b"payload!");
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the socket
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes held that do not yet form a complete frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Remove up to `max` raw buffered bytes
    pub fn take(&mut self, max: usize) -> Bytes {
        let n = max.min(self.buf.len());
        self.buf.split_to(n).freeze()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Bytes still missing before the next frame is complete
    ///
    /// Zero when a frame is ready or when the header itself is incomplete
    /// and the amount cannot be known yet.
    pub fn missing(&self) -> usize {
        match unwrap_header(&self.buf) {
            Some(length) => (TCP_HEADER_SIZE + length).saturating_sub(self.buf.len()),
            None => TCP_HEADER_SIZE.saturating_sub(self.buf.len()),
        }
    }

    /// Extract the next complete inner packet
    ///
    /// # Errors
    ///
    /// [`Error::InvalidFrame`] when the buffered bytes do not start with the
    /// magic words, [`Error::FrameTooLarge`] for lengths above
    /// [`MAX_FRAME_SIZE`]. The buffer is left untouched in both cases.
    pub fn decode(&mut self) -> Result<Option<Bytes>> {
        let Some((magic1, magic2, length)) = split_header(&self.buf) else {
            return Ok(None);
        };

        if magic1 != TCP_MAGIC_1 || magic2 != TCP_MAGIC_2 {
            return Err(Error::InvalidFrame { magic1, magic2 });
        }

        let length = length as usize;
        if length > MAX_FRAME_SIZE {
            return Err(Error::FrameTooLarge {
                size: length,
                max: MAX_FRAME_SIZE,
            });
        }

        if self.buf.len() < TCP_HEADER_SIZE + length {
            self.buf.reserve(TCP_HEADER_SIZE + length - self.buf.len());
            return Ok(None);
        }

        self.buf.advance(TCP_HEADER_SIZE);
        let packet = self.buf.split_to(length).freeze();

        trace!(length, remaining = self.buf.len(), "Decoded TCP frame");

        Ok(Some(packet))
    }
}
