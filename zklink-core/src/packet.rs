//! ZKTeco protocol packet structure and encoding/decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::{self, Command},
    constants::USHRT_MAX,
    error::{Error, Result},
};

/// ZKTeco protocol packet
///
/// # Packet Structure
///
/// ```text
/// ┌─────────────┬─────────────┬─────────────┬─────────────┬─────────────┐
/// │   Command   │  Checksum   │  SessionID  │  ReplyID    │   Payload   │
/// │   2 bytes   │   2 bytes   │   2 bytes   │   2 bytes   │   N bytes   │
/// │ (LE u16)    │  (LE u16)   │  (LE u16)   │  (LE u16)   │   (bytes)   │
/// └─────────────┴─────────────┴─────────────┴─────────────┴─────────────┘
/// ```
///
/// `command` stays a raw code because terminals answer with codes outside
/// the documented set.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    /// Command or response code
    pub command: u16,

    /// Checksum as carried on the wire
    pub checksum: u16,

    /// Session identifier (assigned by device on connect)
    pub session_id: u16,

    /// Reply number
    pub reply_id: u16,

    /// Packet payload (command-specific data)
    pub payload: Bytes,
}

/// Reply id that follows `reply_id`, wrapping at 0xFFFF
///
/// ```
/// use zklink_core::packet::next_reply_id;
///
/// assert_eq!(next_reply_id(7), 8);
/// assert_eq!(next_reply_id(65534), 0);
/// ```
pub fn next_reply_id(reply_id: u16) -> u16 {
    let next = reply_id as u32 + 1;
    if next >= USHRT_MAX as u32 {
        (next - USHRT_MAX as u32) as u16
    } else {
        next as u16
    }
}

impl Packet {
    /// Packet header size in bytes
    pub const HEADER_SIZE: usize = 8;

    /// Build a packet whose checksum matches its header and payload
    ///
    /// # Examples
    ///
    /// ```
    /// use zklink_core::{Packet, Command};
    ///
    /// let packet = Packet::new(Command::AckOk, 0x1234, 7, vec![1, 2, 3, 4]);
    /// assert_eq!(packet.payload.len(), 4);
    /// assert!(packet.verify_checksum().is_ok());
    /// ```
    pub fn new(command: impl Into<u16>, session_id: u16, reply_id: u16, payload: impl Into<Bytes>) -> Self {
        let command = command.into();
        let payload = payload.into();
        Self {
            command,
            checksum: checksum::calculate(command, session_id, reply_id, &payload),
            session_id,
            reply_id,
            payload,
        }
    }

    /// Build an outgoing request header
    ///
    /// The checksum covers `reply_id`, then the id is advanced and the
    /// packet carries the advanced id. Terminals of this family expect
    /// exactly this pairing. The new session reply id is `packet.reply_id`.
    ///
    /// # Examples
    ///
    /// ```
    /// use zklink_core::{Packet, Command};
    ///
    /// let packet = Packet::request(Command::Connect, 0, 65534, &[]);
    /// assert_eq!(packet.encode().as_ref(), &[0xE8, 0x03, 0x17, 0xFC, 0, 0, 0, 0]);
    /// ```
    pub fn request(command: Command, session_id: u16, reply_id: u16, payload: &[u8]) -> Self {
        let command = u16::from(command);
        Self {
            command,
            checksum: checksum::calculate(command, session_id, reply_id, payload),
            session_id,
            reply_id: next_reply_id(reply_id),
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Encode packet to bytes
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_u16_le(self.command);
        buf.put_u16_le(self.checksum);
        buf.put_u16_le(self.session_id);
        buf.put_u16_le(self.reply_id);
        buf.put_slice(&self.payload);

        buf
    }

    /// Decode packet from bytes
    ///
    /// The checksum field is kept but not verified; see
    /// [`Packet::verify_checksum`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::PacketTooShort`] when fewer than 8 bytes are given.
    pub fn decode(mut buf: Bytes) -> Result<Self> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(Error::PacketTooShort {
                expected: Self::HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let command = buf.get_u16_le();
        let checksum = buf.get_u16_le();
        let session_id = buf.get_u16_le();
        let reply_id = buf.get_u16_le();

        Ok(Self {
            command,
            checksum,
            session_id,
            reply_id,
            payload: buf,
        })
    }

    /// Verify that the checksum matches header and payload
    pub fn verify_checksum(&self) -> Result<()> {
        let expected = checksum::calculate(self.command, self.session_id, self.reply_id, &self.payload);
        if expected == self.checksum {
            Ok(())
        } else {
            Err(Error::ChecksumMismatch {
                expected,
                received: self.checksum,
            })
        }
    }

    /// Known command for this code, if any
    pub fn kind(&self) -> Option<Command> {
        Command::try_from(self.command).ok()
    }

    /// Check whether the code is `command`
    pub fn is(&self, command: Command) -> bool {
        self.command == u16::from(command)
    }

    /// Check if this is a success response
    pub fn is_success(&self) -> bool {
        Command::is_success_code(self.command)
    }

    /// Get total packet size
    pub fn size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("command", &command::describe(self.command))
            .field("checksum", &format!("0x{:04X}", self.checksum))
            .field("session_id", &format!("0x{:04X}", self.session_id))
            .field("reply_id", &self.reply_id)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet[{}](session={}, reply={}, len={})",
            command::describe(self.command),
            self.session_id,
            self.reply_id,
            self.payload.len()
        )
    }
}
