//! Session state for one connection
//!
//! A session tracks:
//! - Session ID (assigned by device)
//! - Reply counter (advanced per command, then replaced by the device echo)
//! - Transport kind and the user record size in force

use std::fmt;

use crate::constants::{MAX_CHUNK_TCP, MAX_CHUNK_UDP, USHRT_MAX};

/// Underlying transport of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Tcp,
    Udp,
}

impl TransportKind {
    /// Largest chunk requested per buffered read
    pub fn max_chunk(self) -> usize {
        match self {
            Self::Tcp => MAX_CHUNK_TCP,
            Self::Udp => MAX_CHUNK_UDP,
        }
    }

    pub fn is_tcp(self) -> bool {
        matches!(self, Self::Tcp)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        })
    }
}

/// Session state
///
/// Owned by exactly one command channel. Every mutation goes through
/// `&mut self`, so two commands can never interleave on one session.
#[derive(Debug, Clone)]
pub struct Session {
    session_id: u16,
    reply_id: u16,
    connected: bool,
    kind: TransportKind,
    user_packet_size: usize,
}

impl Session {
    /// Initial reply ID (USHRT_MAX - 1)
    pub const INITIAL_REPLY_ID: u16 = USHRT_MAX - 1;

    /// Legacy user record size, used until a probe or the user table says otherwise
    pub const LEGACY_USER_SIZE: usize = 28;

    /// Extended user record size
    pub const EXTENDED_USER_SIZE: usize = 72;

    /// Create a new disconnected session
    pub fn new(kind: TransportKind) -> Self {
        Self {
            session_id: 0,
            reply_id: Self::INITIAL_REPLY_ID,
            connected: false,
            kind,
            user_packet_size: Self::LEGACY_USER_SIZE,
        }
    }

    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    pub fn reply_id(&self) -> u16 {
        self.reply_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// User record size in force (28 or 72)
    pub fn user_packet_size(&self) -> usize {
        self.user_packet_size
    }

    pub fn set_user_packet_size(&mut self, size: usize) {
        self.user_packet_size = size;
    }

    /// Reset ids before a handshake
    pub fn begin(&mut self) {
        self.session_id = 0;
        self.reply_id = Self::INITIAL_REPLY_ID;
        self.connected = false;
    }

    /// Adopt the session id assigned by the device
    pub fn adopt(&mut self, session_id: u16) {
        self.session_id = session_id;
    }

    /// Mark the handshake complete
    pub fn establish(&mut self) {
        self.connected = true;
    }

    /// Record the reply id carried by a request just sent
    pub fn sent(&mut self, reply_id: u16) {
        self.reply_id = reply_id;
    }

    /// Record the reply id echoed by the device
    pub fn acknowledged(&mut self, reply_id: u16) {
        self.reply_id = reply_id;
    }

    /// Close the session (disconnect, restart, power off)
    pub fn close(&mut self) {
        self.session_id = 0;
        self.reply_id = Self::INITIAL_REPLY_ID;
        self.connected = false;
    }
}
