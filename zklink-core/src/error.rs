//! Error types for zklink-core

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Packet is too short to be valid
    #[error("Packet too short: expected at least {expected} bytes, got {actual} bytes")]
    PacketTooShort {
        expected: usize,
        actual: usize,
    },

    /// Checksum verification failed (strict mode only)
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Unknown command code
    #[error("Unknown command code: {0}")]
    UnknownCommand(u16),

    /// TCP top frame does not start with the magic words
    #[error("Invalid TCP frame magic: 0x{magic1:04X} 0x{magic2:04X}")]
    InvalidFrame {
        magic1: u16,
        magic2: u16,
    },

    /// TCP top frame announces an implausible length
    #[error("TCP frame too large: {size} bytes (max: {max} bytes)")]
    FrameTooLarge {
        size: usize,
        max: usize,
    },

    /// A record's byte length matches none of the known layouts
    #[error("Unknown {record} record length: {length} bytes")]
    UnknownRecordLength {
        record: &'static str,
        length: usize,
    },

    /// A record is shorter than its layout requires
    #[error("Truncated {record} record: expected {expected} bytes, got {actual} bytes")]
    TruncatedRecord {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A value cannot be represented in its wire field
    #[error(transparent)]
    Value(#[from] zklink_types::Error),
}

impl Error {
    /// Check if the error means the byte stream could not be split into records
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::InvalidFrame { .. }
                | Self::FrameTooLarge { .. }
                | Self::UnknownRecordLength { .. }
                | Self::TruncatedRecord { .. }
        )
    }
}
