//! Protocol constants

use bitflags::bitflags;

/// TCP top frame magic words
pub const TCP_MAGIC_1: u16 = 0x5050;
pub const TCP_MAGIC_2: u16 = 0x7D82;

/// Upper bound used by the reply-id wrap and checksum fold
pub const USHRT_MAX: u16 = 0xFFFF;

/// Default CommKey ticks byte
pub const DEFAULT_TICKS: u8 = 50;

/// Attempts per chunk in buffered reads
pub const MAX_RETRIES: usize = 3;

/// Largest chunk requested per `_CMD_READ_BUFFER` over TCP
pub const MAX_CHUNK_TCP: usize = 0xFFC0;

/// Largest chunk requested per `_CMD_READ_BUFFER` over UDP
pub const MAX_CHUNK_UDP: usize = 16 * 1024;

/// Largest `CMD_DATA` packet sent when uploading
pub const MAX_DATA_CHUNK: usize = 1024;

bitflags! {
    /// Real-time event registration mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventFlags: u32 {
        /// Attendance log
        const ATTLOG = 1;
        /// Fingerprint pressed
        const FINGER = 1 << 1;
        /// User enrolled
        const ENROLL_USER = 1 << 2;
        /// Fingerprint enrolled
        const ENROLL_FINGER = 1 << 3;
        /// Button pressed
        const BUTTON = 1 << 4;
        /// Door unlocked
        const UNLOCK = 1 << 5;
        /// Verification event
        const VERIFY = 1 << 7;
        /// Fingerprint minutiae captured
        const FPFTR = 1 << 8;
        /// Alarm signal
        const ALARM = 1 << 9;
    }
}

/// Function codes selecting the data set of a buffered read
pub mod data_types {
    /// Attendance log
    pub const FCT_ATTLOG: u8 = 1;

    /// Fingerprint template
    pub const FCT_FINGERTMP: u8 = 2;

    /// Operation log
    pub const FCT_OPLOG: u8 = 4;

    /// User record
    pub const FCT_USER: u8 = 5;

    /// SMS
    pub const FCT_SMS: u8 = 6;

    /// User data
    pub const FCT_UDATA: u8 = 7;

    /// Work code
    pub const FCT_WORKCODE: u8 = 8;
}
