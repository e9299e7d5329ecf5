//! Attendance log records
//!
//! The log read back with `CMD_ATTLOG_RRQ` starts with a `u32` total size.
//! Dividing it by the record count reported in the free-sizes block gives
//! the record width, which alone tells the layouts apart:
//!
//! ```text
//! compact (8)    uid u16 | status u8 | time u32 | punch u8
//! standard (16)  user_id u32 | time u32 | status u8 | punch u8 | reserved 2 | workcode u32
//! extended (40)  uid u16 | user_id 24 | status u8 | time u32 | punch u8 | reserved 8
//! ```

use byteorder::{ByteOrder, LittleEndian};
use zklink_types::Attendance;

use super::{read_str, time::decode_time_bytes};
use crate::error::{Error, Result};

/// Width of the extended layout once padded
const EXTENDED_SIZE: usize = 40;

/// Wire layout of an attendance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceLayout {
    Compact,
    Standard,
    /// Record width as reported, at least 24 bytes
    Extended(usize),
}

impl AttendanceLayout {
    /// Bytes consumed per record
    pub fn size(self) -> usize {
        match self {
            Self::Compact => 8,
            Self::Standard => 16,
            Self::Extended(size) => size,
        }
    }

    /// Layout implied by a log of `total_size` bytes holding `records` entries
    ///
    /// # Errors
    ///
    /// [`Error::UnknownRecordLength`] for widths other than 8, 16 or 24 and up.
    pub fn select(total_size: usize, records: usize) -> Result<Self> {
        let size = total_size.checked_div(records).unwrap_or(0);
        match size {
            8 => Ok(Self::Compact),
            16 => Ok(Self::Standard),
            n if n >= 24 => Ok(Self::Extended(n)),
            length => Err(Error::UnknownRecordLength {
                record: "attendance",
                length,
            }),
        }
    }
}

/// Decode one record
///
/// `uid` and `user_id` are taken from the record as-is; mapping between
/// them through the user table is left to the caller. Extended records
/// shorter than 40 bytes are zero-padded before decoding.
pub fn decode_attendance(layout: AttendanceLayout, record: &[u8]) -> Result<Attendance> {
    super::ensure_len("attendance", record, layout.size())?;

    let attendance = match layout {
        AttendanceLayout::Compact => {
            let uid = LittleEndian::read_u16(&record[0..2]);
            Attendance {
                user_id: uid.to_string(),
                uid,
                status: record[2],
                timestamp: decode_time_bytes(&record[3..7])?,
                punch: record[7],
            }
        }
        AttendanceLayout::Standard => {
            let user_id = LittleEndian::read_u32(&record[0..4]);
            Attendance {
                user_id: user_id.to_string(),
                uid: u16::try_from(user_id).unwrap_or(0),
                timestamp: decode_time_bytes(&record[4..8])?,
                status: record[8],
                punch: record[9],
            }
        }
        AttendanceLayout::Extended(size) => {
            let mut padded = [0u8; EXTENDED_SIZE];
            let n = size.min(EXTENDED_SIZE);
            padded[..n].copy_from_slice(&record[..n]);

            Attendance {
                uid: LittleEndian::read_u16(&padded[0..2]),
                user_id: read_str(&padded[2..26]),
                status: padded[26],
                timestamp: decode_time_bytes(&padded[27..31])?,
                punch: padded[31],
            }
        }
    };

    Ok(attendance)
}

/// Decode the records of an attendance log, ignoring a trailing partial record
pub fn decode_attendances(layout: AttendanceLayout, data: &[u8]) -> Result<Vec<Attendance>> {
    data.chunks_exact(layout.size())
        .map(|record| decode_attendance(layout, record))
        .collect()
}
