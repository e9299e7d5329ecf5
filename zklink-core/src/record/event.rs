//! Live event sub-records
//!
//! A `CMD_REG_EVENT` payload packs one or more punches back to back. The
//! layout is chosen by the number of bytes left in the payload:
//!
//! | left  | user id        | trailer |
//! |-------|----------------|---------|
//! | 10    | u16            | -       |
//! | 12    | u32            | -       |
//! | 14    | u16            | 4       |
//! | 32    | 24-byte string | -       |
//! | 36    | 24-byte string | 4       |
//! | 37    | 24-byte string | 5       |
//! | >= 52 | 24-byte string | 20      |
//!
//! Every layout continues with `status u8, punch u8, time[6]`.

use byteorder::{ByteOrder, LittleEndian};
use zklink_types::Attendance;

use super::{read_str, time::decode_hex_time};
use crate::error::{Error, Result};

/// Smallest sub-record
pub const MIN_EVENT_SIZE: usize = 10;

#[derive(Debug, Clone, Copy)]
enum UserIdField {
    Short,
    Long,
    Text,
}

/// Pick the layout for `remaining` bytes: (user id field, bytes consumed)
fn layout_for(remaining: usize) -> Option<(UserIdField, usize)> {
    match remaining {
        10 => Some((UserIdField::Short, 10)),
        12 => Some((UserIdField::Long, 12)),
        14 => Some((UserIdField::Short, 14)),
        32 => Some((UserIdField::Text, 32)),
        36 => Some((UserIdField::Text, 36)),
        37 => Some((UserIdField::Text, 37)),
        n if n >= 52 => Some((UserIdField::Text, 52)),
        _ => None,
    }
}

/// Decode every punch packed in a `CMD_REG_EVENT` payload
///
/// `uid` is the numeric value of the user id when it parses, otherwise 0;
/// the caller maps it through the user table. Fewer than ten trailing
/// bytes are ignored.
///
/// # Errors
///
/// [`Error::UnknownRecordLength`] when the bytes left match no layout. The
/// rest of the payload is abandoned.
///
/// # Examples
///
/// ```
/// use zklink_core::record::event::decode_live_events;
///
/// let payload = [7, 0, 1, 0, 24, 3, 15, 10, 30, 45];
/// let events = decode_live_events(&payload).unwrap();
/// assert_eq!(events[0].user_id, "7");
/// ```
pub fn decode_live_events(payload: &[u8]) -> Result<Vec<Attendance>> {
    let mut rest = payload;
    let mut events = Vec::new();

    while rest.len() >= MIN_EVENT_SIZE {
        let Some((field, consumed)) = layout_for(rest.len()) else {
            return Err(Error::UnknownRecordLength {
                record: "live event",
                length: rest.len(),
            });
        };

        let (user_id, offset) = match field {
            UserIdField::Short => (LittleEndian::read_u16(&rest[0..2]).to_string(), 2),
            UserIdField::Long => (LittleEndian::read_u32(&rest[0..4]).to_string(), 4),
            UserIdField::Text => (read_str(&rest[0..24]), 24),
        };

        events.push(Attendance {
            uid: user_id.parse().unwrap_or(0),
            status: rest[offset],
            punch: rest[offset + 1],
            timestamp: decode_hex_time(&rest[offset + 2..offset + 8])?,
            user_id,
        });

        rest = &rest[consumed..];
    }

    Ok(events)
}
