//! `CMD_GET_FREE_SIZES` reply
//!
//! Twenty little-endian `i32` counters, optionally followed by three more
//! on terminals with a face reader.

use byteorder::{ByteOrder, LittleEndian};
use zklink_types::DeviceSizes;

const BASE_FIELDS: usize = 20;
const FACE_FIELDS: usize = 3;

fn field(data: &[u8], index: usize) -> u32 {
    let at = index * 4;
    LittleEndian::read_i32(&data[at..at + 4]).max(0) as u32
}

/// Decode the counters block
///
/// A block shorter than the twenty base counters decodes to all zeros.
pub fn decode_sizes(payload: &[u8]) -> DeviceSizes {
    let mut sizes = DeviceSizes::default();
    if payload.len() < BASE_FIELDS * 4 {
        return sizes;
    }

    sizes.users = field(payload, 4);
    sizes.fingers = field(payload, 6);
    sizes.records = field(payload, 8);
    sizes.dummy = field(payload, 10);
    sizes.cards = field(payload, 12);
    sizes.fingers_cap = field(payload, 14);
    sizes.users_cap = field(payload, 15);
    sizes.records_cap = field(payload, 16);
    sizes.fingers_available = field(payload, 17);
    sizes.users_available = field(payload, 18);
    sizes.records_available = field(payload, 19);

    let rest = &payload[BASE_FIELDS * 4..];
    if rest.len() >= FACE_FIELDS * 4 {
        sizes.faces = Some(field(rest, 0));
        sizes.faces_cap = Some(field(rest, 2));
    }

    sizes
}
