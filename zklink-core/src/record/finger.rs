//! Fingerprint template records
//!
//! ```text
//! stored template (CMD_DB_RRQ / FCT_FINGERTMP)
//! ┌──────────┬──────┬──────┬───────┬──────────────┐
//! │ size + 6 │ uid  │ fid  │ valid │   template   │
//! │   u16    │ u16  │  i8  │  i8   │   size - 6   │
//! └──────────┴──────┴──────┴───────┴──────────────┘
//! ```

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};
use zklink_types::{Finger, User};

use super::user::{UserLayout, encode_user_for_batch};
use crate::error::{Error, Result};

/// Size of the per-template header
pub const TEMPLATE_HEADER_SIZE: usize = 6;

/// Finger numbers in the upload table start here
const TABLE_FINGER_BASE: u8 = 0x10;

/// Decode the fingerprint table returned by a buffered read
///
/// The first four bytes hold the announced total size. Records follow
/// until that total is consumed or fewer than six bytes remain.
///
/// # Errors
///
/// A record announcing fewer than six bytes cannot advance the cursor and
/// is reported as [`Error::UnknownRecordLength`].
pub fn decode_templates(data: &[u8]) -> Result<Vec<Finger>> {
    if data.len() < 4 {
        return Ok(Vec::new());
    }

    let mut total = LittleEndian::read_i32(&data[..4]) as i64;
    let mut rest = &data[4..];
    let mut templates = Vec::new();

    debug!(total, available = rest.len(), "Decoding fingerprint templates");

    while total > 0 && rest.len() >= TEMPLATE_HEADER_SIZE {
        let size = LittleEndian::read_u16(&rest[0..2]) as usize;
        if size < TEMPLATE_HEADER_SIZE {
            return Err(Error::UnknownRecordLength {
                record: "template",
                length: size,
            });
        }

        let end = if size > rest.len() {
            warn!(size, remaining = rest.len(), "Template record overruns buffer, keeping the remainder");
            rest.len()
        } else {
            size
        };

        let uid = LittleEndian::read_u16(&rest[2..4]);
        let fid = rest[4];
        let valid = rest[5];
        templates.push(Finger::new(uid, fid, valid, Bytes::copy_from_slice(&rest[6..end])));

        rest = &rest[end..];
        total -= size as i64;
    }

    Ok(templates)
}

/// Encode a template with its full header
pub fn encode_template(finger: &Finger) -> BytesMut {
    let mut buf = BytesMut::with_capacity(TEMPLATE_HEADER_SIZE + finger.size());
    buf.put_u16_le((finger.size() + TEMPLATE_HEADER_SIZE) as u16);
    buf.put_u16_le(finger.uid);
    buf.put_u8(finger.fid);
    buf.put_u8(finger.valid);
    buf.put_slice(&finger.template);
    buf
}

/// Encode a template as `size` + bytes, the form used in batch uploads
pub fn encode_template_only(finger: &Finger) -> BytesMut {
    let mut buf = BytesMut::with_capacity(2 + finger.size());
    buf.put_u16_le(finger.size() as u16);
    buf.put_slice(&finger.template);
    buf
}

/// Strip the padding from a `CMD_GET_USERTEMP` reply
///
/// The reply carries one trailing byte, and some firmware adds six zero
/// bytes before it.
pub fn trim_user_template(data: &[u8]) -> &[u8] {
    let data = &data[..data.len().saturating_sub(1)];
    match data.len().checked_sub(6) {
        Some(cut) if data[cut..].iter().all(|&b| b == 0) => &data[..cut],
        _ => data,
    }
}

/// Build the batch upload buffer for users and their templates
///
/// ```text
/// ┌─────────────────────────────┬───────┬───────┬───────────┐
/// │ users_len  table_len  fp_len │ users │ table │ templates │
/// │   u32        u32        u32  │       │       │           │
/// └─────────────────────────────┴───────┴───────┴───────────┘
/// ```
///
/// Each table entry is `2 u8, uid u16, 0x10 + fid u8, offset u32`, the
/// offset pointing into the templates section.
pub fn encode_user_templates(layout: UserLayout, entries: &[(User, Vec<Finger>)]) -> Result<BytesMut> {
    let mut users = BytesMut::new();
    let mut table = BytesMut::new();
    let mut templates = BytesMut::new();

    for (user, fingers) in entries {
        users.extend_from_slice(&encode_user_for_batch(layout, user)?);

        for finger in fingers {
            table.put_u8(2);
            table.put_u16_le(user.uid);
            table.put_u8(TABLE_FINGER_BASE.wrapping_add(finger.fid));
            table.put_u32_le(templates.len() as u32);
            templates.extend_from_slice(&encode_template_only(finger));
        }
    }

    let mut buf = BytesMut::with_capacity(12 + users.len() + table.len() + templates.len());
    buf.put_u32_le(users.len() as u32);
    buf.put_u32_le(table.len() as u32);
    buf.put_u32_le(templates.len() as u32);
    buf.extend_from_slice(&users);
    buf.extend_from_slice(&table);
    buf.extend_from_slice(&templates);

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table_of(fingers: &[Finger]) -> Vec<u8> {
        let body: Vec<u8> = fingers.iter().flat_map(|f| encode_template(f).to_vec()).collect();
        let mut data = (body.len() as i32).to_le_bytes().to_vec();
        data.extend_from_slice(&body);
        data
    }

    #[test]
    fn test_decode_templates() {
        let fingers = vec![
            Finger::new(1, 0, 1, vec![0xAA; 10]),
            Finger::new(1, 6, 1, vec![0xBB; 3]),
            Finger::new(9, 2, 0, vec![0xCC; 40]),
        ];

        let decoded = decode_templates(&table_of(&fingers)).unwrap();
        assert_eq!(decoded, fingers);
    }

    #[test]
    fn test_decode_header_bytes() {
        let data = [22, 0, 0, 0, 22, 0, 0x05, 0x00, 3, 1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
        let decoded = decode_templates(&data).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].uid, 5);
        assert_eq!(decoded[0].fid, 3);
        assert_eq!(decoded[0].size(), 16);
    }

    #[test]
    fn test_decode_rejects_short_record() {
        let data = [8, 0, 0, 0, 4, 0, 1, 0, 0, 1, 0, 0];
        assert!(matches!(
            decode_templates(&data),
            Err(Error::UnknownRecordLength { record: "template", length: 4 })
        ));
    }

    #[test]
    fn test_decode_overrun_takes_remainder() {
        let mut data = vec![100, 0, 0, 0, 100, 0, 2, 0, 1, 1];
        data.extend_from_slice(&[7; 10]);

        let decoded = decode_templates(&data).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].template.as_ref(), &[7; 10]);
    }

    #[test]
    fn test_decode_empty() {
        assert!(decode_templates(&[]).unwrap().is_empty());
        assert!(decode_templates(&[0, 0, 0, 0]).unwrap().is_empty());
    }

    #[test]
    fn test_trim_user_template() {
        assert_eq!(trim_user_template(&[1, 2, 3, 0, 0, 0, 0, 0, 0, 9]), &[1, 2, 3]);
        assert_eq!(trim_user_template(&[1, 2, 3, 4, 9]), &[1, 2, 3, 4]);
        assert_eq!(trim_user_template(&[]), &[] as &[u8]);
    }

    #[test]
    fn test_encode_template_only() {
        let finger = Finger::new(3, 1, 1, vec![1, 2, 3]);
        assert_eq!(encode_template_only(&finger).as_ref(), &[3, 0, 1, 2, 3]);
    }

    #[test]
    fn test_encode_user_templates() {
        let user = User {
            uid: 7,
            name: "Ana".into(),
            privilege: 0,
            password: String::new(),
            group_id: String::new(),
            user_id: "7".into(),
            card: 0,
        };
        let fingers = vec![Finger::new(7, 0, 1, vec![0xAA; 4]), Finger::new(7, 5, 1, vec![0xBB; 2])];

        let buf = encode_user_templates(UserLayout::Legacy, &[(user, fingers)]).unwrap();

        assert_eq!(&buf[0..12], &[29, 0, 0, 0, 16, 0, 0, 0, 10, 0, 0, 0]);
        assert_eq!(buf[12], 0x02);

        let table = &buf[12 + 29..12 + 29 + 16];
        assert_eq!(table, &[2, 7, 0, 0x10, 0, 0, 0, 0, 2, 7, 0, 0x15, 6, 0, 0, 0]);

        let templates = &buf[12 + 29 + 16..];
        assert_eq!(templates, &[4, 0, 0xAA, 0xAA, 0xAA, 0xAA, 2, 0, 0xBB, 0xBB]);
    }
}
