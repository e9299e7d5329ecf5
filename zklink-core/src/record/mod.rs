//! Fixed-width binary records
//!
//! Every decoder here is pure: it takes the bytes the terminal sent and
//! returns the plain holders from `zklink-types`. Layouts are picked by byte
//! length because the terminal never tags them.

pub mod attendance;
pub mod event;
pub mod finger;
pub mod sizes;
pub mod time;
pub mod user;

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};

/// Text up to the first NUL or the end of the field
pub(crate) fn read_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Write `value` into a zero-padded field of exactly `width` bytes
pub(crate) fn put_str(buf: &mut BytesMut, value: &str, width: usize) {
    let bytes = value.as_bytes();
    let n = bytes.len().min(width);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(0, width - n);
}

pub(crate) fn ensure_len(record: &'static str, data: &[u8], expected: usize) -> Result<()> {
    if data.len() < expected {
        return Err(Error::TruncatedRecord {
            record,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}
