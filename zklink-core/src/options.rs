//! Device option strings
//!
//! `CMD_OPTIONS_RRQ` takes a NUL-terminated key, optionally prefixed with
//! `~` for read-only system values, and answers `key=value\0`.

use bytes::{BufMut, Bytes, BytesMut};

/// Request payload for `key`
///
/// ```
/// use zklink_core::options;
///
/// assert_eq!(options::request("~Platform").as_ref(), b"~Platform\0");
/// ```
pub fn request(key: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(key.len() + 1);
    buf.put_slice(key.as_bytes());
    buf.put_u8(0);
    buf.freeze()
}

/// Value between the first `=` and the following NUL
///
/// Without `=` the whole text up to the NUL is returned.
///
/// ```
/// use zklink_core::options;
///
/// assert_eq!(options::value(b"~SerialNumber=A8N5201260153\0\0\0"), "A8N5201260153");
/// ```
pub fn value(payload: &[u8]) -> String {
    let start = payload
        .iter()
        .position(|&b| b == b'=')
        .map_or(0, |pos| pos + 1);
    let rest = &payload[start..];
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    String::from_utf8_lossy(&rest[..end]).into_owned()
}

/// Numeric option value, `None` when it does not parse
pub fn numeric(payload: &[u8]) -> Option<u32> {
    value(payload).trim().parse().ok()
}
