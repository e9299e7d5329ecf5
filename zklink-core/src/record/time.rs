//! Timestamp encodings
//!
//! Two schemes are in use:
//!
//! - a packed `u32` counting seconds on a calendar where every month has
//!   31 days and every year 12 months (clock get/set, attendance logs)
//! - six raw bytes `Y-2000 M D h m s` (live events)

use byteorder::{ByteOrder, LittleEndian};
use zklink_types::DeviceTime;

use super::ensure_len;
use crate::error::Result;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Pack a timestamp into the terminal's 31-day arithmetic
///
/// ```
/// use zklink_core::record::time::encode_time;
/// use zklink_types::DeviceTime;
///
/// assert_eq!(encode_time(&DeviceTime::new(2000, 1, 1, 0, 0, 0)), 0);
/// ```
pub fn encode_time(t: &DeviceTime) -> u32 {
    let days = (t.year as u64 % 100) * 12 * 31
        + (t.month as u64).saturating_sub(1) * 31
        + (t.day as u64).saturating_sub(1);
    let seconds = (t.hour as u64 * 60 + t.minute as u64) * 60 + t.second as u64;
    (days * SECONDS_PER_DAY + seconds) as u32
}

/// Unpack a timestamp produced by [`encode_time`]
pub fn decode_time(raw: u32) -> DeviceTime {
    let mut t = raw;
    let second = (t % 60) as u8;
    t /= 60;
    let minute = (t % 60) as u8;
    t /= 60;
    let hour = (t % 24) as u8;
    t /= 24;
    let day = (t % 31 + 1) as u8;
    t /= 31;
    let month = (t % 12 + 1) as u8;
    t /= 12;
    let year = (t + 2000) as u16;

    DeviceTime::new(year, month, day, hour, minute, second)
}

/// Decode a packed timestamp from its 4 little-endian bytes
pub fn decode_time_bytes(data: &[u8]) -> Result<DeviceTime> {
    ensure_len("time", data, 4)?;
    Ok(decode_time(LittleEndian::read_u32(data)))
}

/// Decode the 6-byte form used by live events
pub fn decode_hex_time(data: &[u8]) -> Result<DeviceTime> {
    ensure_len("time", data, 6)?;
    Ok(DeviceTime::new(
        data[0] as u16 + 2000,
        data[1],
        data[2],
        data[3],
        data[4],
        data[5],
    ))
}

/// Encode the 6-byte form used by live events
pub fn encode_hex_time(t: &DeviceTime) -> [u8; 6] {
    [
        (t.year % 100) as u8,
        t.month,
        t.day,
        t.hour,
        t.minute,
        t.second,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_known_value() {
        let t = DeviceTime::new(2024, 3, 15, 10, 30, 45);
        assert_eq!(encode_time(&t), 777_983_445);
        assert_eq!(decode_time(777_983_445), t);
    }

    #[test]
    fn test_upper_bound_fits_u32() {
        let t = DeviceTime::new(2099, 12, 31, 23, 59, 59);
        assert_eq!(encode_time(&t), 3_214_079_999);
        assert_eq!(decode_time(3_214_079_999), t);
    }

    #[test]
    fn test_thirty_first_of_february_survives() {
        let t = DeviceTime::new(2023, 2, 31, 8, 0, 0);
        assert_eq!(decode_time(encode_time(&t)), t);
        assert!(t.to_naive().is_none());
    }

    #[test]
    fn test_decode_bytes() {
        let raw = 777_983_445u32.to_le_bytes();
        assert_eq!(decode_time_bytes(&raw).unwrap(), DeviceTime::new(2024, 3, 15, 10, 30, 45));
        assert!(decode_time_bytes(&raw[..3]).is_err());
    }

    #[test]
    fn test_hex_time() {
        let t = decode_hex_time(&[24, 3, 15, 10, 30, 45]).unwrap();
        assert_eq!(t, DeviceTime::new(2024, 3, 15, 10, 30, 45));
        assert_eq!(encode_hex_time(&t), [24, 3, 15, 10, 30, 45]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2048))]

        #[test]
        fn packed_round_trip(
            year in 0u16..100,
            month in 1u8..=12,
            day in 1u8..=31,
            hour in 0u8..24,
            minute in 0u8..60,
            second in 0u8..60,
        ) {
            let t = DeviceTime::new(2000 + year, month, day, hour, minute, second);
            prop_assert_eq!(decode_time(encode_time(&t)), t);
        }
    }
}
