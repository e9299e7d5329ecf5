//! ZKTeco checksum algorithm
//!
//! The terminal sums the header (checksum field zeroed) and payload as
//! little-endian 16-bit words, folding by 0xFFFF whenever the running sum
//! overflows 16 bits, and sends the complement normalized into
//! `0..0xFFFF`. The result is never 0xFFFF.

use tracing::trace;

use crate::constants::USHRT_MAX;

/// Checksum of an arbitrary byte buffer
///
/// # Algorithm
///
/// ```text
/// 1. sum += word (LE u16); if sum > 0xFFFF: sum -= 0xFFFF
/// 2. odd trailing byte is added as-is
/// 3. while sum > 0xFFFF: sum -= 0xFFFF
/// 4. c = !sum (signed); while c < 0: c += 0xFFFF
/// ```
///
/// # Examples
///
/// ```
/// use zklink_core::checksum;
///
/// assert_eq!(checksum::checksum(&[]), 0xFFFE);
/// ```
pub fn checksum(data: &[u8]) -> u16 {
    let max = USHRT_MAX as i64;
    let mut sum: i64 = 0;

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u16::from_le_bytes([word[0], word[1]]) as i64;
        if sum > max {
            sum -= max;
        }
    }
    if let [odd] = words.remainder() {
        sum += *odd as i64;
    }

    while sum > max {
        sum -= max;
    }

    let mut complement = !sum;
    while complement < 0 {
        complement += max;
    }

    complement as u16
}

/// Checksum of a command header plus payload
///
/// ```
/// use zklink_core::checksum;
///
/// // CMD_CONNECT with the initial reply id
/// assert_eq!(checksum::calculate(1000, 0, 65534, &[]), 0xFC17);
/// ```
pub fn calculate(command: u16, session_id: u16, reply_id: u16, payload: &[u8]) -> u16 {
    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(&command.to_le_bytes());
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(&session_id.to_le_bytes());
    buf.extend_from_slice(&reply_id.to_le_bytes());
    buf.extend_from_slice(payload);

    let checksum = checksum(&buf);

    trace!(
        command = command,
        session_id = session_id,
        reply_id = reply_id,
        payload_len = payload.len(),
        checksum = format!("0x{:04X}", checksum),
        "Calculated checksum"
    );

    checksum
}

/// Verify checksum
pub fn verify(command: u16, session_id: u16, reply_id: u16, payload: &[u8], expected: u16) -> bool {
    calculate(command, session_id, reply_id, payload) == expected
}
