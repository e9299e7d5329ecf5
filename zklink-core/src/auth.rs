//! CommKey challenge response
//!
//! Terminals with a communication password answer `CMD_CONNECT` with
//! `CMD_ACK_UNAUTH`. The client then proves knowledge of the password by
//! sending a 4-byte key derived from the password and the session id the
//! device just assigned.

use bytes::Bytes;

use crate::constants::DEFAULT_TICKS;

const TAG: [u8; 4] = *b"ZKSO";

/// Derive the `CMD_AUTH` payload from password and session id
///
/// # Algorithm
///
/// 1. Reverse the 32 bits of the password
/// 2. Add the session id (wrapping)
/// 3. XOR the little-endian bytes with `"ZKSO"`
/// 4. Swap the two 16-bit halves
/// 5. XOR bytes 0, 1 and 3 with `ticks`, replace byte 2 with `ticks`
///
/// # Examples
///
/// ```
/// use zklink_core::auth;
///
/// let key = auth::make_commkey(0, 0, 50);
/// assert_eq!(key.as_ref(), &[0x61, 0x7D, 0x32, 0x79]);
/// ```
pub fn make_commkey(password: u32, session_id: u16, ticks: u8) -> Bytes {
    let k = password.reverse_bits().wrapping_add(session_id as u32);

    let mut scrambled = k.to_le_bytes();
    for (byte, tag) in scrambled.iter_mut().zip(TAG) {
        *byte ^= tag;
    }

    let mut key = [scrambled[2], scrambled[3], scrambled[0], scrambled[1]];
    key[0] ^= ticks;
    key[1] ^= ticks;
    key[2] = ticks;
    key[3] ^= ticks;

    Bytes::copy_from_slice(&key)
}

/// [`make_commkey`] with the default ticks byte
pub fn commkey(password: u32, session_id: u16) -> Bytes {
    make_commkey(password, session_id, DEFAULT_TICKS)
}
