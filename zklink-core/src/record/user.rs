//! User records
//!
//! ```text
//! legacy (28 bytes)
//! ┌──────┬──────┬──────────┬─────────┬──────┬─────┬───────┬──────────┬─────────┐
//! │ uid  │ priv │ password │  name   │ card │ pad │ group │ reserved │ user_id │
//! │ u16  │  u8  │    5     │    8    │ u32  │  1  │  u8   │   i16    │   u32   │
//! └──────┴──────┴──────────┴─────────┴──────┴─────┴───────┴──────────┴─────────┘
//!
//! extended (72 bytes)
//! ┌──────┬──────┬──────────┬─────────┬──────┬─────┬───────┬─────┬─────────┐
//! │ uid  │ priv │ password │  name   │ card │ pad │ group │ pad │ user_id │
//! │ u16  │  u8  │    8     │   24    │ u32  │  1  │   7   │  1  │   24    │
//! └──────┴──────┴──────────┴─────────┴──────┴─────┴───────┴─────┴─────────┘
//! ```

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, BytesMut};
use tracing::warn;
use zklink_types::{Error as ValueError, User};

use super::{ensure_len, put_str, read_str};
use crate::error::Result;

/// Marker byte opening each user in a batch upload
const BATCH_MARKER: u8 = 0x02;

/// Wire layout of a user record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserLayout {
    /// 28-byte record with numeric user id and group
    Legacy,
    /// 72-byte record with textual user id and group
    Extended,
}

impl UserLayout {
    pub const LEGACY_SIZE: usize = 28;
    pub const EXTENDED_SIZE: usize = 72;

    pub const fn size(self) -> usize {
        match self {
            Self::Legacy => Self::LEGACY_SIZE,
            Self::Extended => Self::EXTENDED_SIZE,
        }
    }

    pub fn from_size(size: usize) -> Option<Self> {
        match size {
            Self::LEGACY_SIZE => Some(Self::Legacy),
            Self::EXTENDED_SIZE => Some(Self::Extended),
            _ => None,
        }
    }

    /// Layout implied by a user table of `total_size` bytes holding `count` users
    ///
    /// A quotient other than 28 or 72 is logged and read as extended records.
    ///
    /// ```
    /// use zklink_core::record::user::UserLayout;
    ///
    /// assert_eq!(UserLayout::select(2800, 100), UserLayout::Legacy);
    /// assert_eq!(UserLayout::select(7200, 100), UserLayout::Extended);
    /// ```
    pub fn select(total_size: usize, count: usize) -> Self {
        let record_size = total_size.checked_div(count).unwrap_or(0);
        Self::from_size(record_size).unwrap_or_else(|| {
            warn!(total_size, count, record_size, "Unexpected user record size, reading as 72-byte records");
            Self::Extended
        })
    }
}

/// Decode one user record
pub fn decode_user(layout: UserLayout, record: &[u8]) -> Result<User> {
    ensure_len("user", record, layout.size())?;

    let mut user = match layout {
        UserLayout::Legacy => User {
            uid: LittleEndian::read_u16(&record[0..2]),
            privilege: record[2],
            password: read_str(&record[3..8]),
            name: read_str(&record[8..16]).trim().to_string(),
            card: LittleEndian::read_u32(&record[16..20]) as u64,
            group_id: record[21].to_string(),
            user_id: LittleEndian::read_u32(&record[24..28]).to_string(),
        },
        UserLayout::Extended => User {
            uid: LittleEndian::read_u16(&record[0..2]),
            privilege: record[2],
            password: read_str(&record[3..11]),
            name: read_str(&record[11..35]).trim().to_string(),
            card: LittleEndian::read_u32(&record[35..39]) as u64,
            group_id: read_str(&record[40..47]).trim().to_string(),
            user_id: read_str(&record[48..72]),
        },
    };

    if user.name.is_empty() {
        user.name = format!("NN-{}", user.user_id);
    }

    Ok(user)
}

/// Decode consecutive records, ignoring a trailing partial record
pub fn decode_users(layout: UserLayout, data: &[u8]) -> Result<Vec<User>> {
    data.chunks_exact(layout.size())
        .map(|record| decode_user(layout, record))
        .collect()
}

/// Encode a user for `CMD_USER_WRQ`
///
/// # Errors
///
/// The legacy layout needs a numeric user id and group below 256; both
/// layouts need a card number that fits 32 bits.
pub fn encode_user(layout: UserLayout, user: &User) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(layout.size());
    put_user(&mut buf, layout, user, 0)?;
    Ok(buf)
}

/// Encode a user for a batch template upload (`0x02` + record)
pub fn encode_user_for_batch(layout: UserLayout, user: &User) -> Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(layout.size() + 1);
    buf.put_u8(BATCH_MARKER);
    let flag = match layout {
        UserLayout::Legacy => 0,
        UserLayout::Extended => 1,
    };
    put_user(&mut buf, layout, user, flag)?;
    Ok(buf)
}

fn put_user(buf: &mut BytesMut, layout: UserLayout, user: &User, flag: u8) -> Result<()> {
    let card = u32::try_from(user.card)
        .map_err(|_| ValueError::Validation(format!("card {} does not fit 32 bits", user.card)))?;

    buf.put_u16_le(user.uid);
    buf.put_u8(user.privilege);

    match layout {
        UserLayout::Legacy => {
            let group = parse_numeric::<u8>("group id", &user.group_id)?;
            let user_id = parse_numeric::<u32>("user id", &user.user_id)?;

            put_str(buf, &user.password, 5);
            put_str(buf, &user.name, 8);
            buf.put_u32_le(card);
            buf.put_u8(flag);
            buf.put_u8(group);
            buf.put_i16_le(0);
            buf.put_u32_le(user_id);
        }
        UserLayout::Extended => {
            put_str(buf, &user.password, 8);
            put_str(buf, &user.name, 24);
            buf.put_u32_le(card);
            buf.put_u8(flag);
            put_str(buf, &user.group_id, 7);
            buf.put_u8(0);
            put_str(buf, &user.user_id, 24);
        }
    }

    Ok(())
}

fn parse_numeric<T: std::str::FromStr + Default>(field: &'static str, value: &str) -> Result<T> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(T::default());
    }
    value
        .parse()
        .map_err(|_| {
            ValueError::NotNumeric {
                field,
                value: value.to_string(),
            }
            .into()
        })
}
