//! User records

use std::fmt;

/// Privilege byte values
///
/// Bit 0 marks a disabled user; bits 1..=3 carry the role.
pub mod privilege {
    pub const DEFAULT: u8 = 0;
    pub const DISABLED: u8 = 1;
    pub const ENROLLER: u8 = 2;
    pub const MANAGER: u8 = 6;
    pub const ADMIN: u8 = 14;
}

/// A user stored on the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Internal slot number assigned by the terminal
    pub uid: u16,
    pub name: String,
    pub privilege: u8,
    pub password: String,
    pub group_id: String,
    /// Badge number shown to people; numeric on legacy firmware
    pub user_id: String,
    pub card: u64,
}

impl User {
    pub fn is_disabled(&self) -> bool {
        self.privilege & privilege::DISABLED != 0
    }

    pub fn is_enabled(&self) -> bool {
        !self.is_disabled()
    }

    /// Role bits with the disabled flag masked off
    pub fn user_type(&self) -> u8 {
        self.privilege & 0x0E
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<User>: [uid:{}, name:{} user_id:{}]", self.uid, self.name, self.user_id)
    }
}

/// Parameters for creating or overwriting a user
///
/// Missing `uid` and `user_id` are allocated by the device handle from its
/// bookkeeping of the user table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewUser {
    pub uid: Option<u16>,
    pub name: String,
    pub privilege: u8,
    pub password: String,
    pub group_id: String,
    pub user_id: Option<String>,
    pub card: u64,
}

impl NewUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_uid(mut self, uid: u16) -> Self {
        self.uid = Some(uid);
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_privilege(mut self, privilege: u8) -> Self {
        self.privilege = privilege;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    pub fn with_card(mut self, card: u64) -> Self {
        self.card = card;
        self
    }
}
