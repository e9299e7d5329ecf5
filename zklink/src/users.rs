//! User and fingerprint template management

use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, BytesMut};
use tracing::{debug, info, warn};
use zklink_core::{
    Command, EventFlags, TransportKind,
    constants::data_types::{FCT_FINGERTMP, FCT_USER},
    record::{
        finger::{decode_templates, encode_user_templates, trim_user_template},
        user::{UserLayout, decode_users, encode_user},
    },
};
use zklink_types::{Finger, NewUser, User, privilege};

use crate::{
    device::{Device, FULL_RESPONSE},
    error::Result,
};

/// Attempts for `_CMD_GET_USERTEMP`
const TEMPLATE_ATTEMPTS: usize = 3;

/// Receive timeout while the user presses a finger
const ENROLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Payload size of an enrollment progress packet
const ENROLL_EVENT_SIZE: usize = 1032;

/// Width of the user id field in TCP enrollment and template deletion
const USER_ID_WIDTH: usize = 24;

/// Enrollment progress codes
mod enroll_result {
    pub const OK: u16 = 0;
    pub const TIMEOUT: u16 = 4;
    pub const DUPLICATE: u16 = 5;
    pub const FAILED: u16 = 6;
    pub const PRESSED: u16 = 0x64;
}

/// How a user is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserKey<'a> {
    /// Internal slot number
    Uid(u16),
    /// Badge number, looked up in the user table when a slot is needed
    UserId(&'a str),
}

/// One enrollment progress report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EnrollReport {
    result: u16,
    size: u16,
    pos: u16,
}

impl EnrollReport {
    fn parse(payload: &[u8]) -> Self {
        let mut padded = [0u8; 6];
        let n = payload.len().min(6);
        padded[..n].copy_from_slice(&payload[..n]);
        Self {
            result: LittleEndian::read_u16(&padded[0..2]),
            size: LittleEndian::read_u16(&padded[2..4]),
            pos: LittleEndian::read_u16(&padded[4..6]),
        }
    }
}

fn put_user_id(buf: &mut BytesMut, user_id: &str) {
    let bytes = user_id.as_bytes();
    let n = bytes.len().min(USER_ID_WIDTH);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(0, USER_ID_WIDTH - n);
}

impl Device {
    /// Read the user table
    ///
    /// Also settles the user record size for later writes and picks the next
    /// free slot and badge number.
    pub async fn get_users(&mut self) -> Result<Vec<User>> {
        let sizes = self.read_sizes().await?;
        if sizes.users == 0 {
            self.next_uid = 1;
            self.next_user_id = "1".to_string();
            return Ok(Vec::new());
        }

        let data = self.channel.read_with_buffer(Command::UserTempRrq, FCT_USER, 0).await?;
        if data.len() <= 4 {
            warn!(len = data.len(), "Missing user data");
            return Ok(Vec::new());
        }

        let total = LittleEndian::read_u32(&data[..4]) as usize;
        let layout = UserLayout::select(total, sizes.users as usize);
        self.channel.session_mut().set_user_packet_size(layout.size());

        let users = decode_users(layout, &data[4..])?;

        let max_uid = users.iter().map(|u| u.uid).max().unwrap_or(0);
        self.next_uid = max_uid.saturating_add(1);

        let mut candidate = u32::from(self.next_uid);
        while users.iter().any(|u| u.user_id == candidate.to_string()) {
            candidate += 1;
        }
        self.next_user_id = candidate.to_string();

        debug!(
            count = users.len(),
            record_size = layout.size(),
            next_uid = self.next_uid,
            next_user_id = %self.next_user_id,
            "Read users"
        );
        Ok(users)
    }

    async fn find_user(&mut self, key: UserKey<'_>) -> Result<Option<User>> {
        let users = self.get_users().await?;
        Ok(users.into_iter().find(|u| match key {
            UserKey::Uid(uid) => u.uid == uid,
            UserKey::UserId(user_id) => u.user_id == user_id,
        }))
    }

    async fn resolve_uid(&mut self, key: UserKey<'_>) -> Result<Option<u16>> {
        match key {
            UserKey::Uid(uid) => Ok(Some(uid)),
            UserKey::UserId(_) => Ok(self.find_user(key).await?.map(|u| u.uid)),
        }
    }

    /// Create or overwrite a user
    ///
    /// A missing slot takes [`next_uid`](Self::next_uid); a missing badge
    /// number takes [`next_user_id`](Self::next_user_id) for new slots and
    /// the slot number otherwise. Privileges other than default and admin
    /// are written as default.
    pub async fn set_user(&mut self, new: NewUser) -> Result<User> {
        let uid = new.uid.unwrap_or(self.next_uid);
        let user_id = match new.user_id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None if new.uid.is_none() => self.next_user_id.clone(),
            None => uid.to_string(),
        };

        let role = if matches!(new.privilege, privilege::DEFAULT | privilege::ADMIN) {
            new.privilege
        } else {
            warn!(uid, privilege = new.privilege, "Unsupported privilege, writing default");
            privilege::DEFAULT
        };

        let user = User {
            uid,
            name: new.name,
            privilege: role,
            password: new.password,
            group_id: new.group_id,
            user_id,
            card: new.card,
        };

        let layout = UserLayout::from_size(self.user_packet_size()).unwrap_or(UserLayout::Extended);
        let payload = encode_user(layout, &user)?;

        self.expect_ok(Command::UserWrq, &payload, FULL_RESPONSE, "Can't set user").await?;
        self.refresh_data().await?;

        if self.next_uid == uid {
            self.next_uid = uid.saturating_add(1);
        }
        if self.next_user_id == user.user_id {
            self.next_user_id = self.next_uid.to_string();
        }

        debug!(user = %user, "User written");
        Ok(user)
    }

    /// Delete a user; `false` when a badge number matches nobody
    pub async fn delete_user(&mut self, key: UserKey<'_>) -> Result<bool> {
        let Some(uid) = self.resolve_uid(key).await? else {
            debug!(?key, "User not found");
            return Ok(false);
        };

        self.expect_ok(Command::DeleteUser, &uid.to_le_bytes(), 0, "Can't delete user").await?;
        self.refresh_data().await?;

        if uid == self.next_uid.wrapping_sub(1) {
            self.next_uid = uid;
        }
        Ok(true)
    }

    /// Read every stored fingerprint template
    pub async fn get_templates(&mut self) -> Result<Vec<Finger>> {
        let sizes = self.read_sizes().await?;
        if sizes.fingers == 0 {
            return Ok(Vec::new());
        }

        let data = self.channel.read_with_buffer(Command::DbRrq, FCT_FINGERTMP, 0).await?;
        if data.len() < 4 {
            warn!(len = data.len(), "No template data");
            return Ok(Vec::new());
        }

        Ok(decode_templates(&data)?)
    }

    /// Read the template of finger `fid`; `None` when it cannot be found
    pub async fn get_user_template(&mut self, key: UserKey<'_>, fid: u8) -> Result<Option<Finger>> {
        let Some(uid) = self.resolve_uid(key).await? else {
            return Ok(None);
        };

        let mut payload = BytesMut::with_capacity(3);
        payload.put_u16_le(uid);
        payload.put_u8(fid);

        for attempt in 1..=TEMPLATE_ATTEMPTS {
            let response = self.channel.send(Command::GetUserTemp, &payload, ENROLL_EVENT_SIZE).await?;
            if let Some(data) = self.channel.receive_chunk(&response).await? {
                let template = trim_user_template(&data);
                return Ok(Some(Finger::new(uid, fid, 1, template.to_vec())));
            }
            debug!(uid, fid, attempt, "Template not received, retrying");
        }

        debug!(uid, fid, "Can't read template");
        Ok(None)
    }

    /// Upload users together with their templates in one batch
    pub async fn save_user_templates(&mut self, entries: &[(User, Vec<Finger>)]) -> Result<()> {
        let layout = UserLayout::from_size(self.user_packet_size()).unwrap_or(UserLayout::Extended);
        let buffer = encode_user_templates(layout, entries)?;

        self.channel.send_with_buffer(&buffer).await?;

        let mut payload = BytesMut::with_capacity(8);
        payload.put_u32_le(12);
        payload.put_u16_le(0);
        payload.put_u16_le(8);
        self.expect_ok(Command::SaveUserTemps, &payload, 0, "Can't save user templates")
            .await?;

        self.refresh_data().await
    }

    /// Upload the templates of one user
    pub async fn save_user_template(&mut self, user: &User, fingers: Vec<Finger>) -> Result<()> {
        self.save_user_templates(&[(user.clone(), fingers)]).await
    }

    /// Delete the template of finger `fid`; `false` when refused or not found
    ///
    /// Over TCP a badge number is sent as is; otherwise it is resolved to
    /// a slot first.
    pub async fn delete_user_template(&mut self, key: UserKey<'_>, fid: u8) -> Result<bool> {
        if let (TransportKind::Tcp, UserKey::UserId(user_id)) = (self.channel.kind(), key) {
            if !user_id.is_empty() {
                let mut payload = BytesMut::with_capacity(USER_ID_WIDTH + 1);
                put_user_id(&mut payload, user_id);
                payload.put_u8(fid);
                return Ok(self.channel.send(Command::DelUserTemp, &payload, 0).await?.is_success());
            }
        }

        let Some(uid) = self.resolve_uid(key).await? else {
            return Ok(false);
        };

        let mut payload = BytesMut::with_capacity(3);
        payload.put_u16_le(uid);
        payload.put_u8(fid);
        Ok(self.channel.send(Command::DeleteUserTemp, &payload, 0).await?.is_success())
    }

    /// Enroll finger `fid` of user `uid` at the terminal
    ///
    /// The user presses the finger three times within 60 seconds each.
    /// Returns `true` once the terminal stored the template. The previous
    /// timeout, event mask and verify mode are restored on every exit.
    pub async fn enroll_user(&mut self, uid: u16, fid: u8, user_id: Option<&str>) -> Result<bool> {
        let user_id = match user_id.filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => match self.find_user(UserKey::Uid(uid)).await? {
                Some(user) => user.user_id,
                None => {
                    debug!(uid, "No user to enroll");
                    return Ok(false);
                }
            },
        };

        let mut payload = BytesMut::with_capacity(USER_ID_WIDTH + 2);
        match self.channel.kind() {
            TransportKind::Tcp => {
                put_user_id(&mut payload, &user_id);
                payload.put_u8(fid);
                payload.put_u8(1);
            }
            TransportKind::Udp => {
                let numeric: u32 = user_id
                    .parse()
                    .map_err(|_| zklink_types::Error::NotNumeric {
                        field: "user id",
                        value: user_id.to_string(),
                    })?;
                payload.put_u32_le(numeric);
                payload.put_u8(fid);
            }
        }

        self.cancel_capture().await?;
        let failure = format!("Can't enroll user #{} [{}]", uid, fid);
        self.expect_ok(Command::StartEnroll, &payload, 0, &failure).await?;

        info!(uid, fid, user_id = %user_id, "Enrollment started");

        let previous = self.channel.timeout();
        self.channel.set_timeout(ENROLL_TIMEOUT);
        let outcome = self.enroll_presses().await;
        self.channel.set_timeout(previous);

        let cleanup = self.end_capture().await;
        let done = outcome?;
        cleanup?;

        Ok(done)
    }

    async fn enroll_presses(&mut self) -> Result<bool> {
        let mut attempts = 3;
        while attempts > 0 {
            let report = self.next_enroll_report().await?;
            if matches!(report.result, enroll_result::OK | enroll_result::TIMEOUT | enroll_result::FAILED) {
                debug!(result = report.result, "Enrollment timed out or failed");
                break;
            }

            let report = self.next_enroll_report().await?;
            if matches!(report.result, enroll_result::TIMEOUT | enroll_result::FAILED) {
                debug!(result = report.result, "Enrollment timed out or failed");
                break;
            }
            if report.result == enroll_result::PRESSED {
                attempts -= 1;
                debug!(remaining = attempts, "Finger press accepted");
            }
        }

        if attempts > 0 {
            return Ok(false);
        }

        let report = self.next_enroll_report().await?;
        match report.result {
            enroll_result::OK => {
                info!(size = report.size, pos = report.pos, "Enrollment complete");
                Ok(true)
            }
            enroll_result::DUPLICATE => {
                warn!("Finger already enrolled");
                Ok(false)
            }
            result => {
                debug!(result, "Enrollment not completed");
                Ok(false)
            }
        }
    }

    async fn next_enroll_report(&mut self) -> Result<EnrollReport> {
        let packet = self.channel.receive(ENROLL_EVENT_SIZE).await?;
        self.channel.ack_ok().await?;
        Ok(EnrollReport::parse(&packet.payload))
    }

    /// Leave capture mode: unregister events, cancel, back to verify
    pub(crate) async fn end_capture(&mut self) -> Result<()> {
        self.register_event(EventFlags::empty()).await?;
        self.cancel_capture().await?;
        self.verify_user().await
    }
}
