//! Attendance log download

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};
use zklink_core::{
    Command,
    record::attendance::{AttendanceLayout, decode_attendances},
};
use zklink_types::{Attendance, User};

use crate::{device::Device, error::Result};

/// Fill in whichever of `uid`/`user_id` the layout does not carry
fn resolve_ids(layout: AttendanceLayout, users: &[User], record: &mut Attendance) {
    match layout {
        AttendanceLayout::Compact => {
            if let Some(user) = users.iter().find(|u| u.uid == record.uid) {
                record.user_id = user.user_id.clone();
            }
        }
        AttendanceLayout::Standard => {
            if let Some(user) = users.iter().find(|u| u.user_id == record.user_id) {
                record.uid = user.uid;
            }
        }
        AttendanceLayout::Extended(_) => {}
    }
}

impl Device {
    /// Download the attendance log
    ///
    /// The record width follows from the log size and the record count, so
    /// the counters are read first. The user table is loaded to map slots
    /// to badge numbers.
    pub async fn get_attendance(&mut self) -> Result<Vec<Attendance>> {
        let sizes = self.read_sizes().await?;
        if sizes.records == 0 {
            return Ok(Vec::new());
        }

        let users = self.get_users().await?;

        let data = self.channel.read_with_buffer(Command::AttLogRrq, 0, 0).await?;
        if data.len() < 4 {
            warn!(len = data.len(), "No attendance data");
            return Ok(Vec::new());
        }

        let total = LittleEndian::read_u32(&data[..4]) as usize;
        let layout = AttendanceLayout::select(total, sizes.records as usize)?;
        debug!(total, records = sizes.records, record_size = layout.size(), "Decoding attendance log");

        let mut records = decode_attendances(layout, &data[4..])?;
        for record in &mut records {
            resolve_ids(layout, &users, record);
        }

        Ok(records)
    }

    /// Delete every attendance record
    pub async fn clear_attendance(&mut self) -> Result<()> {
        self.expect_ok(Command::ClearAttLog, &[], 0, "Can't clear attendance").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedTransport, connected_device, respond, sizes_payload};
    use pretty_assertions::assert_eq;
    use zklink_core::record::{time::encode_time, user::{UserLayout, encode_user}};
    use zklink_types::{DeviceTime, privilege};

    const SESSION: u16 = 0x1001;

    fn user(uid: u16, user_id: &str) -> User {
        User {
            uid,
            name: format!("User {}", uid),
            privilege: privilege::DEFAULT,
            password: String::new(),
            group_id: String::new(),
            user_id: user_id.into(),
            card: 0,
        }
    }

    /// Terminal with `users` and an attendance log of `records` entries
    fn terminal(users: Vec<User>, records: i32, log: Vec<u8>) -> ScriptedTransport {
        let mut table = ((users.len() * 72) as u32).to_le_bytes().to_vec();
        for u in &users {
            table.extend_from_slice(&encode_user(UserLayout::Extended, u).unwrap());
        }
        let count = users.len() as i32;

        ScriptedTransport::udp(move |request| {
            let reply = if request.is(Command::GetFreeSizes) {
                respond(request, Command::AckOk, SESSION, &sizes_payload(count, 0, records))
            } else if request.is(Command::PrepareBuffer) {
                // payload: 1, command u16, fct i32, ext i32
                let command = u16::from_le_bytes([request.payload[1], request.payload[2]]);
                let body = if command == u16::from(Command::AttLogRrq) { &log } else { &table };
                respond(request, Command::Data, SESSION, body)
            } else {
                respond(request, Command::AckOk, SESSION, &[])
            };
            vec![Reply::Packet(reply)]
        })
    }

    fn compact(uid: u16, t: &DeviceTime) -> Vec<u8> {
        let mut record = uid.to_le_bytes().to_vec();
        record.push(1);
        record.extend_from_slice(&encode_time(t).to_le_bytes());
        record.push(0);
        record
    }

    fn standard(user_id: u32, t: &DeviceTime) -> Vec<u8> {
        let mut record = user_id.to_le_bytes().to_vec();
        record.extend_from_slice(&encode_time(t).to_le_bytes());
        record.extend_from_slice(&[15, 1, 0, 0, 0, 0, 0, 0]);
        record
    }

    #[tokio::test]
    async fn test_compact_log_maps_badges() {
        let t = DeviceTime::new(2023, 11, 2, 8, 1, 59);
        let mut log = 16u32.to_le_bytes().to_vec();
        log.extend(compact(1, &t));
        log.extend(compact(9, &t));

        let mut device = connected_device(terminal(vec![user(1, "1001")], 2, log)).await;
        let records = device.get_attendance().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].user_id, "1001");
        assert_eq!(records[0].uid, 1);
        assert_eq!(records[0].timestamp, t);
        assert_eq!(records[1].user_id, "9");
    }

    #[tokio::test]
    async fn test_standard_log_maps_slots() {
        let t = DeviceTime::new(2024, 1, 15, 17, 30, 0);
        let mut log = 32u32.to_le_bytes().to_vec();
        log.extend(standard(1001, &t));
        log.extend(standard(77, &t));

        let mut device = connected_device(terminal(vec![user(4, "1001")], 2, log)).await;
        let records = device.get_attendance().await.unwrap();

        assert_eq!(records[0].uid, 4);
        assert_eq!(records[0].status, 15);
        assert_eq!(records[0].punch, 1);
        assert_eq!(records[1].uid, 77);
        assert_eq!(records[1].user_id, "77");
    }

    #[tokio::test]
    async fn test_empty_log_skips_transfer() {
        let transport = terminal(Vec::new(), 0, Vec::new());
        let sent = transport.sent();
        let mut device = connected_device(transport).await;

        assert!(device.get_attendance().await.unwrap().is_empty());
        assert_eq!(crate::testing::count(&sent, Command::PrepareBuffer), 0);
    }

    #[tokio::test]
    async fn test_unknown_record_width() {
        let mut log = 20u32.to_le_bytes().to_vec();
        log.extend_from_slice(&[0; 20]);

        let mut device = connected_device(terminal(Vec::new(), 2, log)).await;
        let err = device.get_attendance().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Framing);
    }
}
