//! Real-time event capture
//!
//! The capture loop owns the connection for its whole run:
//!
//! 1. Armed: user table loaded, capture cancelled, verify mode on, keypad
//!    enabled, event mask registered, receive timeout raised
//! 2. Streaming: every packet is acknowledged; `CMD_REG_EVENT` payloads are
//!    decoded into punches, receive timeouts become heartbeats
//! 3. Idle again: timeout restored, mask cleared, keypad left as found
//!
//! Step 3 runs on every exit, including errors.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};
use zklink_core::{Command, EventFlags, record::event::decode_live_events};
use zklink_types::{Attendance, User};

use crate::{config::DeviceConfig, device::Device, error::Result};

/// Largest event packet read per receive
const LIVE_EVENT_SIZE: usize = 1032;

/// Cooperative stop signal for [`Device::live_capture`]
///
/// Checked once per loop iteration, so a stop takes effect after the
/// receive in flight returns or times out.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Something observed while capturing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// A punch at the terminal
    Attendance(Attendance),
    /// Nothing arrived within the live timeout
    Heartbeat,
}

/// Live capture parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveCaptureOptions {
    /// Receive timeout; each expiry produces a [`LiveEvent::Heartbeat`]
    pub timeout: Duration,
    /// Events to subscribe to
    pub events: EventFlags,
}

impl LiveCaptureOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            events: EventFlags::ATTLOG,
        }
    }

    pub fn with_events(mut self, events: EventFlags) -> Self {
        self.events = events;
        self
    }
}

impl Default for LiveCaptureOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl From<&DeviceConfig> for LiveCaptureOptions {
    fn from(config: &DeviceConfig) -> Self {
        Self::new(config.live_timeout)
    }
}

impl Device {
    /// Stream punches to `on_event` until `stop` is set or the connection fails
    ///
    /// # Errors
    ///
    /// Setup failures, and any receive failure other than a timeout. A
    /// sub-record of unknown length ends the capture with a framing error.
    /// The device state is restored before returning either way.
    pub async fn live_capture<F>(&mut self, options: LiveCaptureOptions, stop: &StopToken, mut on_event: F) -> Result<()>
    where
        F: FnMut(LiveEvent),
    {
        let was_enabled = self.is_enabled;
        let users = self.get_users().await?;
        let previous = self.channel.timeout();

        let outcome = match self.arm_live(options.events).await {
            Ok(()) => {
                self.channel.set_timeout(options.timeout);
                info!(events = options.events.bits(), timeout = ?options.timeout, "Live capture started");
                self.stream_events(&users, stop, &mut on_event).await
            }
            Err(e) => Err(e),
        };

        self.channel.set_timeout(previous);
        let restored = self.disarm_live(was_enabled).await;

        info!("Live capture finished");
        outcome?;
        restored
    }

    async fn arm_live(&mut self, events: EventFlags) -> Result<()> {
        self.cancel_capture().await?;
        self.verify_user().await?;
        if !self.is_enabled {
            self.enable_device().await?;
        }
        self.register_event(events).await
    }

    async fn disarm_live(&mut self, was_enabled: bool) -> Result<()> {
        self.register_event(EventFlags::empty()).await?;
        if !was_enabled {
            self.disable_device().await?;
        }
        Ok(())
    }

    async fn stream_events<F>(&mut self, users: &[User], stop: &StopToken, on_event: &mut F) -> Result<()>
    where
        F: FnMut(LiveEvent),
    {
        loop {
            if stop.is_stopped() {
                debug!("Live capture stop requested");
                return Ok(());
            }

            let packet = match self.channel.receive(LIVE_EVENT_SIZE).await {
                Ok(packet) => packet,
                Err(e) if e.is_timeout() => {
                    on_event(LiveEvent::Heartbeat);
                    continue;
                }
                Err(e) => {
                    warn!("Live capture receive failed: {}", e);
                    return Err(e);
                }
            };

            self.channel.ack_ok().await?;

            if !packet.is(Command::RegEvent) {
                debug!(code = packet.command, "Ignoring non-event packet");
                continue;
            }
            if packet.payload.is_empty() {
                continue;
            }

            for mut event in decode_live_events(&packet.payload)? {
                if let Some(user) = users.iter().find(|u| u.user_id == event.user_id) {
                    event.uid = user.uid;
                }
                on_event(LiveEvent::Attendance(event));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedTransport, commands, connected_device, push, respond, sizes_payload};
    use pretty_assertions::assert_eq;
    use zklink_core::record::{time::encode_hex_time, user::{UserLayout, encode_user}};
    use zklink_types::{DeviceTime, privilege};

    const SESSION: u16 = 0x4E4E;
    const STAMP: DeviceTime = DeviceTime::new(2024, 5, 6, 7, 8, 9);

    fn punch(user_id: u16) -> Vec<u8> {
        let mut record = user_id.to_le_bytes().to_vec();
        record.extend_from_slice(&[1, 0]);
        record.extend_from_slice(&encode_hex_time(&STAMP));
        record
    }

    fn text_punch(user_id: &str) -> Vec<u8> {
        let mut record = vec![0u8; 24];
        record[..user_id.len()].copy_from_slice(user_id.as_bytes());
        record.extend_from_slice(&[15, 1]);
        record.extend_from_slice(&encode_hex_time(&STAMP));
        record.extend_from_slice(&[0u8; 20]);
        record
    }

    /// Terminal holding one user with badge "500" in slot 3; `events` are
    /// queued once the event mask is registered
    fn terminal(events: Vec<Reply>) -> ScriptedTransport {
        let badge = User {
            uid: 3,
            name: "Gus".into(),
            privilege: privilege::DEFAULT,
            password: String::new(),
            group_id: String::new(),
            user_id: "500".into(),
            card: 0,
        };
        let mut table = 72u32.to_le_bytes().to_vec();
        table.extend_from_slice(&encode_user(UserLayout::Extended, &badge).unwrap());
        let mut events = Some(events);

        ScriptedTransport::udp(move |request| {
            if request.is(Command::AckOk) {
                return Vec::new();
            }
            let reply = if request.is(Command::GetFreeSizes) {
                respond(request, Command::AckOk, SESSION, &sizes_payload(1, 0, 0))
            } else if request.is(Command::PrepareBuffer) {
                respond(request, Command::Data, SESSION, &table)
            } else {
                respond(request, Command::AckOk, SESSION, &[])
            };
            let mut replies = vec![Reply::Packet(reply)];
            if request.is(Command::RegEvent) && request.payload[..] != [0u8; 4] {
                replies.extend(events.take().unwrap_or_default());
            }
            replies
        })
    }

    #[tokio::test]
    async fn test_events_then_stop() {
        let mut payload = text_punch("X-1");
        payload.extend(punch(500));
        let transport = terminal(vec![
            Reply::Packet(push(Command::RegEvent, SESSION, &punch(7))),
            Reply::Packet(push(Command::AckOk, SESSION, &[])),
            Reply::Packet(push(Command::RegEvent, SESSION, &[])),
            Reply::Timeout,
            // 52 + 10 bytes: two punches in one packet
            Reply::Packet(push(Command::RegEvent, SESSION, &payload)),
        ]);
        let sent = transport.sent();
        let mut device = connected_device(transport).await;

        let stop = StopToken::new();
        let mut seen = Vec::new();
        let handle = stop.clone();
        device
            .live_capture(LiveCaptureOptions::default(), &stop, |event| {
                seen.push(event);
                if seen.len() == 4 {
                    handle.stop();
                }
            })
            .await
            .unwrap();

        assert_eq!(seen.len(), 4);
        let LiveEvent::Attendance(first) = &seen[0] else {
            panic!("expected a punch, got {:?}", seen[0]);
        };
        assert_eq!(first.user_id, "7");
        assert_eq!(first.uid, 7);
        assert_eq!(first.timestamp, STAMP);
        assert_eq!(seen[1], LiveEvent::Heartbeat);
        let LiveEvent::Attendance(text) = &seen[2] else {
            panic!("expected a punch, got {:?}", seen[2]);
        };
        assert_eq!(text.user_id, "X-1");
        assert_eq!(text.uid, 0);
        assert_eq!(text.status, 15);
        let LiveEvent::Attendance(badge) = &seen[3] else {
            panic!("expected a punch, got {:?}", seen[3]);
        };
        assert_eq!(badge.user_id, "500");
        assert_eq!(badge.uid, 3);

        // Every received packet acknowledged
        assert_eq!(crate::testing::count(&sent, Command::AckOk), 4);
    }

    #[tokio::test]
    async fn test_setup_and_cleanup_order() {
        let transport = terminal(Vec::new());
        let sent = transport.sent();
        let timeouts = transport.timeouts();
        let mut device = connected_device(transport).await;
        device.is_enabled = false;

        let stop = StopToken::new();
        let handle = stop.clone();
        let options = LiveCaptureOptions::new(Duration::from_secs(2)).with_events(EventFlags::ATTLOG | EventFlags::VERIFY);
        device.live_capture(options, &stop, |_| handle.stop()).await.unwrap();

        let codes = commands(&sent);
        let tail: Vec<u16> = codes.iter().copied().skip_while(|&c| c != 62).collect();
        // cancel, verify, enable, register, unregister, disable
        assert_eq!(tail, vec![62, 60, 1002, 500, 500, 1003]);

        let sent = sent.lock().unwrap();
        let registers: Vec<_> = sent.iter().filter(|p| p.is(Command::RegEvent)).collect();
        assert_eq!(registers[0].payload.as_ref(), &0x81u32.to_le_bytes());
        assert_eq!(registers[1].payload.as_ref(), &0u32.to_le_bytes());

        assert_eq!(*timeouts.lock().unwrap(), vec![Duration::from_secs(2), Duration::from_secs(60)]);
        assert!(!device.is_enabled());
    }

    #[tokio::test]
    async fn test_framing_error_ends_capture_after_cleanup() {
        let transport = terminal(vec![Reply::Packet(push(Command::RegEvent, SESSION, &[0u8; 11]))]);
        let sent = transport.sent();
        let mut device = connected_device(transport).await;

        let err = device
            .live_capture(LiveCaptureOptions::default(), &StopToken::new(), |_| {})
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::ErrorKind::Framing);
        let last = sent.lock().unwrap().last().cloned().unwrap();
        assert!(last.is(Command::RegEvent));
        assert_eq!(last.payload.as_ref(), &[0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_closed_connection_ends_capture() {
        let transport = terminal(vec![Reply::Closed]);
        let mut device = connected_device(transport).await;

        let err = device
            .live_capture(LiveCaptureOptions::default(), &StopToken::new(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Network);
        assert!(device.is_enabled());
    }

    #[test]
    fn test_options_from_config() {
        let config = DeviceConfig::new("10.0.0.1").with_live_timeout(Duration::from_secs(30));
        let options = LiveCaptureOptions::from(&config);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.events, EventFlags::ATTLOG);
    }
}
