//! High-level device interface

use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use zklink_core::{
    Command, EventFlags, Session,
    record::{sizes::decode_sizes, time},
};
use zklink_transport::{TcpTransport, Transport, UdpTransport};
use zklink_types::{DeviceSizes, DeviceTime};

use crate::{
    channel::{CommandChannel, CommandResult},
    config::DeviceConfig,
    error::{Error, Result},
    probe::{Reachability, SocketProbe},
};

/// Payload size requested by commands that answer with a full packet
pub(crate) const FULL_RESPONSE: usize = 1024;

/// Payload size requested by `CMD_GET_TIME` and `CMD_POWEROFF`
const EXTENDED_RESPONSE: usize = 1024 + 8;

/// ZKTeco terminal
///
/// Owns one [`CommandChannel`] together with the bookkeeping the terminal
/// does not keep for its clients: the next free user slot, the record
/// counters and whether the keypad is enabled.
///
/// # Examples
///
/// ```no_run
/// use zklink::{Device, DeviceConfig};
///
/// #[tokio::main]
/// async fn main() -> zklink::Result<()> {
///     let mut device = Device::new(DeviceConfig::new("192.168.1.201"));
///
///     device.connect().await?;
///     println!("Firmware: {}", device.firmware_version().await?);
///
///     device.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Device {
    pub(crate) config: DeviceConfig,
    pub(crate) channel: CommandChannel,
    probe: Box<dyn Reachability>,
    pub(crate) is_enabled: bool,
    pub(crate) next_uid: u16,
    pub(crate) next_user_id: String,
    pub(crate) sizes: DeviceSizes,
}

impl Device {
    /// Create a device handle; UDP when `force_udp` is set, TCP otherwise
    pub fn new(config: DeviceConfig) -> Self {
        let transport: Box<dyn Transport> = if config.force_udp {
            Box::new(UdpTransport::new(config.host.clone(), config.port).with_read_timeout(config.timeout))
        } else {
            Box::new(
                TcpTransport::new(config.host.clone(), config.port)
                    .with_connect_timeout(config.timeout)
                    .with_read_timeout(config.timeout),
            )
        };
        Self::with_transport(config, transport)
    }

    /// Create a device handle over an existing transport
    pub fn with_transport(config: DeviceConfig, transport: Box<dyn Transport>) -> Self {
        let probe = SocketProbe::new(config.host.clone(), config.port).with_timeout(config.timeout);
        let channel = CommandChannel::new(transport).with_strict_checksum(config.strict_checksum);
        Self {
            config,
            channel,
            probe: Box::new(probe),
            is_enabled: true,
            next_uid: 1,
            next_user_id: "1".to_string(),
            sizes: DeviceSizes::default(),
        }
    }

    /// Replace the reachability probe run by [`connect`](Self::connect)
    pub fn with_probe(mut self, probe: Box<dyn Reachability>) -> Self {
        self.probe = probe;
        self
    }

    /// Wrap the device for sharing between tasks
    pub fn into_shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Whether the keypad was last left enabled by this handle
    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    /// Counters from the last [`read_sizes`](Self::read_sizes)
    pub fn sizes(&self) -> &DeviceSizes {
        &self.sizes
    }

    /// Slot that [`set_user`](Self::set_user) picks when none is given
    pub fn next_uid(&self) -> u16 {
        self.next_uid
    }

    pub fn next_user_id(&self) -> &str {
        &self.next_user_id
    }

    /// User record size in force (28 or 72)
    pub fn user_packet_size(&self) -> usize {
        self.channel.session().user_packet_size()
    }

    /// Raw command access
    pub async fn send_command(&mut self, command: Command, payload: &[u8], response_size: usize) -> Result<CommandResult> {
        self.channel.send(command, payload, response_size).await
    }

    /// Send a command that must succeed
    pub(crate) async fn expect_ok(
        &mut self,
        command: Command,
        payload: &[u8],
        response_size: usize,
        failure: &str,
    ) -> Result<CommandResult> {
        let response = self.channel.send(command, payload, response_size).await?;
        if response.is_success() {
            Ok(response)
        } else {
            debug!(command = %command, code = response.code, "Command refused");
            Err(Error::response(failure))
        }
    }

    /// Connect and authenticate
    ///
    /// Unless `omit_ping` is set the host must answer the reachability probe
    /// first. A host that accepts TCP is assumed to use 72-byte user records.
    ///
    /// # Errors
    ///
    /// [`Error::Unreachable`] when the probe fails, [`Error::Response`] when
    /// the terminal refuses the handshake.
    pub async fn connect(&mut self) -> Result<()> {
        info!(addr = %self.config.address(), kind = %self.channel.kind(), "Connecting");

        if !self.config.omit_ping && !self.probe.is_reachable().await {
            return Err(Error::Unreachable(format!("can't reach device ({})", self.config.host)));
        }

        if !self.config.force_udp && self.probe.tcp_connect().await == 0 {
            self.channel.session_mut().set_user_packet_size(Session::EXTENDED_USER_SIZE);
        }

        self.channel.handshake(self.config.password, self.config.ticks).await?;

        info!(
            addr = %self.channel.remote_addr(),
            user_packet_size = self.user_packet_size(),
            "Connected"
        );
        Ok(())
    }

    /// Send `EXIT` and close the transport
    pub async fn disconnect(&mut self) -> Result<()> {
        self.channel.close().await?;
        info!(addr = %self.config.address(), "Disconnected");
        Ok(())
    }

    /// Unlock the keypad
    pub async fn enable_device(&mut self) -> Result<()> {
        self.expect_ok(Command::EnableDevice, &[], 0, "Can't enable device").await?;
        self.is_enabled = true;
        Ok(())
    }

    /// Lock the keypad and show "Working..."
    pub async fn disable_device(&mut self) -> Result<()> {
        self.expect_ok(Command::DisableDevice, &[], 0, "Can't disable device").await?;
        self.is_enabled = false;
        Ok(())
    }

    /// Restart the terminal; the session ends with it
    pub async fn restart(&mut self) -> Result<()> {
        self.expect_ok(Command::Restart, &[], 0, "Can't restart device").await?;
        warn!(addr = %self.config.address(), "Device restarting");
        self.next_uid = 1;
        self.channel.abandon().await
    }

    /// Power the terminal off; the session ends with it
    pub async fn power_off(&mut self) -> Result<()> {
        self.expect_ok(Command::PowerOff, &[], EXTENDED_RESPONSE, "Can't power off").await?;
        warn!(addr = %self.config.address(), "Device powering off");
        self.next_uid = 1;
        self.channel.abandon().await
    }

    /// Make the terminal reload its tables after a write
    pub async fn refresh_data(&mut self) -> Result<()> {
        self.expect_ok(Command::RefreshData, &[], 0, "Can't refresh data").await?;
        Ok(())
    }

    /// Release the device-side transfer buffer
    pub async fn free_data(&mut self) -> Result<()> {
        self.channel.free_data().await
    }

    /// Firmware version string, e.g. `Ver 6.60 Apr 28 2017`
    pub async fn firmware_version(&mut self) -> Result<String> {
        let response = self
            .expect_ok(Command::GetVersion, &[], FULL_RESPONSE, "Can't read firmware version")
            .await?;
        let payload = &response.payload;
        let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
        Ok(String::from_utf8_lossy(&payload[..end]).into_owned())
    }

    /// Number of digits in a user PIN
    pub async fn pin_width(&mut self) -> Result<u8> {
        let response = self.expect_ok(Command::GetPinWidth, b" P", 9, "Can't get pin width").await?;
        response
            .payload
            .first()
            .copied()
            .ok_or_else(|| Error::Malformed("empty pin width".into()))
    }

    /// Read record counters and capacities
    pub async fn read_sizes(&mut self) -> Result<DeviceSizes> {
        let response = self
            .expect_ok(Command::GetFreeSizes, &[], FULL_RESPONSE, "Can't read sizes")
            .await?;
        self.sizes = decode_sizes(&response.payload);
        debug!(
            users = self.sizes.users,
            fingers = self.sizes.fingers,
            records = self.sizes.records,
            "Read sizes"
        );
        Ok(self.sizes)
    }

    /// Open the door relay for `seconds`
    pub async fn unlock(&mut self, seconds: u32) -> Result<()> {
        let delay = seconds.saturating_mul(10).to_le_bytes();
        self.expect_ok(Command::Unlock, &delay, 0, "Can't open door").await?;
        Ok(())
    }

    /// Door sensor state, `true` when the terminal reports it
    pub async fn lock_state(&mut self) -> Result<bool> {
        Ok(self.channel.send(Command::DoorStateRrq, &[], 0).await?.is_success())
    }

    /// Write `text` on LCD line `line`
    pub async fn write_lcd(&mut self, line: u16, text: &str) -> Result<()> {
        let mut payload = BytesMut::with_capacity(4 + text.len());
        payload.put_u16_le(line);
        payload.put_u8(0);
        payload.put_u8(b' ');
        payload.put_slice(text.as_bytes());

        self.expect_ok(Command::WriteLcd, &payload, 0, "Can't write LCD").await?;
        Ok(())
    }

    pub async fn clear_lcd(&mut self) -> Result<()> {
        self.expect_ok(Command::ClearLcd, &[], 0, "Can't clear LCD").await?;
        Ok(())
    }

    /// Terminal clock
    pub async fn get_time(&mut self) -> Result<DeviceTime> {
        let response = self.expect_ok(Command::GetTime, &[], EXTENDED_RESPONSE, "Can't get time").await?;
        Ok(time::decode_time_bytes(&response.payload)?)
    }

    pub async fn set_time(&mut self, timestamp: &DeviceTime) -> Result<()> {
        let packed = time::encode_time(timestamp).to_le_bytes();
        self.expect_ok(Command::SetTime, &packed, 0, "Can't set time").await?;
        Ok(())
    }

    /// Play voice prompt `index`
    ///
    /// 0 is "Thank you"; the numbering of the rest depends on the firmware.
    pub async fn test_voice(&mut self, index: u32) -> Result<()> {
        self.expect_ok(Command::TestVoice, &index.to_le_bytes(), 0, "Can't play voice").await?;
        Ok(())
    }

    /// Wipe users, templates and attendance records
    pub async fn clear_data(&mut self) -> Result<()> {
        self.expect_ok(Command::ClearData, &[], 0, "Can't clear data").await?;
        self.next_uid = 1;
        self.next_user_id = "1".to_string();
        Ok(())
    }

    /// Abort a pending capture; `false` when the terminal refuses
    pub async fn cancel_capture(&mut self) -> Result<bool> {
        Ok(self.channel.send(Command::CancelCapture, &[], 0).await?.is_success())
    }

    /// Put the terminal back in verification mode
    pub async fn verify_user(&mut self) -> Result<()> {
        self.expect_ok(Command::StartVerify, &[], 0, "Can't verify").await?;
        Ok(())
    }

    /// Subscribe to real-time events; an empty mask unsubscribes
    pub async fn register_event(&mut self, flags: EventFlags) -> Result<()> {
        let response = self.channel.send(Command::RegEvent, &flags.bits().to_le_bytes(), 0).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(Error::Response(format!("Can't register events {}", flags.bits())))
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sizes = &self.sizes;
        write!(
            f,
            "ZK {}://{} users[{}]:{}/{} fingers:{}/{}, records:{}/{}",
            self.channel.kind(),
            self.config.address(),
            self.user_packet_size(),
            sizes.users,
            sizes.users_cap,
            sizes.fingers,
            sizes.fingers_cap,
            sizes.records,
            sizes.records_cap
        )?;
        if let (Some(faces), Some(cap)) = (sizes.faces, sizes.faces_cap) {
            write!(f, " faces:{}/{}", faces, cap)?;
        }
        Ok(())
    }
}
