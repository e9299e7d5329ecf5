//! Device identity and option queries

use tracing::debug;
use zklink_core::{Command, options};
use zklink_types::{DeviceInfo, NetworkParams};

use crate::{
    device::{Device, FULL_RESPONSE},
    error::{Error, Result},
};

impl Device {
    /// Read option `key`, `None` when the terminal does not know it
    ///
    /// Read-only system values take a `~` prefix (`~SerialNumber`).
    pub async fn get_option(&mut self, key: &str) -> Result<Option<String>> {
        let response = self.channel.send(Command::OptionsRrq, &options::request(key), FULL_RESPONSE).await?;
        if response.is_success() {
            Ok(Some(options::value(&response.payload)))
        } else {
            debug!(key, code = response.code, "Option not available");
            Ok(None)
        }
    }

    async fn require_option(&mut self, key: &str, failure: &str) -> Result<String> {
        self.get_option(key).await?.ok_or_else(|| Error::response(failure))
    }

    /// Numeric option; on refusal the terminal's error state is drained and `None` returned
    async fn numeric_option(&mut self, key: &str) -> Result<Option<u32>> {
        let request = options::request(key);
        let response = self.channel.send(Command::OptionsRrq, &request, FULL_RESPONSE).await?;
        if response.is_success() {
            return Ok(Some(options::numeric(&response.payload).unwrap_or(0)));
        }

        self.clear_error(&request).await?;
        Ok(None)
    }

    /// Acknowledge a refused query so the terminal drops its error state
    ///
    /// Sends `ACK_ERROR` followed by three `ACK_UNKNOWN`. A drain packet
    /// left unanswered ends the drain early.
    pub async fn clear_error(&mut self, payload: &[u8]) -> Result<()> {
        let drain = [Command::AckError, Command::AckUnknown, Command::AckUnknown, Command::AckUnknown];
        for command in drain {
            match self.channel.send(command, payload, FULL_RESPONSE).await {
                Ok(_) => {}
                Err(e) if e.is_timeout() => {
                    debug!(command = %command, "Error drain unanswered");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub async fn serial_number(&mut self) -> Result<String> {
        let value = self.require_option("~SerialNumber", "Can't read serial number").await?;
        Ok(value.replace('=', ""))
    }

    pub async fn platform(&mut self) -> Result<String> {
        let value = self.require_option("~Platform", "Can't read platform name").await?;
        Ok(value.replace('=', ""))
    }

    pub async fn mac(&mut self) -> Result<String> {
        self.require_option("MAC", "Can't read MAC address").await
    }

    /// User-assigned name, empty when unset
    pub async fn device_name(&mut self) -> Result<String> {
        Ok(self.get_option("~DeviceName").await?.unwrap_or_default())
    }

    /// Face algorithm version, 0 on terminals without a face reader
    pub async fn face_version(&mut self) -> Result<u32> {
        let value = self.get_option("ZKFaceVersion").await?;
        Ok(value.and_then(|v| v.trim().parse().ok()).unwrap_or(0))
    }

    /// Fingerprint algorithm version (9 or 10)
    pub async fn fp_version(&mut self) -> Result<u32> {
        let value = self.require_option("~ZKFPVersion", "Can't read fingerprint version").await?;
        Ok(value.replace('=', "").trim().parse().unwrap_or(0))
    }

    pub async fn extend_fmt(&mut self) -> Result<Option<u32>> {
        self.numeric_option("~ExtendFmt").await
    }

    pub async fn user_extend_fmt(&mut self) -> Result<Option<u32>> {
        self.numeric_option("~UserExtFmt").await
    }

    pub async fn face_fun_on(&mut self) -> Result<Option<u32>> {
        self.numeric_option("FaceFunOn").await
    }

    pub async fn compat_old_firmware(&mut self) -> Result<Option<u32>> {
        self.numeric_option("CompatOldFirmware").await
    }

    /// Address settings; the IP falls back to the configured host
    pub async fn network_params(&mut self) -> Result<NetworkParams> {
        let ip = self.get_option("IPAddress").await?;
        let mask = self.get_option("NetMask").await?;
        let gateway = self.get_option("GATEIPAddress").await?;

        Ok(NetworkParams {
            ip: ip.unwrap_or_else(|| self.config.host.clone()),
            mask: mask.unwrap_or_default(),
            gateway: gateway.unwrap_or_default(),
        })
    }

    /// Enable SDK build 1 behaviour; `false` when the terminal refuses
    pub async fn set_sdk_build_1(&mut self) -> Result<bool> {
        let response = self.channel.send(Command::OptionsWrq, b"SDKBuild=1", 0).await?;
        Ok(response.is_success())
    }

    /// Collect serial number, firmware and the optional identity fields
    pub async fn device_info(&mut self) -> Result<DeviceInfo> {
        let serial_number = self.serial_number().await?;
        let firmware_version = self.firmware_version().await?;

        let mut info = DeviceInfo::new(serial_number, firmware_version);
        info.platform = self.get_option("~Platform").await?;
        info.device_name = self.get_option("~DeviceName").await?;
        info.mac_address = self.get_option("MAC").await?;
        info.fp_version = self
            .get_option("~ZKFPVersion")
            .await?
            .and_then(|v| v.trim().parse().ok());
        info.face_version = Some(self.face_version().await?);

        debug!(info = %info, "Device info");
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedTransport, commands, connected_device, respond};
    use pretty_assertions::assert_eq;
    use zklink_core::Packet;

    const SESSION: u16 = 0x0777;

    /// Terminal answering option queries from a fixed table
    fn terminal(options: &'static [(&'static str, &'static str)]) -> ScriptedTransport {
        ScriptedTransport::udp(move |request: &Packet| {
            if !request.is(Command::OptionsRrq) {
                return vec![Reply::Packet(respond(request, Command::AckOk, SESSION, &[]))];
            }
            let key = String::from_utf8_lossy(&request.payload).trim_end_matches('\0').to_string();
            let reply = match options.iter().find(|(k, _)| *k == key) {
                Some((k, v)) => respond(request, Command::AckOk, SESSION, format!("{}={}\0", k, v).as_bytes()),
                None => respond(request, Command::AckError, SESSION, &[]),
            };
            vec![Reply::Packet(reply)]
        })
    }

    #[tokio::test]
    async fn test_identity_options() {
        let transport = terminal(&[
            ("~SerialNumber", "A8N5201260153"),
            ("~Platform", "ZMM220_TFT"),
            ("MAC", "00:17:61:C8:EC:17"),
            ("~ZKFPVersion", "10"),
        ]);
        let mut device = connected_device(transport).await;

        assert_eq!(device.serial_number().await.unwrap(), "A8N5201260153");
        assert_eq!(device.platform().await.unwrap(), "ZMM220_TFT");
        assert_eq!(device.mac().await.unwrap(), "00:17:61:C8:EC:17");
        assert_eq!(device.fp_version().await.unwrap(), 10);
        assert_eq!(device.device_name().await.unwrap(), "");
        assert_eq!(device.face_version().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_required_option_refused() {
        let mut device = connected_device(terminal(&[])).await;

        let err = device.serial_number().await.unwrap_err();
        assert!(matches!(err, Error::Response(ref msg) if msg == "Can't read serial number"));
    }

    #[tokio::test]
    async fn test_unknown_numeric_option_drains_error() {
        let transport = terminal(&[("~ExtendFmt", "1")]);
        let sent = transport.sent();
        let mut device = connected_device(transport).await;

        assert_eq!(device.extend_fmt().await.unwrap(), Some(1));
        assert_eq!(device.face_fun_on().await.unwrap(), None);

        let tail: Vec<u16> = commands(&sent).into_iter().rev().take(5).rev().collect();
        assert_eq!(tail, vec![11, 2001, 0xFFFF, 0xFFFF, 0xFFFF]);
        let last = sent.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.payload.as_ref(), b"FaceFunOn\0");
    }

    #[tokio::test]
    async fn test_network_params_fall_back_to_host() {
        let mut device = connected_device(terminal(&[("NetMask", "255.255.255.0")])).await;

        let params = device.network_params().await.unwrap();
        assert_eq!(
            params,
            NetworkParams {
                ip: "scripted".into(),
                mask: "255.255.255.0".into(),
                gateway: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn test_device_info() {
        let transport = ScriptedTransport::udp(|request| {
            let payload: Vec<u8> = if request.is(Command::GetVersion) {
                b"Ver 6.60\0".to_vec()
            } else if request.is(Command::OptionsRrq) {
                match &request.payload[..] {
                    b"~SerialNumber\0" => b"~SerialNumber=SN1\0".to_vec(),
                    b"~DeviceName\0" => b"~DeviceName=Front door\0".to_vec(),
                    b"~ZKFPVersion\0" => b"~ZKFPVersion=10\0".to_vec(),
                    _ => {
                        return vec![Reply::Packet(respond(request, Command::AckError, SESSION, &[]))];
                    }
                }
            } else {
                Vec::new()
            };
            vec![Reply::Packet(respond(request, Command::AckOk, SESSION, &payload))]
        });
        let mut device = connected_device(transport).await;

        let info = device.device_info().await.unwrap();
        assert_eq!(info.serial_number, "SN1");
        assert_eq!(info.firmware_version, "Ver 6.60");
        assert_eq!(info.device_name.as_deref(), Some("Front door"));
        assert_eq!(info.platform, None);
        assert_eq!(info.fp_version, Some(10));
        assert_eq!(info.face_version, Some(0));
    }
}
