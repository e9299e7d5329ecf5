//! Device information structures

use std::fmt;

/// Device information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device serial number
    pub serial_number: String,

    /// Firmware version
    pub firmware_version: String,

    /// Platform name
    pub platform: Option<String>,

    /// Device name (user-assigned)
    pub device_name: Option<String>,

    /// MAC address
    pub mac_address: Option<String>,

    /// Fingerprint algorithm version (9 or 10)
    pub fp_version: Option<u32>,

    /// Face algorithm version, 0 when the device has no face reader
    pub face_version: Option<u32>,
}

impl DeviceInfo {
    pub fn new(serial_number: String, firmware_version: String) -> Self {
        Self {
            serial_number,
            firmware_version,
            platform: None,
            device_name: None,
            mac_address: None,
            fp_version: None,
            face_version: None,
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device[SN: {}, FW: {}",
            self.serial_number, self.firmware_version
        )?;
        if let Some(platform) = &self.platform {
            write!(f, ", Platform: {}", platform)?;
        }
        if let Some(name) = &self.device_name {
            write!(f, ", Name: {}", name)?;
        }
        write!(f, "]")
    }
}

/// Network settings reported by the terminal
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkParams {
    pub ip: String,
    pub mask: String,
    pub gateway: String,
}
