//! Connection settings

use std::time::Duration;

use zklink_core::{DEFAULT_PORT, constants::DEFAULT_TICKS};

/// Settings for one terminal
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use zklink::DeviceConfig;
///
/// let config = DeviceConfig::new("192.168.1.201")
///     .with_password(12345)
///     .with_timeout(Duration::from_secs(10))
///     .with_force_udp(true);
///
/// assert_eq!(config.port, 4370);
/// assert_eq!(config.password, 12345);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub host: String,
    pub port: u16,
    /// Receive timeout for ordinary commands
    pub timeout: Duration,
    /// Communication password (CommKey)
    pub password: u32,
    /// Talk UDP even when TCP is available
    pub force_udp: bool,
    /// Skip the reachability check before connecting
    pub omit_ping: bool,
    /// Ticks byte mixed into the CommKey
    pub ticks: u8,
    /// Reject responses whose checksum does not match
    pub strict_checksum: bool,
    /// Receive timeout while waiting for live events
    pub live_timeout: Duration,
}

impl DeviceConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(60),
            password: 0,
            force_udp: false,
            omit_ping: false,
            ticks: DEFAULT_TICKS,
            strict_checksum: false,
            live_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    pub fn with_force_udp(mut self, force_udp: bool) -> Self {
        self.force_udp = force_udp;
        self
    }

    pub fn with_omit_ping(mut self, omit_ping: bool) -> Self {
        self.omit_ping = omit_ping;
        self
    }

    pub fn with_ticks(mut self, ticks: u8) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_strict_checksum(mut self, strict: bool) -> Self {
        self.strict_checksum = strict;
        self
    }

    pub fn with_live_timeout(mut self, timeout: Duration) -> Self {
        self.live_timeout = timeout;
        self
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
