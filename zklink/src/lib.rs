//! # zklink
//!
//! Async client for ZKTeco biometric attendance terminals.
//!
//! ## Features
//!
//! - TCP and UDP transports with automatic detection
//! - CommKey authentication
//! - Users, fingerprint templates and attendance logs through buffered
//!   transfers
//! - Real-time event capture with cooperative cancellation
//!
//! ## Quick Start
//!
//! ```no_run
//! use zklink::{Device, DeviceConfig};
//!
//! #[tokio::main]
//! async fn main() -> zklink::Result<()> {
//!     let config = DeviceConfig::new("192.168.1.201").with_password(0);
//!     let mut device = Device::new(config);
//!     device.connect().await?;
//!
//!     for user in device.get_users().await? {
//!         println!("{}", user);
//!     }
//!
//!     device.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod attendance;
pub mod channel;
pub mod config;
pub mod device;
pub mod error;
pub mod info;
pub mod live;
pub mod probe;
pub mod transfer;
pub mod users;

#[cfg(test)]
mod testing;

pub use channel::{CommandChannel, CommandResult};
pub use config::DeviceConfig;
pub use device::Device;
pub use error::{Error, ErrorKind, Result};
pub use live::{LiveCaptureOptions, LiveEvent, StopToken};
pub use probe::{Reachability, SocketProbe};
pub use users::UserKey;

pub use zklink_core::{Command, EventFlags, Packet, Session, TransportKind};
pub use zklink_transport::{TcpTransport, Transport, UdpTransport};
pub use zklink_types::{Attendance, DeviceInfo, DeviceSizes, DeviceTime, Finger, NetworkParams, NewUser, User, privilege};
