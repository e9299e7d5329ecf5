//! Plain data holders for records exchanged with ZKTeco terminals.
//!
//! Nothing here touches the wire. Encoding and decoding lives in
//! `zklink-core::record`.

pub mod attendance;
pub mod device_info;
pub mod error;
pub mod finger;
pub mod sizes;
pub mod time;
pub mod user;

pub use attendance::Attendance;
pub use device_info::{DeviceInfo, NetworkParams};
pub use error::{Error, Result};
pub use finger::Finger;
pub use sizes::DeviceSizes;
pub use time::DeviceTime;
pub use user::{NewUser, User, privilege};
