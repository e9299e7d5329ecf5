//! Attendance records

use std::fmt;

use crate::time::DeviceTime;

/// One punch recorded by the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendance {
    pub user_id: String,
    pub uid: u16,
    pub timestamp: DeviceTime,
    /// Verification method
    pub status: u8,
    /// Check-in/out direction
    pub punch: u8,
}

impl fmt::Display for Attendance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Attendance>: {} : {} ({}, {})",
            self.user_id, self.timestamp, self.status, self.punch
        )
    }
}
