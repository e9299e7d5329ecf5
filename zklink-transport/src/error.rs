//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Read timeout")]
    ReadTimeout,

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The byte stream could not be split into packets
    #[error("Protocol error: {0}")]
    Protocol(#[from] zklink_core::Error),
}

impl Error {
    /// Check if a receive ran out of time rather than failing
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::ReadTimeout | Self::ConnectionTimeout => true,
            Self::Io(e) => e.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}
