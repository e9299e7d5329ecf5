//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

/// Broad classes of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Command attempted while not connected
    Connection,
    /// I/O failure, timeout, reset or absent frame
    Network,
    /// Device refused the command or answered unexpectedly
    Response,
    /// Bytes could not be split into records or frames
    Framing,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Device not connected")]
    NotConnected,

    #[error("Transport error: {0}")]
    Transport(#[from] zklink_transport::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] zklink_core::Error),

    #[error("Invalid value: {0}")]
    Value(#[from] zklink_types::Error),

    /// Device answered with a refusal or an unexpected code
    #[error("Device refused: {0}")]
    Response(String),

    /// Device answered with a payload that cannot be interpreted
    #[error("Invalid response from device: {0}")]
    Malformed(String),

    /// Reachability probe failed before connecting
    #[error("Device unreachable: {0}")]
    Unreachable(String),
}

impl Error {
    pub(crate) fn response(msg: impl Into<String>) -> Self {
        Self::Response(msg.into())
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConnected => ErrorKind::Connection,
            Self::Transport(zklink_transport::Error::Protocol(e)) if e.is_framing() => ErrorKind::Framing,
            Self::Transport(zklink_transport::Error::NotConnected) => ErrorKind::Connection,
            Self::Transport(_) | Self::Unreachable(_) => ErrorKind::Network,
            Self::Protocol(e) if e.is_framing() => ErrorKind::Framing,
            Self::Protocol(zklink_core::Error::PacketTooShort { .. }) => ErrorKind::Network,
            Self::Protocol(_) | Self::Value(_) | Self::Response(_) | Self::Malformed(_) => ErrorKind::Response,
        }
    }

    /// Check if a receive timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::NotConnected.kind(), ErrorKind::Connection);
        assert_eq!(Error::from(zklink_transport::Error::ReadTimeout).kind(), ErrorKind::Network);
        assert_eq!(Error::response("unauthorized").kind(), ErrorKind::Response);

        let framing = zklink_core::Error::UnknownRecordLength {
            record: "live event",
            length: 11,
        };
        assert_eq!(Error::from(framing).kind(), ErrorKind::Framing);

        let bad_magic = zklink_transport::Error::Protocol(zklink_core::Error::InvalidFrame {
            magic1: 0,
            magic2: 0,
        });
        assert_eq!(Error::from(bad_magic).kind(), ErrorKind::Framing);

        let short = zklink_core::Error::PacketTooShort { expected: 8, actual: 2 };
        assert_eq!(Error::from(short).kind(), ErrorKind::Network);

        let value = zklink_types::Error::Validation("card".into());
        assert_eq!(Error::from(value).kind(), ErrorKind::Response);
    }

    #[test]
    fn test_is_timeout() {
        assert!(Error::from(zklink_transport::Error::ReadTimeout).is_timeout());
        assert!(!Error::from(zklink_transport::Error::ConnectionClosed).is_timeout());
        assert!(!Error::NotConnected.is_timeout());
    }
}
