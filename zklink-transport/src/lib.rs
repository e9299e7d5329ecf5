//! Transport layer for ZKTeco protocol
//!
//! Provides TCP/UDP communication with devices. Both variants move whole
//! inner packets: TCP adds and strips the top frame, UDP maps one datagram
//! to one packet.

pub mod error;
pub mod tcp;
pub mod udp;

pub use error::{Error, Result};
pub use tcp::TcpTransport;
pub use udp::UdpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use zklink_core::TransportKind;

/// Default receive timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport trait for different communication methods
#[async_trait]
pub trait Transport: Send {
    /// Connect to device
    async fn connect(&mut self) -> Result<()>;

    /// Disconnect from device
    async fn disconnect(&mut self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    fn kind(&self) -> TransportKind;

    /// Receive timeout in force
    fn timeout(&self) -> Duration;

    fn set_timeout(&mut self, timeout: Duration);

    /// Send raw bytes as-is
    async fn send_raw(&mut self, data: &[u8]) -> Result<()>;

    /// Receive at most `max_len` raw bytes
    async fn recv_raw(&mut self, max_len: usize) -> Result<BytesMut>;

    /// Send one encoded inner packet
    async fn send_packet(&mut self, packet: &[u8]) -> Result<()>;

    /// Receive one complete inner packet
    ///
    /// `max_len` bounds a datagram read; stream transports return whatever
    /// length the frame announces.
    async fn recv_packet(&mut self, max_len: usize) -> Result<Bytes>;

    /// Get remote address
    fn remote_addr(&self) -> String;
}

/// Resolve `host:port` to the first socket address
pub(crate) async fn resolve(host: &str, port: u16) -> Result<std::net::SocketAddr> {
    let addr_str = format!("{}:{}", host, port);

    let mut addrs = tokio::net::lookup_host(&addr_str)
        .await
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?;

    addrs
        .next()
        .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))
}
