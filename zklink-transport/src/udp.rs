//! UDP transport for ZKTeco devices
//!
//! Most ZKTeco devices listen for UDP on port 4370. Packets carry no top
//! frame: one datagram is one packet.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use zklink_core::{Packet, TransportKind};

use crate::{DEFAULT_TIMEOUT, Transport, error::*, resolve};

/// UDP transport for ZKTeco devices
pub struct UdpTransport {
    addr: String,
    port: u16,
    socket: Option<UdpSocket>,
    remote_addr: Option<SocketAddr>,
    read_timeout: Duration,
}

impl UdpTransport {
    /// Create new UDP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket: None,
            remote_addr: None,
            read_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.remote_addr {
            return Ok(addr);
        }

        let addr = resolve(&self.addr, self.port).await?;
        self.remote_addr = Some(addr);
        Ok(addr)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let remote = self.resolve_addr().await?;

        debug!("Connecting to {} via UDP...", remote);

        let local = if remote.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await.map_err(Error::Io)?;

        // Sets the default send/recv peer; datagrams from elsewhere are dropped
        socket.connect(remote).await.map_err(Error::Io)?;

        debug!("Connected to {} via UDP", remote);

        self.socket = Some(socket);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            debug!("Disconnecting from {}...", self.remote_addr());
        }

        self.remote_addr = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    fn timeout(&self) -> Duration {
        self.read_timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;

        trace!(bytes = data.len(), head = ?&data[..data.len().min(32)], "UDP send");

        socket.send(data).await.map_err(Error::Io)?;

        Ok(())
    }

    async fn recv_raw(&mut self, max_len: usize) -> Result<BytesMut> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;

        // A datagram never shrinks below one packet header
        let mut buf = BytesMut::zeroed(max_len.max(Packet::HEADER_SIZE));

        let n = timeout(self.read_timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| Error::ReadTimeout)?
            .map_err(|e| {
                warn!("UDP read error: {}", e);
                Error::Io(e)
            })?;

        if n == 0 {
            warn!("Received empty datagram");
            return Err(Error::ConnectionClosed);
        }

        buf.truncate(n);

        trace!(bytes = n, head = ?&buf[..n.min(32)], "UDP recv");

        Ok(buf)
    }

    async fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.send_raw(packet).await
    }

    async fn recv_packet(&mut self, max_len: usize) -> Result<Bytes> {
        Ok(self.recv_raw(max_len).await?.freeze())
    }

    fn remote_addr(&self) -> String {
        self.remote_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}
