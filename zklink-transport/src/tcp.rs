//! TCP transport
//!
//! Every packet travels inside the 8-byte top frame. Reads are fed to a
//! [`FrameDecoder`], so a frame split over several reads is reassembled and
//! bytes belonging to the next frame are kept for the following call.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, trace, warn};
use zklink_core::{
    TransportKind,
    frame::{self, FrameDecoder, TCP_HEADER_SIZE},
};

use crate::{DEFAULT_TIMEOUT, Transport, error::*, resolve};

/// Smallest read issued while waiting for a frame
const READ_CHUNK: usize = 1024;

/// TCP transport for ZKTeco devices
pub struct TcpTransport {
    addr: String,
    port: u16,
    socket_addr: Option<SocketAddr>,
    stream: Option<TcpStream>,
    decoder: FrameDecoder,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl TcpTransport {
    /// Create new TCP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            socket_addr: None,
            stream: None,
            decoder: FrameDecoder::new(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.socket_addr {
            return Ok(addr);
        }

        let addr = resolve(&self.addr, self.port).await?;
        self.socket_addr = Some(addr);
        Ok(addr)
    }

    /// One socket read of at most `max_len` bytes, bounded by the read timeout
    async fn read_some(&mut self, max_len: usize) -> Result<BytesMut> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        let mut buf = BytesMut::with_capacity(max_len.max(1));
        let n = timeout(self.read_timeout, stream.read_buf(&mut buf))
            .await
            .map_err(|_| Error::ReadTimeout)?
            .map_err(Error::Io)?;

        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        trace!(bytes = n, head = ?&buf[..n.min(16)], "TCP read");

        Ok(buf)
    }

    /// Read the next complete frame and return its inner packet
    ///
    /// Keeps reading until the length announced by the top frame has
    /// arrived. Surplus bytes stay buffered for the next call.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] when the stream does not start with the frame
    /// magic; the buffered bytes are discarded so the next call starts
    /// clean.
    pub async fn recv_framed(&mut self) -> Result<Bytes> {
        loop {
            match self.decoder.decode() {
                Ok(Some(packet)) => return Ok(packet),
                Ok(None) => {}
                Err(e) => {
                    warn!(buffered = self.decoder.buffered(), "Dropping unframed TCP bytes: {}", e);
                    self.decoder.clear();
                    return Err(e.into());
                }
            }

            let want = self.decoder.missing().max(TCP_HEADER_SIZE).max(READ_CHUNK);
            let chunk = self.read_some(want).await?;

            if self.decoder.buffered() > 0 {
                debug!(
                    buffered = self.decoder.buffered(),
                    missing = self.decoder.missing(),
                    "Partial TCP frame, reading more"
                );
            }
            self.decoder.extend(&chunk);
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let addr = self.resolve_addr().await?;

        debug!("Connecting to {}...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)?
            .map_err(Error::Io)?;

        stream.set_nodelay(true)?;

        debug!("Connected to {}", addr);

        self.decoder.clear();
        self.stream = Some(stream);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Disconnecting from {}...", self.remote_addr());

            let _ = stream.shutdown().await;
        }

        self.decoder.clear();
        self.socket_addr = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Tcp
    }

    fn timeout(&self) -> Duration {
        self.read_timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        trace!(bytes = data.len(), head = ?&data[..data.len().min(16)], "TCP write");

        stream.write_all(data).await?;
        stream.flush().await?;

        Ok(())
    }

    async fn recv_raw(&mut self, max_len: usize) -> Result<BytesMut> {
        if self.decoder.buffered() > 0 {
            return Ok(BytesMut::from(self.decoder.take(max_len).as_ref()));
        }
        self.read_some(max_len).await
    }

    async fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.send_raw(&frame::wrap(packet)).await
    }

    async fn recv_packet(&mut self, _max_len: usize) -> Result<Bytes> {
        self.recv_framed().await
    }

    fn remote_addr(&self) -> String {
        self.socket_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("TCP transport dropped while still connected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;

    async fn pair() -> (TcpTransport, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut transport = TcpTransport::new("127.0.0.1", port).with_read_timeout(Duration::from_secs(2));
        let (connected, accepted) = tokio::join!(transport.connect(), listener.accept());
        connected.unwrap();

        (transport, accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_tcp_transport_create() {
        let transport = TcpTransport::new("192.168.1.201", 4370);
        assert!(!transport.is_connected());
        assert_eq!(transport.kind(), TransportKind::Tcp);
        assert_eq!(transport.remote_addr(), "192.168.1.201:4370");
    }

    #[tokio::test]
    async fn test_tcp_transport_invalid_address() {
        let mut transport = TcpTransport::new("invalid..address", 4370)
            .with_connect_timeout(Duration::from_millis(100));

        let result = transport.connect().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_send_packet_adds_frame() {
        let (mut transport, mut peer) = pair().await;

        transport.send_packet(&[0xE8, 0x03, 0x17, 0xFC, 0, 0, 0, 0]).await.unwrap();

        let mut buf = [0u8; 16];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(
            buf,
            [0x50, 0x50, 0x82, 0x7D, 8, 0, 0, 0, 0xE8, 0x03, 0x17, 0xFC, 0, 0, 0, 0]
        );

        transport.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_reassembles_split_frame() {
        let (mut transport, mut peer) = pair().await;
        let payload: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        let framed = frame::wrap(&payload);

        let writer = tokio::spawn(async move {
            for part in [&framed[..5], &framed[5..1200], &framed[1200..]] {
                peer.write_all(part).await.unwrap();
                peer.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            peer
        });

        let packet = transport.recv_packet(1032).await.unwrap();
        assert_eq!(packet.as_ref(), payload.as_slice());

        writer.await.unwrap();
        transport.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_keeps_next_frame() {
        let (mut transport, mut peer) = pair().await;

        let mut stream = frame::wrap(b"first").to_vec();
        stream.extend_from_slice(&frame::wrap(b"second"));
        peer.write_all(&stream).await.unwrap();

        assert_eq!(transport.recv_packet(1032).await.unwrap().as_ref(), b"first");
        assert_eq!(transport.recv_packet(1032).await.unwrap().as_ref(), b"second");

        transport.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_rejects_bad_magic() {
        let (mut transport, mut peer) = pair().await;

        peer.write_all(&[0xE8, 0x03, 0x17, 0xFC, 0, 0, 0, 0]).await.unwrap();

        match transport.recv_packet(1032).await {
            Err(Error::Protocol(e)) => assert!(e.is_framing()),
            other => panic!("unexpected {other:?}"),
        }

        transport.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_recv_timeout_and_close() {
        let (mut transport, peer) = pair().await;
        transport.set_timeout(Duration::from_millis(50));

        let err = transport.recv_packet(1032).await.unwrap_err();
        assert!(err.is_timeout());

        drop(peer);
        assert!(matches!(
            transport.recv_packet(1032).await,
            Err(Error::ConnectionClosed) | Err(Error::Io(_))
        ));

        transport.disconnect().await.unwrap();
    }
}
