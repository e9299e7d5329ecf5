//! Pre-connect reachability checks
//!
//! Before the handshake the client checks that the host answers at all and
//! whether it accepts TCP. Terminals reachable over TCP are newer models
//! that use 72-byte user records.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Reachability checks run before connecting
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Reachability: Send + Sync {
    /// Check whether the host answers at all
    async fn is_reachable(&self) -> bool;

    /// Attempt a raw TCP connect: 0 on success, non-zero on failure
    async fn tcp_connect(&self) -> i32;
}

/// Probe backed by plain socket connects
#[derive(Debug, Clone)]
pub struct SocketProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl SocketProbe {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn connect(&self) -> std::io::Result<TcpStream> {
        let addr = format!("{}:{}", self.host, self.port);
        timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))?
    }
}

#[async_trait]
impl Reachability for SocketProbe {
    async fn is_reachable(&self) -> bool {
        match self.connect().await {
            Ok(_) => true,
            // A refusal still proves the host is up
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => true,
            Err(e) => {
                debug!(host = %self.host, "Host not reachable: {}", e);
                false
            }
        }
    }

    async fn tcp_connect(&self) -> i32 {
        match self.connect().await {
            Ok(_) => 0,
            Err(e) => {
                debug!(host = %self.host, port = self.port, "TCP connect failed: {}", e);
                1
            }
        }
    }
}
