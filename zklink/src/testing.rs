//! In-memory transport driven by a request handler

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use zklink_core::{Command, Packet, TransportKind};
use zklink_transport::{Error, Result, Transport};

use crate::{Device, DeviceConfig};

/// What the scripted device does in response to one request
#[derive(Debug, Clone)]
pub enum Reply {
    Packet(Packet),
    /// The next receive times out
    Timeout,
    /// The next receive finds the connection closed
    Closed,
}

type Handler = Box<dyn FnMut(&Packet) -> Vec<Reply> + Send>;

/// Transport that answers each sent packet through `handler`
///
/// Replies are queued and handed out by `recv_packet`; an empty queue
/// reads as a timeout.
pub struct ScriptedTransport {
    kind: TransportKind,
    connected: bool,
    timeout: Duration,
    handler: Handler,
    inbox: VecDeque<Reply>,
    sent: Arc<Mutex<Vec<Packet>>>,
    timeouts: Arc<Mutex<Vec<Duration>>>,
}

impl ScriptedTransport {
    pub fn new(kind: TransportKind, handler: impl FnMut(&Packet) -> Vec<Reply> + Send + 'static) -> Self {
        Self {
            kind,
            connected: false,
            timeout: Duration::from_secs(60),
            handler: Box::new(handler),
            inbox: VecDeque::new(),
            sent: Arc::default(),
            timeouts: Arc::default(),
        }
    }

    pub fn udp(handler: impl FnMut(&Packet) -> Vec<Reply> + Send + 'static) -> Self {
        Self::new(TransportKind::Udp, handler)
    }

    pub fn tcp(handler: impl FnMut(&Packet) -> Vec<Reply> + Send + 'static) -> Self {
        Self::new(TransportKind::Tcp, handler)
    }

    /// Log of every packet sent, shared with the test
    pub fn sent(&self) -> Arc<Mutex<Vec<Packet>>> {
        Arc::clone(&self.sent)
    }

    /// Every timeout passed to `set_timeout`
    pub fn timeouts(&self) -> Arc<Mutex<Vec<Duration>>> {
        Arc::clone(&self.timeouts)
    }
}

/// Response to `request` echoing its reply id
pub fn respond(request: &Packet, code: Command, session_id: u16, payload: &[u8]) -> Packet {
    Packet::new(code, session_id, request.reply_id, Bytes::copy_from_slice(payload))
}

/// Unsolicited packet pushed by the device
pub fn push(code: Command, session_id: u16, payload: &[u8]) -> Packet {
    Packet::new(code, session_id, 0, Bytes::copy_from_slice(payload))
}

/// Device handle connected over `transport`, with the probe skipped
pub async fn connected_device(transport: ScriptedTransport) -> Device {
    let config = DeviceConfig::new("scripted").with_omit_ping(true).with_force_udp(true);
    let mut device = Device::with_transport(config, Box::new(transport));
    device.connect().await.unwrap();
    device
}

/// `CMD_GET_FREE_SIZES` payload reporting the given record counts
pub fn sizes_payload(users: i32, fingers: i32, records: i32) -> Vec<u8> {
    let mut fields = [0i32; 20];
    fields[4] = users;
    fields[6] = fingers;
    fields[8] = records;
    fields.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Commands sent, in order
pub fn commands(sent: &Arc<Mutex<Vec<Packet>>>) -> Vec<u16> {
    sent.lock().unwrap().iter().map(|p| p.command).collect()
}

/// Number of `command` packets sent
pub fn count(sent: &Arc<Mutex<Vec<Packet>>>, command: Command) -> usize {
    sent.lock().unwrap().iter().filter(|p| p.is(command)).count()
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeouts.lock().unwrap().push(timeout);
        self.timeout = timeout;
    }

    async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.send_packet(data).await
    }

    async fn recv_raw(&mut self, max_len: usize) -> Result<BytesMut> {
        let packet = self.recv_packet(max_len).await?;
        Ok(BytesMut::from(packet.as_ref()))
    }

    async fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        let packet = Packet::decode(Bytes::copy_from_slice(packet))?;
        let replies = (self.handler)(&packet);
        self.sent.lock().unwrap().push(packet);
        self.inbox.extend(replies);
        Ok(())
    }

    async fn recv_packet(&mut self, _max_len: usize) -> Result<Bytes> {
        match self.inbox.pop_front() {
            Some(Reply::Packet(packet)) => Ok(packet.encode().freeze()),
            Some(Reply::Closed) => Err(Error::ConnectionClosed),
            Some(Reply::Timeout) | None => Err(Error::ReadTimeout),
        }
    }

    fn remote_addr(&self) -> String {
        "scripted".to_string()
    }
}
