//! Command/response exchange over one transport
//!
//! A [`CommandChannel`] owns the transport and the [`Session`]. Every
//! method takes `&mut self`, so exactly one command is in flight per
//! connection and the reply-id sequence cannot be interleaved.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};
use zklink_core::{Command, Packet, Session, TransportKind, auth, command::describe};
use zklink_transport::Transport;

use crate::error::{Error, Result};

/// Reply id carried by untracked acknowledgements
const UNTRACKED_REPLY_ID: u16 = Session::INITIAL_REPLY_ID;

/// Device answer to one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Response code
    pub code: u16,
    pub payload: Bytes,
    pub session_id: u16,
    /// Reply id echoed by the device
    pub reply_id: u16,
}

impl CommandResult {
    /// `ACK_OK`, `PREPARE_DATA` or `DATA`
    pub fn is_success(&self) -> bool {
        Command::is_success_code(self.code)
    }

    pub fn is(&self, command: Command) -> bool {
        self.code == u16::from(command)
    }
}

impl From<Packet> for CommandResult {
    fn from(packet: Packet) -> Self {
        Self {
            code: packet.command,
            payload: packet.payload,
            session_id: packet.session_id,
            reply_id: packet.reply_id,
        }
    }
}

/// Command channel to one terminal
pub struct CommandChannel {
    transport: Box<dyn Transport>,
    session: Session,
    strict: bool,
}

impl CommandChannel {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        let session = Session::new(transport.kind());
        Self {
            transport,
            session,
            strict: false,
        }
    }

    /// Verify the checksum of every response
    pub fn with_strict_checksum(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected() && self.transport.is_connected()
    }

    pub fn timeout(&self) -> Duration {
        self.transport.timeout()
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.transport.set_timeout(timeout);
    }

    pub fn remote_addr(&self) -> String {
        self.transport.remote_addr()
    }

    /// Send a command and wait for its response
    ///
    /// `response_size` is the payload size expected back; it bounds the
    /// datagram read over UDP.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] for anything but `CONNECT`/`AUTH` before the
    /// handshake completed. A refusal by the device is not an error here;
    /// check [`CommandResult::is_success`].
    pub async fn send(&mut self, command: Command, payload: &[u8], response_size: usize) -> Result<CommandResult> {
        if !matches!(command, Command::Connect | Command::Auth) && !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let packet = Packet::request(
            command,
            self.session.session_id(),
            self.session.reply_id(),
            payload,
        );
        self.session.sent(packet.reply_id);

        debug!(
            command = %command,
            session_id = packet.session_id,
            reply_id = packet.reply_id,
            len = payload.len(),
            "Sending command"
        );

        self.transport.send_packet(&packet.encode()).await?;

        let response = self.receive(response_size + Packet::HEADER_SIZE).await?;
        self.session.acknowledged(response.reply_id);

        debug!(
            response = %describe(response.command),
            reply_id = response.reply_id,
            len = response.payload.len(),
            "Received response"
        );

        Ok(response.into())
    }

    /// Receive the next packet without sending anything
    ///
    /// Used for unsolicited packets: chunk data, live events, enrollment
    /// progress. The reply id is not advanced.
    pub async fn receive(&mut self, max_len: usize) -> Result<Packet> {
        let bytes = self.transport.recv_packet(max_len).await?;
        let packet = Packet::decode(bytes)?;

        trace!(packet = %packet, checksum = packet.checksum, "Received packet");

        if self.strict {
            packet.verify_checksum()?;
        }

        Ok(packet)
    }

    /// Acknowledge an unsolicited packet
    pub async fn ack_ok(&mut self) -> Result<()> {
        let packet = Packet::request(Command::AckOk, self.session.session_id(), UNTRACKED_REPLY_ID, &[]);
        self.transport.send_packet(&packet.encode()).await?;
        Ok(())
    }

    /// Open the transport and run `CONNECT`, answering a challenge with `AUTH`
    ///
    /// # Errors
    ///
    /// [`Error::Response`] when the device refuses the connection or still
    /// answers `ACK_UNAUTH` after the key was sent. The transport is closed
    /// again on failure.
    pub async fn handshake(&mut self, password: u32, ticks: u8) -> Result<()> {
        if !self.transport.is_connected() {
            self.transport.connect().await?;
        }

        let result = self.authenticate(password, ticks).await;
        if result.is_err() {
            self.session.close();
            if let Err(e) = self.transport.disconnect().await {
                warn!("Failed to close transport after handshake error: {}", e);
            }
        }
        result
    }

    async fn authenticate(&mut self, password: u32, ticks: u8) -> Result<()> {
        self.session.begin();

        let mut response = self.send(Command::Connect, &[], 0).await?;
        self.session.adopt(response.session_id);

        if response.is(Command::AckUnauth) {
            info!(session_id = response.session_id, "Device requires authentication");

            let key = auth::make_commkey(password, self.session.session_id(), ticks);
            trace!(key = ?key.as_ref(), "CommKey");

            response = self.send(Command::Auth, &key, 0).await?;
        }

        if response.is_success() {
            self.session.establish();
            info!(session_id = self.session.session_id(), "Session established");
            Ok(())
        } else if response.is(Command::AckUnauth) {
            Err(Error::response("Unauthenticated"))
        } else {
            Err(Error::Response(format!(
                "Can't connect: {}",
                describe(response.code)
            )))
        }
    }

    /// Send `EXIT` and close the transport
    pub async fn close(&mut self) -> Result<()> {
        let response = self.send(Command::Exit, &[], 0).await?;
        if !response.is_success() {
            return Err(Error::response("Can't disconnect"));
        }

        self.transport.disconnect().await?;
        self.session.close();
        Ok(())
    }

    /// Drop the session without `EXIT`, for commands after which the device goes away
    pub async fn abandon(&mut self) -> Result<()> {
        self.session.close();
        self.transport.disconnect().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedTransport, respond};
    use pretty_assertions::assert_eq;

    const SESSION: u16 = 0x51A3;

    fn plain_device() -> ScriptedTransport {
        ScriptedTransport::udp(|request| vec![Reply::Packet(respond(request, Command::AckOk, SESSION, &[]))])
    }

    #[tokio::test]
    async fn test_handshake_without_password() {
        let transport = plain_device();
        let sent = transport.sent();
        let mut channel = CommandChannel::new(Box::new(transport));

        channel.handshake(0, 50).await.unwrap();

        assert!(channel.is_connected());
        assert_eq!(channel.session().session_id(), SESSION);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].encode().as_ref(),
            &[0xE8, 0x03, 0x17, 0xFC, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[tokio::test]
    async fn test_ack_unauth_sends_exactly_one_auth() {
        let transport = ScriptedTransport::udp(|request| {
            let code = if request.is(Command::Connect) {
                Command::AckUnauth
            } else {
                Command::AckOk
            };
            vec![Reply::Packet(respond(request, code, SESSION, &[]))]
        });
        let sent = transport.sent();
        let mut channel = CommandChannel::new(Box::new(transport));

        channel.handshake(1, 50).await.unwrap();

        let sent = sent.lock().unwrap();
        let auths: Vec<_> = sent.iter().filter(|p| p.is(Command::Auth)).collect();
        assert_eq!(auths.len(), 1);
        assert_eq!(auths[0].session_id, SESSION);
        assert_eq!(auths[0].payload, auth::make_commkey(1, SESSION, 50));
    }

    #[tokio::test]
    async fn test_auth_rejected_is_response_error() {
        let transport = ScriptedTransport::udp(|request| {
            vec![Reply::Packet(respond(request, Command::AckUnauth, SESSION, &[]))]
        });
        let sent = transport.sent();
        let mut channel = CommandChannel::new(Box::new(transport));

        let err = channel.handshake(99, 50).await.unwrap_err();

        assert!(matches!(err, Error::Response(ref msg) if msg == "Unauthenticated"));
        assert!(!channel.is_connected());
        // CONNECT, then one AUTH, no more
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let transport = ScriptedTransport::udp(|request| {
            vec![Reply::Packet(respond(request, Command::AckError, 0, &[]))]
        });
        let mut channel = CommandChannel::new(Box::new(transport));

        let err = channel.handshake(0, 50).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Response);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let mut channel = CommandChannel::new(Box::new(plain_device()));

        let err = channel.send(Command::GetVersion, &[], 1024).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_reply_id_follows_device_echo() {
        let transport = ScriptedTransport::udp(|request| {
            let mut response = respond(request, Command::AckOk, SESSION, &[]);
            if request.is(Command::GetVersion) {
                response = Packet::new(Command::AckOk, SESSION, 500, Bytes::new());
            }
            vec![Reply::Packet(response)]
        });
        let sent = transport.sent();
        let mut channel = CommandChannel::new(Box::new(transport));

        channel.handshake(0, 50).await.unwrap();
        assert_eq!(channel.session().reply_id(), 0);

        channel.send(Command::GetVersion, &[], 1024).await.unwrap();
        assert_eq!(channel.session().reply_id(), 500);

        channel.send(Command::EnableDevice, &[], 0).await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent[1].reply_id, 1);
        assert_eq!(sent[2].reply_id, 501);
    }

    #[tokio::test]
    async fn test_strict_checksum() {
        let transport = ScriptedTransport::udp(|request| {
            let mut response = respond(request, Command::AckOk, SESSION, &[]);
            response.checksum ^= 0x00FF;
            vec![Reply::Packet(response)]
        });

        let mut lenient = CommandChannel::new(Box::new(transport));
        lenient.handshake(0, 50).await.unwrap();

        let transport = ScriptedTransport::udp(|request| {
            let mut response = respond(request, Command::AckOk, SESSION, &[]);
            response.checksum ^= 0x00FF;
            vec![Reply::Packet(response)]
        });
        let mut strict = CommandChannel::new(Box::new(transport)).with_strict_checksum(true);
        let err = strict.handshake(0, 50).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(zklink_core::Error::ChecksumMismatch { .. })));
    }

    #[tokio::test]
    async fn test_ack_ok_is_untracked() {
        let transport = plain_device();
        let sent = transport.sent();
        let mut channel = CommandChannel::new(Box::new(transport));
        channel.handshake(0, 50).await.unwrap();

        channel.ack_ok().await.unwrap();

        let sent = sent.lock().unwrap();
        let ack = sent.last().unwrap();
        assert!(ack.is(Command::AckOk));
        assert_eq!(ack.session_id, SESSION);
        assert_eq!(ack.reply_id, 0);
        assert_eq!(channel.session().reply_id(), 0);
    }

    #[tokio::test]
    async fn test_close() {
        let transport = plain_device();
        let sent = transport.sent();
        let mut channel = CommandChannel::new(Box::new(transport));
        channel.handshake(0, 50).await.unwrap();

        channel.close().await.unwrap();

        assert!(!channel.is_connected());
        assert!(sent.lock().unwrap().last().unwrap().is(Command::Exit));
    }
}
