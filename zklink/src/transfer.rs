//! Buffered bulk transfer
//!
//! Data sets larger than one packet (users, templates, attendance logs)
//! are staged in a device-side buffer. Reading:
//!
//! 1. `_CMD_PREPARE_BUFFER` announces the data set and returns its size
//! 2. `_CMD_READ_BUFFER` pulls it in chunks, each retried up to three times
//! 3. `CMD_FREE_DATA` releases the buffer, whatever happened before
//!
//! Writing goes `CMD_FREE_DATA`, `CMD_PREPARE_DATA` with the total size,
//! then `CMD_DATA` chunks of at most 1024 bytes.

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};
use zklink_core::{
    Command, TransportKind,
    constants::{MAX_DATA_CHUNK, MAX_RETRIES},
};

use crate::{
    channel::{CommandChannel, CommandResult},
    error::{Error, ErrorKind, Result},
};

/// Payload size requested for the prepare exchange
const PREPARE_RESPONSE_SIZE: usize = 1024;

/// Datagram payload size used for chunk reads over UDP
const UDP_CHUNK_RESPONSE_SIZE: usize = 1024 + 8;

impl CommandChannel {
    /// Read a whole data set through the device buffer
    ///
    /// `command` selects the data set (`CMD_USERTEMP_RRQ`, `CMD_DB_RRQ`,
    /// `CMD_ATTLOG_RRQ`), `fct` and `ext` narrow it.
    ///
    /// # Errors
    ///
    /// [`Error::Response`] when the device does not support buffered reads
    /// or a chunk still fails after three attempts. `CMD_FREE_DATA` is sent
    /// exactly once either way.
    pub async fn read_with_buffer(&mut self, command: Command, fct: u8, ext: i32) -> Result<Bytes> {
        let mut payload = BytesMut::with_capacity(11);
        payload.put_u8(1);
        payload.put_u16_le(command.into());
        payload.put_i32_le(fct as i32);
        payload.put_i32_le(ext);

        let response = self.send(Command::PrepareBuffer, &payload, PREPARE_RESPONSE_SIZE).await?;
        if !response.is_success() {
            return Err(Error::response("RWB not supported"));
        }

        if response.is(Command::Data) {
            debug!(len = response.payload.len(), "Data set returned inline");
            return Ok(response.payload);
        }

        let size = response
            .payload
            .get(1..5)
            .map(LittleEndian::read_u32)
            .ok_or_else(|| Error::Malformed(format!("prepare buffer reply of {} bytes", response.payload.len())))?
            as usize;

        let max_chunk = self.kind().max_chunk();
        debug!(
            size,
            chunks = size.div_ceil(max_chunk),
            max_chunk,
            "Reading buffered data set"
        );

        let mut data = BytesMut::with_capacity(size);
        let read = self.read_chunks(size, max_chunk, &mut data).await;
        let freed = self.free_data().await;

        read?;
        freed?;

        Ok(data.freeze())
    }

    async fn read_chunks(&mut self, size: usize, max_chunk: usize, out: &mut BytesMut) -> Result<()> {
        let mut start = 0;
        while start < size {
            let len = max_chunk.min(size - start);
            let chunk = self.read_chunk(start, len).await?;
            out.extend_from_slice(&chunk);
            start += len;
        }
        Ok(())
    }

    /// Read `[start, start + len)` from the device buffer
    async fn read_chunk(&mut self, start: usize, len: usize) -> Result<Bytes> {
        let mut payload = BytesMut::with_capacity(8);
        payload.put_i32_le(start as i32);
        payload.put_i32_le(len as i32);

        let response_size = match self.kind() {
            TransportKind::Tcp => len + 32,
            TransportKind::Udp => UDP_CHUNK_RESPONSE_SIZE,
        };

        for attempt in 1..=MAX_RETRIES {
            let outcome = match self.send(Command::ReadBuffer, &payload, response_size).await {
                Ok(response) => self.receive_chunk(&response).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(Some(chunk)) => return Ok(chunk),
                Ok(None) => warn!(start, len, attempt, "Chunk refused, retrying"),
                Err(e) if e.kind() == ErrorKind::Network => {
                    warn!(start, len, attempt, "Chunk read failed, retrying: {}", e)
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Response(format!("can't read chunk {}:[{}]", start, len)))
    }

    /// Collect the data that answers a chunk request
    ///
    /// `CMD_DATA` carries the chunk inline. `CMD_PREPARE_DATA` announces it
    /// and is followed by `CMD_DATA` packets up to a closing `CMD_ACK_OK`.
    /// Anything else yields `None`.
    pub(crate) async fn receive_chunk(&mut self, response: &CommandResult) -> Result<Option<Bytes>> {
        if response.is(Command::Data) {
            return Ok(Some(response.payload.clone()));
        }

        if !response.is(Command::PrepareData) {
            debug!(code = response.code, "Chunk request answered without data");
            return Ok(None);
        }

        let announced = response.payload.get(0..4).map(LittleEndian::read_u32).unwrap_or(0) as usize;
        let mut data = BytesMut::with_capacity(announced);

        loop {
            let packet = self.receive(UDP_CHUNK_RESPONSE_SIZE).await?;

            if packet.is(Command::Data) {
                data.extend_from_slice(&packet.payload);
            } else if packet.is(Command::AckOk) {
                break;
            } else {
                warn!(code = packet.command, received = data.len(), announced, "Unexpected packet in chunk");
                return Ok(None);
            }
        }

        if data.len() != announced {
            debug!(received = data.len(), announced, "Chunk size differs from announcement");
        }

        Ok(Some(data.freeze()))
    }

    /// Upload `buffer` into the device buffer
    ///
    /// # Errors
    ///
    /// [`Error::Response`] on the first refused step; nothing is retried.
    pub async fn send_with_buffer(&mut self, buffer: &[u8]) -> Result<()> {
        self.free_data().await?;

        let size = (buffer.len() as u32).to_le_bytes();
        let response = self.send(Command::PrepareData, &size, 0).await?;
        if !response.is_success() {
            return Err(Error::response("Can't prepare data"));
        }

        debug!(size = buffer.len(), chunks = buffer.len().div_ceil(MAX_DATA_CHUNK), "Uploading buffer");

        for chunk in buffer.chunks(MAX_DATA_CHUNK) {
            let response = self.send(Command::Data, chunk, 0).await?;
            if !response.is_success() {
                return Err(Error::response("Can't send chunk"));
            }
        }

        Ok(())
    }

    /// Release the device buffer
    pub async fn free_data(&mut self) -> Result<()> {
        let response = self.send(Command::FreeData, &[], 0).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(Error::response("Can't free data"))
        }
    }
}
