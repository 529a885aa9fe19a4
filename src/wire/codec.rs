use std::io::{Read, Write};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use bytes::Bytes;
use tracing::{debug, trace};

use crate::error::WireError;
use crate::network::NetworkParams;
use crate::wire::constants::{COMMAND_LEN, HEADER_LENGTH, MAX_MESSAGE_SIZE, PROTOCOL_VERSION};
use crate::wire::message::Message;
use crate::wire::state::WireMessage;

/// The 20 header bytes that follow the network magic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    pub command: String,
    pub size: usize,
    pub checksum: [u8; 4],
}

/// Outcome of scanning a buffer for the network magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicSearch {
    /// Magic found; the header starts at this index.
    Found(usize),
    /// No complete magic. The first `discard` bytes can never start one.
    NotFound { discard: usize },
}

/// Incremental matcher for the 4 magic bytes, most significant byte first.
#[derive(Debug, Clone, Copy)]
struct MagicMatcher {
    magic: [u8; 4],
    matched: usize,
}

impl MagicMatcher {
    fn new(magic: u32) -> Self {
        Self {
            magic: magic.to_be_bytes(),
            matched: 0,
        }
    }

    /// Feeds one byte; true once the full magic has been seen.
    fn push(&mut self, b: u8) -> bool {
        if b == self.magic[self.matched] {
            self.matched += 1;
        } else {
            // The mismatching byte may itself open a new magic.
            self.matched = usize::from(b == self.magic[0]);
        }
        if self.matched == self.magic.len() {
            self.matched = 0;
            return true;
        }
        false
    }
}

/// Frames and unframes messages for one network.
///
/// A serializer is an immutable value: changing the protocol version or the
/// retain mode produces a new one. Equal field values mean equal serializers.
///
/// Frame layout:
///
/// ```text
/// +------------+--------------+---------------+-------------+
/// | magic (4)  | command (12) | length (4 LE) | checksum(4) |
/// +------------+--------------+---------------+-------------+
/// | payload (variable, at most 32 MiB)                 ...  |
/// +----------------------------------------------------------
/// ```
///
/// The magic is written big-endian; the checksum is the first 4 bytes of
/// `SHA256(SHA256(payload))`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Serializer {
    params: NetworkParams,
    protocol_version: u32,
    parse_retain: bool,
}

impl Serializer {
    pub fn new(params: NetworkParams, parse_retain: bool) -> Self {
        Self::with_version(params, PROTOCOL_VERSION as u32, parse_retain)
    }

    pub fn with_version(params: NetworkParams, protocol_version: u32, parse_retain: bool) -> Self {
        Self {
            params,
            protocol_version,
            parse_retain,
        }
    }

    /// Same network and retain mode, different protocol version.
    pub fn with_protocol_version(&self, protocol_version: u32) -> Self {
        Self {
            protocol_version,
            ..self.clone()
        }
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    /// Whether parsed messages keep their raw bytes for cheap re-serialization.
    pub fn is_parse_retain(&self) -> bool {
        self.parse_retain
    }

    pub fn checksum(&self, payload: &[u8]) -> [u8; 4] {
        self.params.checksum_scheme().checksum(payload)
    }

    /// Scans `buf` for this network's magic.
    pub fn seek_past_magic(&self, buf: &[u8]) -> MagicSearch {
        let mut matcher = MagicMatcher::new(self.params.packet_magic());
        for (i, &b) in buf.iter().enumerate() {
            if matcher.push(b) {
                return MagicSearch::Found(i + 1);
            }
        }
        MagicSearch::NotFound {
            discard: buf.len() - matcher.matched,
        }
    }

    /// Decodes the 20 bytes after the magic.
    pub fn deserialize_header(&self, buf: &[u8]) -> Result<PacketHeader, WireError> {
        let header = buf
            .get(..HEADER_LENGTH)
            .ok_or(WireError::Truncated("packet header"))?;

        let name = &header[..COMMAND_LEN];
        let end = name.iter().position(|&b| b == 0).unwrap_or(COMMAND_LEN);
        let command = std::str::from_utf8(&name[..end])
            .map_err(|_| WireError::InvalidCommand(hex::encode(&name[..end])))?
            .to_owned();

        let mut size = [0u8; 4];
        size.copy_from_slice(&header[COMMAND_LEN..COMMAND_LEN + 4]);
        let size = i32::from_le_bytes(size) as i64;
        if size < 0 || size > MAX_MESSAGE_SIZE as i64 {
            return Err(WireError::HeaderSize(size));
        }

        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&header[COMMAND_LEN + 4..HEADER_LENGTH]);

        Ok(PacketHeader {
            command,
            size: size as usize,
            checksum,
        })
    }

    /// Verifies the checksum and decodes the payload into a typed message.
    pub fn deserialize_payload(&self, header: &PacketHeader, payload: Bytes) -> Result<Message, WireError> {
        let actual = self.checksum(&payload);
        if actual != header.checksum {
            return Err(WireError::ChecksumMismatch {
                expected: hex::encode(header.checksum),
                actual: hex::encode(actual),
            });
        }
        trace!(command = %header.command, size = header.size, "decoding payload");
        Message::parse(self, &header.command, payload)
    }

    /// Decodes the first complete frame in `buf`.
    ///
    /// Returns the message and the number of bytes consumed (noise before the
    /// magic included), or `None` if `buf` does not yet hold a whole frame.
    pub fn deserialize(&self, buf: &[u8]) -> Result<Option<(Message, usize)>, WireError> {
        let start = match self.seek_past_magic(buf) {
            MagicSearch::Found(start) => start,
            MagicSearch::NotFound { .. } => return Ok(None),
        };
        if start > 4 {
            debug!(skipped = start - 4, "discarded bytes before magic");
        }
        let Some(raw) = buf.get(start..start + HEADER_LENGTH) else {
            return Ok(None);
        };
        let header = self.deserialize_header(raw)?;

        let body = start + HEADER_LENGTH;
        let Some(payload) = buf.get(body..body + header.size) else {
            return Ok(None);
        };
        let message = self.deserialize_payload(&header, Bytes::copy_from_slice(payload))?;
        Ok(Some((message, body + header.size)))
    }

    /// Writes `message` as one complete frame.
    pub fn serialize<W: Write>(&self, message: &mut Message, out: &mut W) -> Result<(), WireError> {
        let payload = message.unsafe_serialize()?;
        self.serialize_raw(message.command_name(), &payload, out)
    }

    /// Frames an already encoded payload under `command`.
    pub fn serialize_raw<W: Write>(&self, command: &str, payload: &[u8], out: &mut W) -> Result<(), WireError> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(WireError::MessageTooLarge(payload.len()));
        }
        if command.len() > COMMAND_LEN || command.contains('\0') {
            return Err(WireError::InvalidCommand(command.to_owned()));
        }
        let mut name = [0u8; COMMAND_LEN];
        name[..command.len()].copy_from_slice(command.as_bytes());

        out.write_u32::<BigEndian>(self.params.packet_magic())?;
        out.write_all(&name)?;
        out.write_u32::<LittleEndian>(payload.len() as u32)?;
        out.write_all(&self.checksum(payload))?;
        out.write_all(payload)?;

        trace!(command, size = payload.len(), "framed message");
        Ok(())
    }

    /// Frames `message` into a fresh buffer.
    pub fn frame(&self, message: &mut Message) -> Result<Vec<u8>, WireError> {
        let mut out = Vec::with_capacity(message.message_size().unwrap_or(0) + 24);
        self.serialize(message, &mut out)?;
        Ok(out)
    }

    /// Reads one frame from a blocking source, skipping noise before the magic.
    ///
    /// # Example
    ///
    /// ```
    /// use std::io::Cursor;
    /// use btc_wire::network::NetworkParams;
    /// use btc_wire::wire::{Message, Ping, Serializer};
    ///
    /// let serializer = Serializer::new(NetworkParams::mainnet(), false);
    /// let mut ping = Message::from(Ping::new(serializer.clone(), 7));
    /// let mut bytes = vec![0x00, 0x13];
    /// bytes.extend(serializer.frame(&mut ping).unwrap());
    ///
    /// let back = serializer.read_message(&mut Cursor::new(bytes)).unwrap();
    /// assert_eq!(back, ping);
    /// ```
    pub fn read_message<R: Read>(&self, reader: &mut R) -> Result<Message, WireError> {
        let mut matcher = MagicMatcher::new(self.params.packet_magic());
        let mut byte = [0u8; 1];
        loop {
            reader.read_exact(&mut byte)?;
            if matcher.push(byte[0]) {
                break;
            }
        }

        let mut raw = [0u8; HEADER_LENGTH];
        reader.read_exact(&mut raw)?;
        let header = self.deserialize_header(&raw)?;

        let mut payload = vec![0u8; header.size];
        reader.read_exact(&mut payload)?;
        self.deserialize_payload(&header, Bytes::from(payload))
    }
}
