use std::fmt;

use byteorder::{LittleEndian, WriteBytesExt};
use bytes::Bytes;

use crate::error::WireError;
use crate::wire::address_message::{AddressFormat, AddressMessage};
use crate::wire::codec::Serializer;
use crate::wire::decode::read_u64;
use crate::wire::state::{MessageState, WireMessage};

/// Commands with a typed payload. Everything else is [`Command::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Ping,
    Pong,
    SendAddrV2,
    Addr,
    AddrV2,
    Unknown,
}

impl Command {
    pub fn from_name(name: &str) -> Self {
        match name {
            "ping" => Command::Ping,
            "pong" => Command::Pong,
            "sendaddrv2" => Command::SendAddrV2,
            "addr" => Command::Addr,
            "addrv2" => Command::AddrV2,
            _ => Command::Unknown,
        }
    }

    /// Wire name, empty for [`Command::Unknown`].
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Pong => "pong",
            Command::SendAddrV2 => "sendaddrv2",
            Command::Addr => "addr",
            Command::AddrV2 => "addrv2",
            Command::Unknown => "",
        }
    }
}

/// Keep-alive probe. Very old peers send it without a nonce.
#[derive(Debug, Clone)]
pub struct Ping {
    state: MessageState,
    nonce: Option<u64>,
}

impl Ping {
    pub fn new(serializer: Serializer, nonce: u64) -> Self {
        Self {
            state: MessageState::empty(serializer, Some(8)),
            nonce: Some(nonce),
        }
    }

    pub fn without_nonce(serializer: Serializer) -> Self {
        Self {
            state: MessageState::empty(serializer, Some(0)),
            nonce: None,
        }
    }

    fn parse(serializer: &Serializer, payload: Bytes) -> Self {
        let mut c = 0;
        let nonce = read_u64(&payload, &mut c).ok();
        Self {
            state: MessageState::parsed(serializer.clone(), &payload, 0, c),
            nonce,
        }
    }

    pub fn nonce(&self) -> Option<u64> {
        self.nonce
    }
}

impl WireMessage for Ping {
    fn state(&self) -> &MessageState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MessageState {
        &mut self.state
    }

    fn serialize_fields(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        if let Some(nonce) = self.nonce {
            out.write_u64::<LittleEndian>(nonce)?;
        }
        Ok(())
    }
}

impl PartialEq for Ping {
    fn eq(&self, other: &Self) -> bool {
        self.nonce == other.nonce
    }
}

/// Answer to a [`Ping`], echoing its nonce.
#[derive(Debug, Clone)]
pub struct Pong {
    state: MessageState,
    nonce: u64,
}

impl Pong {
    pub fn new(serializer: Serializer, nonce: u64) -> Self {
        Self {
            state: MessageState::empty(serializer, Some(8)),
            nonce,
        }
    }

    fn parse(serializer: &Serializer, payload: Bytes) -> Result<Self, WireError> {
        let mut c = 0;
        let nonce = read_u64(&payload, &mut c)?;
        Ok(Self {
            state: MessageState::parsed(serializer.clone(), &payload, 0, c),
            nonce,
        })
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }
}

impl WireMessage for Pong {
    fn state(&self) -> &MessageState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MessageState {
        &mut self.state
    }

    fn serialize_fields(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        out.write_u64::<LittleEndian>(self.nonce)?;
        Ok(())
    }
}

impl PartialEq for Pong {
    fn eq(&self, other: &Self) -> bool {
        self.nonce == other.nonce
    }
}

/// BIP155 signal that the sender prefers `addrv2`. Empty payload.
#[derive(Debug, Clone)]
pub struct SendAddrV2 {
    state: MessageState,
}

impl SendAddrV2 {
    pub fn new(serializer: Serializer) -> Self {
        Self {
            state: MessageState::empty(serializer, Some(0)),
        }
    }
}

impl WireMessage for SendAddrV2 {
    fn state(&self) -> &MessageState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MessageState {
        &mut self.state
    }

    fn serialize_fields(&self, _out: &mut Vec<u8>) -> Result<(), WireError> {
        Ok(())
    }
}

impl PartialEq for SendAddrV2 {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

/// A command this crate does not interpret; its payload is kept verbatim.
#[derive(Debug, Clone)]
pub struct UnknownMessage {
    state: MessageState,
    command: String,
    payload: Bytes,
}

impl UnknownMessage {
    pub fn new(serializer: Serializer, command: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            state: MessageState::empty(serializer, Some(payload.len())),
            command: command.into(),
            payload,
        }
    }

    fn parse(serializer: &Serializer, command: &str, payload: Bytes) -> Self {
        Self {
            state: MessageState::parsed(serializer.clone(), &payload, 0, payload.len()),
            command: command.to_string(),
            payload,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl WireMessage for UnknownMessage {
    fn state(&self) -> &MessageState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MessageState {
        &mut self.state
    }

    fn serialize_fields(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        out.extend_from_slice(&self.payload);
        Ok(())
    }
}

impl PartialEq for UnknownMessage {
    fn eq(&self, other: &Self) -> bool {
        self.command == other.command && self.payload == other.payload
    }
}

/// A decoded protocol message.
///
/// See: <https://developer.bitcoin.org/reference/p2p_networking.html>
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Ping(Ping),
    Pong(Pong),
    SendAddrV2(SendAddrV2),
    Addr(AddressMessage),
    AddrV2(AddressMessage),
    Unknown(UnknownMessage),
}

impl Message {
    /// Builds the typed message for `command` from an already verified payload.
    pub(crate) fn parse(serializer: &Serializer, command: &str, payload: Bytes) -> Result<Self, WireError> {
        Ok(match Command::from_name(command) {
            Command::Ping => Message::Ping(Ping::parse(serializer, payload)),
            Command::Pong => Message::Pong(Pong::parse(serializer, payload)?),
            Command::SendAddrV2 => Message::SendAddrV2(SendAddrV2 {
                state: MessageState::parsed(serializer.clone(), &payload, 0, 0),
            }),
            Command::Addr => {
                Message::Addr(AddressMessage::parse(serializer, payload, AddressFormat::V1)?)
            }
            Command::AddrV2 => {
                Message::AddrV2(AddressMessage::parse(serializer, payload, AddressFormat::V2)?)
            }
            Command::Unknown => Message::Unknown(UnknownMessage::parse(serializer, command, payload)),
        })
    }

    pub fn command(&self) -> Command {
        match self {
            Message::Ping(_) => Command::Ping,
            Message::Pong(_) => Command::Pong,
            Message::SendAddrV2(_) => Command::SendAddrV2,
            Message::Addr(_) => Command::Addr,
            Message::AddrV2(_) => Command::AddrV2,
            Message::Unknown(_) => Command::Unknown,
        }
    }

    /// Name written into the frame header.
    pub fn command_name(&self) -> &str {
        match self {
            Message::Unknown(m) => m.command(),
            other => other.command().name(),
        }
    }

    fn inner(&self) -> &dyn WireMessage {
        match self {
            Message::Ping(m) => m,
            Message::Pong(m) => m,
            Message::SendAddrV2(m) => m,
            Message::Addr(m) | Message::AddrV2(m) => m,
            Message::Unknown(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn WireMessage {
        match self {
            Message::Ping(m) => m,
            Message::Pong(m) => m,
            Message::SendAddrV2(m) => m,
            Message::Addr(m) | Message::AddrV2(m) => m,
            Message::Unknown(m) => m,
        }
    }
}

impl WireMessage for Message {
    fn state(&self) -> &MessageState {
        self.inner().state()
    }

    fn state_mut(&mut self) -> &mut MessageState {
        self.inner_mut().state_mut()
    }

    fn serialize_fields(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        self.inner().serialize_fields(out)
    }
}

impl From<AddressMessage> for Message {
    fn from(msg: AddressMessage) -> Self {
        match msg.format() {
            AddressFormat::V1 => Message::Addr(msg),
            AddressFormat::V2 => Message::AddrV2(msg),
        }
    }
}

impl From<Ping> for Message {
    fn from(msg: Ping) -> Self {
        Message::Ping(msg)
    }
}

impl From<Pong> for Message {
    fn from(msg: Pong) -> Self {
        Message::Pong(msg)
    }
}

impl From<SendAddrV2> for Message {
    fn from(msg: SendAddrV2) -> Self {
        Message::SendAddrV2(msg)
    }
}

impl From<UnknownMessage> for Message {
    fn from(msg: UnknownMessage) -> Self {
        Message::Unknown(msg)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Ping(m) => match m.nonce() {
                Some(nonce) => write!(f, "ping: {nonce}"),
                None => f.write_str("ping"),
            },
            Message::Pong(m) => write!(f, "pong: {}", m.nonce()),
            Message::SendAddrV2(_) => f.write_str("sendaddrv2"),
            Message::Addr(m) | Message::AddrV2(m) => write!(f, "{m}"),
            Message::Unknown(m) => write!(
                f,
                "Unknown message [{}]: {}",
                m.command(),
                hex::encode(m.payload())
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkParams;

    fn serializer() -> Serializer {
        Serializer::new(NetworkParams::mainnet(), false)
    }

    #[test]
    fn command_names_round_trip() {
        for cmd in [
            Command::Ping,
            Command::Pong,
            Command::SendAddrV2,
            Command::Addr,
            Command::AddrV2,
        ] {
            assert_eq!(Command::from_name(cmd.name()), cmd);
        }
        assert_eq!(Command::from_name("verack"), Command::Unknown);
    }

    #[test]
    fn ping_without_nonce_is_accepted() {
        let msg = Message::parse(&serializer(), "ping", Bytes::new()).unwrap();
        let Message::Ping(ping) = msg else {
            panic!("expected Message::Ping");
        };
        assert_eq!(ping.nonce(), None);
        assert_eq!(ping.message_size(), Some(0));
    }

    #[test]
    fn pong_requires_nonce() {
        let err = Message::parse(&serializer(), "pong", Bytes::from_static(&[1, 2])).unwrap_err();
        assert!(matches!(err, WireError::Truncated(_)));
    }

    #[test]
    fn unknown_command_keeps_name_and_payload() {
        let msg = Message::parse(&serializer(), "inv", Bytes::from_static(&[0xAB, 0xCD])).unwrap();
        assert_eq!(msg.command(), Command::Unknown);
        assert_eq!(msg.command_name(), "inv");
        assert_eq!(msg.to_string(), "Unknown message [inv]: abcd");
    }

    #[test]
    fn ping_with_surplus_bytes_serializes_only_its_range() {
        let retain = Serializer::new(NetworkParams::mainnet(), true);
        let mut payload = 42u64.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0xEE, 0xEE]);
        let mut msg = Message::parse(&retain, "ping", Bytes::from(payload)).unwrap();
        assert_eq!(msg.message_size(), Some(8));
        assert_eq!(msg.serialize().unwrap(), 42u64.to_le_bytes());
        assert_eq!(msg.to_string(), "ping: 42");
    }

    #[test]
    fn retained_bytes_are_shared_not_copied() {
        let retain = Serializer::new(NetworkParams::mainnet(), true);
        let payload = Bytes::from(7u64.to_le_bytes().to_vec());
        let mut msg = Message::parse(&retain, "pong", payload.clone()).unwrap();
        let out = msg.unsafe_serialize().unwrap();
        assert_eq!(out.as_ptr(), payload.as_ptr());
    }
}
