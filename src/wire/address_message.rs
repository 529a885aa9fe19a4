//! `addr` and `addrv2` payloads: a CompactSize count followed by that many
//! [`PeerAddress`] entries.

use std::fmt;

use bytes::Bytes;
use tracing::warn;

use crate::error::WireError;
use crate::wire::address::PeerAddress;
use crate::wire::codec::Serializer;
use crate::wire::constants::{ADDRESS_FORMAT_V1, ADDRESS_FORMAT_V2, MAX_ADDRESSES};
use crate::wire::decode::read_varint;
use crate::wire::encode::write_varint;
use crate::wire::state::{MessageState, OwnerHandle, WireMessage};

/// Which address list a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFormat {
    /// Legacy `addr`, 30-byte entries.
    V1,
    /// BIP155 `addrv2`, variable-size entries.
    V2,
}

impl AddressFormat {
    /// Protocol version every entry's serializer must carry.
    pub fn protocol_version(self) -> u32 {
        match self {
            AddressFormat::V1 => ADDRESS_FORMAT_V1,
            AddressFormat::V2 => ADDRESS_FORMAT_V2,
        }
    }

    pub fn command(self) -> &'static str {
        match self {
            AddressFormat::V1 => "addr",
            AddressFormat::V2 => "addrv2",
        }
    }
}

/// A list of up to 1000 advertised peers.
#[derive(Debug)]
pub struct AddressMessage {
    state: MessageState,
    handle: OwnerHandle,
    format: AddressFormat,
    addresses: Vec<PeerAddress>,
}

impl AddressMessage {
    /// An empty list; it encodes as a single zero count byte.
    pub fn new(serializer: Serializer, format: AddressFormat) -> Self {
        Self {
            state: MessageState::empty(serializer, Some(1)),
            handle: OwnerHandle::next(),
            format,
            addresses: Vec::new(),
        }
    }

    pub(crate) fn parse(
        serializer: &Serializer,
        payload: Bytes,
        format: AddressFormat,
    ) -> Result<Self, WireError> {
        let mut c = 0;
        let count = read_varint(&payload, &mut c)?;
        if count > MAX_ADDRESSES {
            return Err(WireError::TooManyAddresses(count));
        }

        let handle = OwnerHandle::next();
        let entry_serializer = serializer.with_protocol_version(format.protocol_version());
        let mut addresses = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (addr, used) = PeerAddress::parse(entry_serializer.clone(), &payload, c, Some(handle))?;
            c += used;
            addresses.push(addr);
        }

        Ok(Self {
            state: MessageState::parsed(serializer.clone(), &payload, 0, c),
            handle,
            format,
            addresses,
        })
    }

    pub fn format(&self) -> AddressFormat {
        self.format
    }

    pub fn addresses(&self) -> &[PeerAddress] {
        &self.addresses
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Appends `addr`, taking ownership of it.
    ///
    /// The address must already use this list's layout.
    pub fn add_address(&mut self, mut addr: PeerAddress) -> Result<(), WireError> {
        let expected = self.format.protocol_version();
        let actual = addr.state().serializer().protocol_version();
        if actual != expected {
            return Err(WireError::ProtocolVersionMismatch { expected, actual });
        }
        if self.addresses.len() as u64 >= MAX_ADDRESSES {
            return Err(WireError::TooManyAddresses(self.addresses.len() as u64 + 1));
        }

        self.state.uncache();
        let delta = addr.message_size().map(|n| n as isize);
        addr.link_mut().attach(self.handle);
        self.addresses.push(addr);
        self.state.adjust_length(self.addresses.len(), delta);
        Ok(())
    }

    /// Removes and returns the entry at `index`, detached from this list.
    pub fn remove_address(&mut self, index: usize) -> Option<PeerAddress> {
        if index >= self.addresses.len() {
            return None;
        }
        self.state.uncache();
        let mut addr = self.addresses.remove(index);
        addr.link_mut().detach();
        self.state.set_length(None);
        Some(addr)
    }

    /// Runs `f` on the entry at `index`.
    ///
    /// When `f` changes the entry, this list drops its cached bytes too and
    /// its length follows the entry's new size. An entry switched to another
    /// layout by `f` is put back on this list's layout.
    pub fn modify_address<R>(
        &mut self,
        index: usize,
        f: impl FnOnce(&mut PeerAddress) -> R,
    ) -> Option<R> {
        let expected = self.format.protocol_version();
        let addr = self.addresses.get_mut(index)?;
        let before = addr.message_size();
        let out = f(addr);
        let actual = addr.state().serializer().protocol_version();
        if actual != expected {
            warn!(expected, actual, "entry layout must match its list; restoring");
            let restored = addr.state().serializer().with_protocol_version(expected);
            addr.set_serializer(restored);
        }
        if addr.link_mut().take_change(self.handle) {
            let delta = match (before, addr.message_size()) {
                (Some(before), Some(after)) => Some(after as isize - before as isize),
                _ => None,
            };
            self.state.uncache();
            self.state.adjust_length(0, delta);
        }
        Some(out)
    }
}

impl WireMessage for AddressMessage {
    fn state(&self) -> &MessageState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MessageState {
        &mut self.state
    }

    fn serialize_fields(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        write_varint(self.addresses.len() as u64, out);
        for addr in &self.addresses {
            addr.write_to(out)?;
        }
        Ok(())
    }
}

/// The copy gets its own identity and owns copies of every entry.
impl Clone for AddressMessage {
    fn clone(&self) -> Self {
        let handle = OwnerHandle::next();
        let addresses = self
            .addresses
            .iter()
            .map(|addr| {
                let mut addr = addr.clone();
                addr.link_mut().attach(handle);
                addr
            })
            .collect();
        Self {
            state: self.state.clone(),
            handle,
            format: self.format,
            addresses,
        }
    }
}

impl PartialEq for AddressMessage {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format && self.addresses == other.addresses
    }
}

impl fmt::Display for AddressMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.format.command())?;
        for addr in &self.addresses {
            write!(f, " {addr}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkParams;
    use crate::wire::address::PeerHost;
    use crate::wire::message::Message;
    use crate::wire::services::Services;
    use std::net::{IpAddr, Ipv4Addr};

    fn serializer(retain: bool) -> Serializer {
        Serializer::new(NetworkParams::mainnet(), retain)
    }

    fn v1_entry(time: u32, ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut b = vec![];
        b.extend_from_slice(&time.to_le_bytes());
        b.extend_from_slice(&1u64.to_le_bytes());
        b.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
        b.extend_from_slice(&ip);
        b.extend_from_slice(&port.to_be_bytes());
        b
    }

    fn addr_payload(entries: &[Vec<u8>]) -> Vec<u8> {
        let mut p = vec![];
        write_varint(entries.len() as u64, &mut p);
        for e in entries {
            p.extend_from_slice(e);
        }
        p
    }

    fn two_entry_payload() -> Vec<u8> {
        addr_payload(&[
            v1_entry(1700000100, [1, 2, 3, 4], 8333),
            v1_entry(1700000200, [5, 6, 7, 8], 8334),
        ])
    }

    fn v1_address(ip: [u8; 4], port: u16) -> PeerAddress {
        PeerAddress::from_ip(
            serializer(false).with_protocol_version(ADDRESS_FORMAT_V1),
            IpAddr::V4(Ipv4Addr::from(ip)),
            port,
            Services::NODE_NETWORK,
        )
    }

    #[test]
    fn parse_gives_entries_an_owner() {
        let msg =
            AddressMessage::parse(&serializer(false), Bytes::from(two_entry_payload()), AddressFormat::V1)
                .unwrap();
        assert_eq!(msg.len(), 2);
        assert_eq!(msg.message_size(), Some(61));
        assert!(msg.addresses().iter().all(|a| a.owner() == Some(msg.handle)));
        assert_eq!(msg.addresses()[1].port(), 8334);
    }

    #[test]
    fn more_than_a_thousand_entries_is_rejected() {
        let mut payload = vec![];
        write_varint(1001, &mut payload);
        let err = AddressMessage::parse(&serializer(false), Bytes::from(payload), AddressFormat::V1)
            .unwrap_err();
        assert!(matches!(err, WireError::TooManyAddresses(1001)));
    }

    #[test]
    fn modifying_an_entry_invalidates_the_list_cache() {
        let payload = two_entry_payload();
        let mut msg =
            AddressMessage::parse(&serializer(true), Bytes::from(payload.clone()), AddressFormat::V1)
                .unwrap();
        assert!(msg.state().is_cached());
        assert!(msg.addresses()[0].state().is_cached());

        msg.modify_address(0, |a| a.set_port(18333)).unwrap();
        assert!(!msg.state().is_cached());
        assert!(!msg.addresses()[0].state().is_cached());
        // The untouched sibling keeps its bytes.
        assert!(msg.addresses()[1].state().is_cached());
        assert_eq!(msg.message_size(), Some(61));

        let bytes = msg.serialize().unwrap();
        let mut expected = payload;
        expected[1 + 28..1 + 30].copy_from_slice(&18333u16.to_be_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn reading_an_entry_keeps_the_cache() {
        let mut msg =
            AddressMessage::parse(&serializer(true), Bytes::from(two_entry_payload()), AddressFormat::V1)
                .unwrap();
        let port = msg.modify_address(1, |a| a.port()).unwrap();
        assert_eq!(port, 8334);
        assert!(msg.state().is_cached());
    }

    #[test]
    fn add_address_tracks_length() {
        let mut msg = AddressMessage::new(serializer(false), AddressFormat::V1);
        assert_eq!(msg.message_size(), Some(1));

        msg.add_address(v1_address([9, 9, 9, 9], 8333)).unwrap();
        assert_eq!(msg.message_size(), Some(31));
        assert_eq!(msg.addresses()[0].owner(), Some(msg.handle));

        let bytes = msg.serialize().unwrap();
        assert_eq!(bytes.len(), 31);
        assert_eq!(bytes[0], 1);
    }

    #[test]
    fn add_address_checks_layout() {
        let mut msg = AddressMessage::new(serializer(false), AddressFormat::V2);
        let err = msg.add_address(v1_address([1, 1, 1, 1], 1)).unwrap_err();
        assert!(matches!(
            err,
            WireError::ProtocolVersionMismatch { expected: 2, actual: 1 }
        ));
        assert!(msg.is_empty());
    }

    #[test]
    fn modify_cannot_switch_an_entry_layout() {
        let s = serializer(false);
        let mut msg = AddressMessage::new(s.clone(), AddressFormat::V1);
        msg.add_address(v1_address([1, 2, 3, 4], 8333)).unwrap();

        msg.modify_address(0, |a| a.set_serializer(s.with_protocol_version(ADDRESS_FORMAT_V2)))
            .unwrap();
        assert_eq!(msg.addresses()[0].state().serializer().protocol_version(), ADDRESS_FORMAT_V1);
        assert_eq!(msg.message_size(), Some(31));

        let mut framed = Message::from(msg.clone());
        let bytes = s.frame(&mut framed).unwrap();
        let (decoded, used) = s.deserialize(&bytes).unwrap().unwrap();
        assert_eq!(used, bytes.len());
        let Message::Addr(decoded) = decoded else {
            panic!("expected Message::Addr");
        };
        assert_eq!(decoded, msg);
    }

    #[test]
    fn removed_entry_is_detached() {
        let mut msg =
            AddressMessage::parse(&serializer(true), Bytes::from(two_entry_payload()), AddressFormat::V1)
                .unwrap();
        let mut removed = msg.remove_address(0).unwrap();
        assert_eq!(removed.owner(), None);
        assert!(!msg.state().is_cached());
        assert_eq!(msg.message_size(), None);
        assert!(msg.remove_address(5).is_none());

        // Changing the detached entry no longer concerns the list.
        removed.set_host(PeerHost::Ip("10.1.1.1".parse().unwrap()));
        let bytes = msg.serialize().unwrap();
        assert_eq!(bytes.len(), 31);
        assert_eq!(msg.message_size(), Some(31));
    }

    #[test]
    fn cloned_list_tracks_its_own_entries() {
        let original =
            AddressMessage::parse(&serializer(true), Bytes::from(two_entry_payload()), AddressFormat::V1)
                .unwrap();
        let mut copy = original.clone();
        assert_ne!(copy.handle, original.handle);

        copy.modify_address(1, |a| a.set_time(Some(7))).unwrap();
        assert!(!copy.state().is_cached());
        assert!(original.state().is_cached());
        assert_ne!(copy, original);
    }

    #[test]
    fn display_lists_entries() {
        let mut msg = AddressMessage::new(serializer(false), AddressFormat::V1);
        msg.add_address(v1_address([1, 2, 3, 4], 8333)).unwrap();
        assert_eq!(msg.to_string(), "addr: 1.2.3.4:8333");
    }
}
