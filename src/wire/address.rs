//! Peer addresses as they appear in `version`, `addr` and `addrv2` payloads.
//!
//! The encoding is picked by the protocol version of the address's
//! serializer:
//!
//! ```text
//! 0  (version)  services u64 | addr [16] | port u16 BE                   26 B
//! 1  (addr)     time u32 | services u64 | addr [16] | port u16 BE        30 B
//! 2  (addrv2)   time u32 | services varint | network u8 | len varint
//!               | addr [len] | port u16 BE
//! ```
//!
//! In the 16-byte layouts IPv4 travels as `::ffff:a.b.c.d` and Tor v2 as
//! the OnionCat prefix `fd87:d87e:eb43::/48` followed by the 10-byte key.
//!
//! See BIP 155: <https://github.com/bitcoin/bips/blob/master/bip-0155.mediawiki>

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use bytes::Bytes;
use data_encoding::BASE32_NOPAD;
use sha3::{Digest, Sha3_256};

use crate::error::WireError;
use crate::wire::codec::Serializer;
use crate::wire::constants::{
    ADDRESS_FORMAT_V1, ADDRESS_FORMAT_V2, ADDRESS_FORMAT_VERSION, MAX_ADDRV2_ADDRESS_SIZE,
};
use crate::wire::decode::{read_array, read_slice, read_u16_be, read_u32, read_u64, read_u8, read_varint};
use crate::wire::encode::{varint_size, write_varint};
use crate::wire::services::Services;
use crate::wire::state::{ChildLink, MessageState, OwnerHandle, WireMessage};

const ONIONCAT_PREFIX: [u8; 6] = [0xFD, 0x87, 0xD8, 0x7E, 0xEB, 0x43];

// BIP155 network ids.
const NET_IPV4: u8 = 0x01;
const NET_IPV6: u8 = 0x02;
const NET_TORV2: u8 = 0x03;
const NET_TORV3: u8 = 0x04;

const TORV3_VERSION: u8 = 0x03;

/// Where a peer can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerHost {
    Ip(IpAddr),
    /// A Tor hidden service, kept as its `.onion` hostname.
    Onion(String),
}

impl fmt::Display for PeerHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerHost::Ip(ip) => write!(f, "{ip}"),
            PeerHost::Onion(host) => f.write_str(host),
        }
    }
}

/// Decoded Tor service key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnionKey {
    V2([u8; 10]),
    V3([u8; 32]),
}

impl OnionKey {
    fn from_hostname(hostname: &str) -> Result<Self, WireError> {
        let label = hostname
            .strip_suffix(".onion")
            .ok_or(WireError::Unencodable("hostname is not an .onion address"))?;
        let raw = BASE32_NOPAD
            .decode(label.to_ascii_uppercase().as_bytes())
            .map_err(|_| WireError::Unencodable("onion label is not base32"))?;

        match raw.len() {
            10 => {
                let mut key = [0u8; 10];
                key.copy_from_slice(&raw);
                Ok(OnionKey::V2(key))
            }
            35 => {
                let mut pubkey = [0u8; 32];
                pubkey.copy_from_slice(&raw[..32]);
                if raw[34] != TORV3_VERSION || raw[32..34] != torv3_checksum(&pubkey) {
                    return Err(WireError::Unencodable("onion v3 checksum or version mismatch"));
                }
                Ok(OnionKey::V3(pubkey))
            }
            _ => Err(WireError::Unencodable("onion label has unexpected length")),
        }
    }

    fn hostname(&self) -> String {
        let label = match self {
            OnionKey::V2(key) => BASE32_NOPAD.encode(key),
            OnionKey::V3(pubkey) => {
                let mut raw = Vec::with_capacity(35);
                raw.extend_from_slice(pubkey);
                raw.extend_from_slice(&torv3_checksum(pubkey));
                raw.push(TORV3_VERSION);
                BASE32_NOPAD.encode(&raw)
            }
        };
        format!("{}.onion", label.to_ascii_lowercase())
    }

    fn bip155(&self) -> (u8, &[u8]) {
        match self {
            OnionKey::V2(key) => (NET_TORV2, key),
            OnionKey::V3(pubkey) => (NET_TORV3, pubkey),
        }
    }
}

/// `SHA3-256(".onion checksum" || pubkey || version)[..2]`, per the Tor v3
/// rendezvous spec.
fn torv3_checksum(pubkey: &[u8; 32]) -> [u8; 2] {
    let mut hasher = Sha3_256::new();
    hasher.update(b".onion checksum");
    hasher.update(pubkey);
    hasher.update([TORV3_VERSION]);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

fn host_from_legacy(raw: [u8; 16]) -> PeerHost {
    if raw[..6] == ONIONCAT_PREFIX {
        let mut key = [0u8; 10];
        key.copy_from_slice(&raw[6..]);
        return PeerHost::Onion(OnionKey::V2(key).hostname());
    }
    let v6 = Ipv6Addr::from(raw);
    match v6.to_ipv4_mapped() {
        Some(v4) => PeerHost::Ip(IpAddr::V4(v4)),
        None => PeerHost::Ip(IpAddr::V6(v6)),
    }
}

fn fixed<const N: usize>(network_id: u8, bytes: &[u8]) -> Result<[u8; N], WireError> {
    bytes.try_into().map_err(|_| WireError::AddressLength {
        network_id,
        expected: N,
        actual: bytes.len(),
    })
}

/// Maps a BIP155 entry to a host. Unknown networks yield `None`.
fn host_from_bip155(network_id: u8, bytes: &[u8]) -> Result<Option<PeerHost>, WireError> {
    let host = match network_id {
        NET_IPV4 => PeerHost::Ip(IpAddr::V4(Ipv4Addr::from(fixed::<4>(network_id, bytes)?))),
        NET_IPV6 => PeerHost::Ip(IpAddr::V6(Ipv6Addr::from(fixed::<16>(network_id, bytes)?))),
        NET_TORV2 => PeerHost::Onion(OnionKey::V2(fixed(network_id, bytes)?).hostname()),
        NET_TORV3 => PeerHost::Onion(OnionKey::V3(fixed(network_id, bytes)?).hostname()),
        _ => return Ok(None),
    };
    Ok(Some(host))
}

/// One advertised peer: host, port, service bits and last-seen time.
///
/// Inside an [`AddressMessage`](crate::wire::AddressMessage) the address is
/// owned by the list; mutate it through
/// [`AddressMessage::modify_address`](crate::wire::AddressMessage::modify_address)
/// so that the list's cached bytes are dropped as well.
#[derive(Debug)]
pub struct PeerAddress {
    state: MessageState,
    link: ChildLink,
    host: Option<PeerHost>,
    port: u16,
    services: Services,
    time: Option<u32>,
}

impl PeerAddress {
    /// Builds an address for the layout named by `serializer`.
    ///
    /// The time is set to now, except in the `version` layout which carries
    /// no time.
    pub fn new(serializer: Serializer, host: PeerHost, port: u16, services: Services) -> Self {
        let time = (serializer.protocol_version() != ADDRESS_FORMAT_VERSION).then(unix_now);
        let mut addr = Self {
            state: MessageState::empty(serializer, None),
            link: ChildLink::default(),
            host: Some(host),
            port,
            services,
            time,
        };
        addr.refresh_length();
        addr
    }

    pub fn from_ip(serializer: Serializer, ip: IpAddr, port: u16, services: Services) -> Self {
        Self::new(serializer, PeerHost::Ip(ip), port, services)
    }

    pub fn from_socket_addr(serializer: Serializer, addr: SocketAddr) -> Self {
        Self::from_ip(serializer, addr.ip(), addr.port(), Services::NONE)
    }

    /// Builds an address for a Tor v2 or v3 `.onion` hostname, checking the
    /// hostname up front. The case of the label is normalised.
    pub fn onion(serializer: Serializer, hostname: &str, port: u16, services: Services) -> Result<Self, WireError> {
        let key = OnionKey::from_hostname(hostname)?;
        Ok(Self::new(serializer, PeerHost::Onion(key.hostname()), port, services))
    }

    /// Parses one address starting at `payload[offset]`.
    ///
    /// Returns the address and the number of bytes it occupied.
    pub(crate) fn parse(
        serializer: Serializer,
        payload: &Bytes,
        offset: usize,
        owner: Option<OwnerHandle>,
    ) -> Result<(Self, usize), WireError> {
        let p = &payload[..];
        let mut c = offset;
        let version = serializer.protocol_version();

        let (time, services, host) = match version {
            ADDRESS_FORMAT_VERSION | ADDRESS_FORMAT_V1 => {
                let time = if version == ADDRESS_FORMAT_V1 {
                    Some(read_u32(p, &mut c)?)
                } else {
                    None
                };
                let services = read_u64(p, &mut c)?;
                let raw = read_array::<16>(p, &mut c, "peer address: ip")?;
                (time, services, Some(host_from_legacy(raw)))
            }
            ADDRESS_FORMAT_V2 => {
                let time = read_u32(p, &mut c)?;
                let services = read_varint(p, &mut c)?;
                let network_id = read_u8(p, &mut c, "peer address: network id")?;
                let len = read_varint(p, &mut c)?;
                if len > MAX_ADDRV2_ADDRESS_SIZE {
                    return Err(WireError::AddressTooLong(len));
                }
                let bytes = read_slice(p, &mut c, len as usize, "peer address: addr")?;
                (Some(time), services, host_from_bip155(network_id, bytes)?)
            }
            other => return Err(WireError::UnsupportedLayout(other)),
        };
        let port = read_u16_be(p, &mut c, "peer address: port")?;

        let length = c - offset;
        let addr = Self {
            state: MessageState::parsed(serializer, payload, offset, length),
            link: owner.map(ChildLink::owned_by).unwrap_or_default(),
            host,
            port,
            services: Services::new(services),
            time,
        };
        Ok((addr, length))
    }

    /// `None` when the address came from an unknown BIP155 network.
    pub fn host(&self) -> Option<&PeerHost> {
        self.host.as_ref()
    }

    pub fn ip(&self) -> Option<IpAddr> {
        match self.host {
            Some(PeerHost::Ip(ip)) => Some(ip),
            _ => None,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        match &self.host {
            Some(PeerHost::Onion(host)) => Some(host),
            _ => None,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn services(&self) -> Services {
        self.services
    }

    /// Last-seen time in seconds since the epoch.
    pub fn time(&self) -> Option<u32> {
        self.time
    }

    pub fn owner(&self) -> Option<OwnerHandle> {
        self.link.owner()
    }

    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        self.ip().map(|ip| SocketAddr::new(ip, self.port))
    }

    pub fn set_host(&mut self, host: PeerHost) {
        self.uncache();
        self.host = Some(host);
        self.refresh_length();
    }

    pub fn set_port(&mut self, port: u16) {
        self.uncache();
        self.port = port;
    }

    pub fn set_services(&mut self, services: Services) {
        self.uncache();
        self.services = services;
        self.refresh_length();
    }

    pub fn set_time(&mut self, time: Option<u32>) {
        self.uncache();
        self.time = time;
    }

    /// Switches the address to another layout.
    pub fn set_serializer(&mut self, serializer: Serializer) {
        if *self.state.serializer() == serializer {
            return;
        }
        self.uncache();
        self.state.set_serializer(serializer);
        self.refresh_length();
    }

    pub(crate) fn link_mut(&mut self) -> &mut ChildLink {
        &mut self.link
    }

    fn uncache(&mut self) {
        self.state.uncache();
        self.link.mark_changed();
    }

    fn refresh_length(&mut self) {
        let length = self.encoded_len();
        self.state.set_length(length);
    }

    fn encoded_len(&self) -> Option<usize> {
        match self.state.serializer().protocol_version() {
            ADDRESS_FORMAT_VERSION => Some(26),
            ADDRESS_FORMAT_V1 => Some(30),
            ADDRESS_FORMAT_V2 => {
                let addr_len = match self.host.as_ref()? {
                    PeerHost::Ip(IpAddr::V4(_)) => 4,
                    PeerHost::Ip(IpAddr::V6(_)) => 16,
                    PeerHost::Onion(host) => OnionKey::from_hostname(host).ok()?.bip155().1.len(),
                };
                Some(
                    4 + varint_size(self.services.bits())
                        + 1
                        + varint_size(addr_len as u64)
                        + addr_len
                        + 2,
                )
            }
            _ => None,
        }
    }

    fn legacy_bytes(&self) -> Result<[u8; 16], WireError> {
        match &self.host {
            Some(PeerHost::Ip(IpAddr::V4(v4))) => Ok(v4.to_ipv6_mapped().octets()),
            Some(PeerHost::Ip(IpAddr::V6(v6))) => Ok(v6.octets()),
            Some(PeerHost::Onion(host)) => match OnionKey::from_hostname(host)? {
                OnionKey::V2(key) => {
                    let mut raw = [0u8; 16];
                    raw[..6].copy_from_slice(&ONIONCAT_PREFIX);
                    raw[6..].copy_from_slice(&key);
                    Ok(raw)
                }
                OnionKey::V3(_) => Err(WireError::Unencodable(
                    "Tor v3 addresses need the addrv2 layout",
                )),
            },
            None => Err(WireError::Unencodable("address of unknown network")),
        }
    }

    fn bip155_bytes(&self) -> Result<(u8, Vec<u8>), WireError> {
        match &self.host {
            Some(PeerHost::Ip(IpAddr::V4(v4))) => Ok((NET_IPV4, v4.octets().to_vec())),
            Some(PeerHost::Ip(IpAddr::V6(v6))) => Ok((NET_IPV6, v6.octets().to_vec())),
            Some(PeerHost::Onion(host)) => {
                let key = OnionKey::from_hostname(host)?;
                let (id, bytes) = key.bip155();
                Ok((id, bytes.to_vec()))
            }
            None => Err(WireError::Unencodable("address of unknown network")),
        }
    }
}

impl WireMessage for PeerAddress {
    fn state(&self) -> &MessageState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MessageState {
        &mut self.state
    }

    fn serialize_fields(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        match self.state.serializer().protocol_version() {
            ADDRESS_FORMAT_VERSION => {
                let raw = self.legacy_bytes()?;
                out.write_u64::<LittleEndian>(self.services.bits())?;
                out.extend_from_slice(&raw);
            }
            ADDRESS_FORMAT_V1 => {
                let raw = self.legacy_bytes()?;
                out.write_u32::<LittleEndian>(self.time.unwrap_or(0))?;
                out.write_u64::<LittleEndian>(self.services.bits())?;
                out.extend_from_slice(&raw);
            }
            ADDRESS_FORMAT_V2 => {
                let (network_id, raw) = self.bip155_bytes()?;
                out.write_u32::<LittleEndian>(self.time.unwrap_or(0))?;
                write_varint(self.services.bits(), out);
                out.push(network_id);
                write_varint(raw.len() as u64, out);
                out.extend_from_slice(&raw);
            }
            other => return Err(WireError::UnsupportedLayout(other)),
        }
        out.write_u16::<BigEndian>(self.port)?;
        Ok(())
    }
}

/// A copy is a free-standing address: it belongs to no list.
impl Clone for PeerAddress {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            link: ChildLink::default(),
            host: self.host.clone(),
            port: self.port,
            services: self.services,
            time: self.time,
        }
    }
}

impl PartialEq for PeerAddress {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host
            && self.port == other.port
            && self.services == other.services
            && self.time == other.time
    }
}

impl Eq for PeerAddress {}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(PeerHost::Ip(ip)) => write!(f, "{}", SocketAddr::new(*ip, self.port)),
            Some(PeerHost::Onion(host)) => write!(f, "{host}:{}", self.port),
            None => write!(f, "<unknown>:{}", self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkParams;

    fn serializer(version: u32, retain: bool) -> Serializer {
        Serializer::new(NetworkParams::mainnet(), retain).with_protocol_version(version)
    }

    /// One `addr` (v1) entry for an IPv4 peer.
    fn v1_entry(time: u32, services: u64, ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut b = vec![];
        b.extend_from_slice(&time.to_le_bytes());
        b.extend_from_slice(&services.to_le_bytes());
        b.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
        b.extend_from_slice(&ip);
        b.extend_from_slice(&port.to_be_bytes());
        b
    }

    fn v2_entry(network_id: u8, addr: &[u8], port: u16) -> Vec<u8> {
        let mut b = vec![];
        b.extend_from_slice(&1700001000u32.to_le_bytes());
        b.push(0x09); // services
        b.push(network_id);
        write_varint(addr.len() as u64, &mut b);
        b.extend_from_slice(addr);
        b.extend_from_slice(&port.to_be_bytes());
        b
    }

    fn parse(version: u32, bytes: Vec<u8>) -> Result<(PeerAddress, usize), WireError> {
        PeerAddress::parse(serializer(version, false), &Bytes::from(bytes), 0, None)
    }

    #[test]
    fn parses_mapped_ipv4_in_addr_layout() {
        let (addr, used) = parse(1, v1_entry(1700000100, 1, [1, 2, 3, 4], 8333)).unwrap();
        assert_eq!(used, 30);
        assert_eq!(addr.ip(), Some(IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4))));
        assert_eq!(addr.port(), 8333);
        assert_eq!(addr.time(), Some(1700000100));
        assert_eq!(addr.services(), Services::NODE_NETWORK);
        assert_eq!(addr.to_string(), "1.2.3.4:8333");
    }

    #[test]
    fn version_layout_has_no_time() {
        let addr = PeerAddress::from_socket_addr(
            serializer(0, false),
            "10.0.0.1:8333".parse().unwrap(),
        );
        assert_eq!(addr.time(), None);
        assert_eq!(addr.message_size(), Some(26));

        let mut addr = addr;
        let bytes = addr.serialize().unwrap();
        assert_eq!(bytes.len(), 26);
        let (back, _) = parse(0, bytes).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn onioncat_round_trips_as_tor_v2() {
        let mut raw = v1_entry(5, 0, [0; 4], 9050);
        raw[12..28].copy_from_slice(&[
            0xFD, 0x87, 0xD8, 0x7E, 0xEB, 0x43, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10,
        ]);
        let (mut addr, _) = parse(1, raw.clone()).unwrap();
        let host = addr.hostname().unwrap().to_string();
        assert!(host.ends_with(".onion"));
        assert_eq!(host.len(), 16 + ".onion".len());
        assert_eq!(addr.serialize().unwrap(), raw);
    }

    #[test]
    fn tor_v3_hostname_carries_checksum_and_version() {
        let pubkey = [7u8; 32];
        let host = OnionKey::V3(pubkey).hostname();
        assert_eq!(host.len(), 56 + ".onion".len());
        // The trailing version byte 0x03 always encodes as 'd'.
        assert!(host.ends_with("d.onion"));
        assert_eq!(OnionKey::from_hostname(&host).unwrap(), OnionKey::V3(pubkey));

        let mut tampered = host.into_bytes();
        tampered[0] = if tampered[0] == b'a' { b'b' } else { b'a' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(OnionKey::from_hostname(&tampered).is_err());
    }

    #[test]
    fn known_tor_v3_service_decodes() {
        const HOST: &str = "duckduckgogg42xjoc72x3sjasowoarfbgcmvfimaftt6twagswzczad.onion";
        let pubkey: [u8; 32] =
            hex::decode("1d04a1d04a338c6e6ae970bfabee49049d6702250984ca950c01673f4ec034ad")
                .unwrap()
                .try_into()
                .unwrap();
        assert_eq!(torv3_checksum(&pubkey), [0x91, 0x64]);

        let raw = v2_entry(NET_TORV3, &pubkey, 443);
        let (mut addr, _) = parse(2, raw.clone()).unwrap();
        assert_eq!(addr.hostname(), Some(HOST));
        assert_eq!(addr.serialize().unwrap(), raw);

        let built = PeerAddress::onion(serializer(2, false), HOST, 443, Services::NONE).unwrap();
        assert_eq!(built.hostname(), Some(HOST));
    }

    #[test]
    fn addrv2_tor_v3_round_trip() {
        let raw = v2_entry(NET_TORV3, &[0x42; 32], 8333);
        let (mut addr, used) = parse(2, raw.clone()).unwrap();
        assert_eq!(used, raw.len());
        assert_eq!(addr.message_size(), Some(raw.len()));
        assert!(addr.hostname().unwrap().ends_with("d.onion"));
        assert_eq!(addr.serialize().unwrap(), raw);
    }

    #[test]
    fn onion_constructor_checks_hostname() {
        let host = OnionKey::V3([9; 32]).hostname();
        let shouting = host.replace(".onion", "").to_ascii_uppercase() + ".onion";
        let addr = PeerAddress::onion(serializer(2, false), &shouting, 9050, Services::NONE).unwrap();
        assert_eq!(addr.hostname(), Some(host.as_str()));

        assert!(PeerAddress::onion(serializer(2, false), "example.com", 1, Services::NONE).is_err());
        assert!(PeerAddress::onion(serializer(2, false), "abc.onion", 1, Services::NONE).is_err());
    }

    #[test]
    fn tor_v3_cannot_use_legacy_layout() {
        let host = PeerHost::Onion(OnionKey::V3([1; 32]).hostname());
        let mut addr = PeerAddress::new(serializer(1, false), host, 8333, Services::NONE);
        assert!(matches!(addr.serialize(), Err(WireError::Unencodable(_))));
    }

    #[test]
    fn unknown_network_is_skipped_without_address() {
        let raw = v2_entry(0x05, &[0xAA; 32], 0);
        let (addr, used) = parse(2, raw.clone()).unwrap();
        assert_eq!(used, raw.len());
        assert_eq!(addr.host(), None);
    }

    #[test]
    fn known_network_with_wrong_length_is_rejected() {
        let err = parse(2, v2_entry(NET_IPV4, &[1, 2, 3], 0)).unwrap_err();
        assert!(matches!(
            err,
            WireError::AddressLength { network_id: NET_IPV4, expected: 4, actual: 3 }
        ));
    }

    #[test]
    fn oversized_address_field_is_rejected() {
        let mut raw = vec![];
        raw.extend_from_slice(&0u32.to_le_bytes());
        raw.push(0);
        raw.push(0x05);
        write_varint(513, &mut raw);
        assert!(matches!(parse(2, raw), Err(WireError::AddressTooLong(513))));
    }

    #[test]
    fn setters_drop_cache_and_recompute_length() {
        let raw = v2_entry(NET_IPV4, &[127, 0, 0, 1], 8333);
        let (mut addr, _) =
            PeerAddress::parse(serializer(2, true), &Bytes::from(raw), 0, None).unwrap();
        assert!(addr.state().is_cached());

        addr.set_host(PeerHost::Ip("::1".parse().unwrap()));
        assert!(!addr.state().is_cached());
        assert_eq!(addr.message_size(), Some(4 + 1 + 1 + 1 + 16 + 2));

        let bytes = addr.serialize().unwrap();
        assert_eq!(bytes.len(), 25);
        assert_eq!(bytes[5], NET_IPV6);
    }

    #[test]
    fn clone_belongs_to_no_list() {
        let owner = OwnerHandle::next();
        let raw = Bytes::from(v1_entry(1, 1, [1, 1, 1, 1], 1));
        let (addr, _) = PeerAddress::parse(serializer(1, false), &raw, 0, Some(owner)).unwrap();
        assert_eq!(addr.owner(), Some(owner));
        assert_eq!(addr.clone().owner(), None);
        assert_eq!(addr.clone(), addr);
    }
}
