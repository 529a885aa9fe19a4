use std::net::{Ipv4Addr, SocketAddr};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{LittleEndian, WriteBytesExt};
use rand::Rng;

use crate::error::WireError;
use crate::wire::address::PeerAddress;
use crate::wire::codec::Serializer;
use crate::wire::constants::ADDRESS_FORMAT_VERSION;
use crate::wire::encode::write_varint;
use crate::wire::services::Services;
use crate::wire::state::WireMessage;

/// User agent sent in our `version` payloads.
pub const USER_AGENT: &str = concat!("/btc-wire:", env!("CARGO_PKG_VERSION"), "/");

/// Builds a `version` payload for opening a handshake with `receiver`.
///
/// ```text
/// int32    version
/// uint64   services
/// int64    timestamp
/// net_addr addr_recv     (26 B, no time)
/// net_addr addr_from     (26 B, no time)
/// uint64   nonce
/// var_str  user_agent
/// int32    start_height
/// bool     relay
/// ```
///
/// The `version` message itself is not interpreted by this crate; send the
/// result as an [`UnknownMessage`](crate::wire::UnknownMessage) named
/// `"version"`.
///
/// # Example
///
/// ```
/// use btc_wire::network::NetworkParams;
/// use btc_wire::wire::{build_version_payload, Serializer, Services};
///
/// let serializer = Serializer::new(NetworkParams::mainnet(), false);
/// let payload = build_version_payload(
///     &serializer,
///     Services::NONE,
///     "127.0.0.1:8333".parse().unwrap(),
///     0,
/// )
/// .unwrap();
/// assert_eq!(&payload[..4], &70016i32.to_le_bytes());
/// ```
pub fn build_version_payload(
    serializer: &Serializer,
    services: Services,
    receiver: SocketAddr,
    start_height: i32,
) -> Result<Vec<u8>, WireError> {
    let mut payload = vec![];

    payload.write_i32::<LittleEndian>(serializer.protocol_version() as i32)?;
    payload.write_u64::<LittleEndian>(services.bits())?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    payload.write_i64::<LittleEndian>(now as i64)?;

    let embedded = serializer.with_protocol_version(ADDRESS_FORMAT_VERSION);
    PeerAddress::from_socket_addr(embedded.clone(), receiver).write_to(&mut payload)?;
    PeerAddress::from_ip(embedded, Ipv4Addr::UNSPECIFIED.into(), 0, services).write_to(&mut payload)?;

    let nonce: u64 = rand::thread_rng().r#gen();
    payload.write_u64::<LittleEndian>(nonce)?;

    write_varint(USER_AGENT.len() as u64, &mut payload);
    payload.extend_from_slice(USER_AGENT.as_bytes());

    payload.write_i32::<LittleEndian>(start_height)?;
    payload.push(0); // relay = false

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkParams;

    #[test]
    fn version_payload_embeds_receiver_without_time() {
        let s = Serializer::new(NetworkParams::regtest(), false);
        let payload = build_version_payload(
            &s,
            Services::NODE_NETWORK,
            "192.168.1.1:18444".parse().unwrap(),
            820_000,
        )
        .unwrap();

        // version(4) services(8) timestamp(8), then addr_recv
        let recv = &payload[20..46];
        assert_eq!(&recv[..8], &0u64.to_le_bytes());
        assert_eq!(&recv[8..24], &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 192, 168, 1, 1]);
        assert_eq!(&recv[24..], &18444u16.to_be_bytes());

        let from = &payload[46..72];
        assert_eq!(&from[..8], &1u64.to_le_bytes());

        let ua_len = payload[80] as usize;
        assert_eq!(&payload[81..81 + ua_len], USER_AGENT.as_bytes());
        assert_eq!(payload.len(), 81 + ua_len + 4 + 1);
    }
}
