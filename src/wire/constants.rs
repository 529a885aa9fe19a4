/// Network magic values used in the Bitcoin P2P message header.
///
/// The first 4 bytes of every Bitcoin P2P message identify the
/// network (mainnet, testnet, regtest, signet) and act as a
/// message boundary marker in the TCP stream.
///
/// The values below are written to the wire big-endian, so the
/// mainnet magic `0xF9BEB4D9` appears as the bytes `F9 BE B4 D9`.
///
/// You can also see how Bitcoin Core maps magic values to networks
/// in `GetNetworkForMagic`:
/// https://github.com/bitcoin/bitcoin/blob/master/src/kernel/chainparams.cpp#L703-L723
pub const MAIN_NET_MAGIC: u32 = 0xF9BE_B4D9;
pub const TEST_NET3_MAGIC: u32 = 0x0B11_0907;
pub const REG_TEST_MAGIC: u32 = 0xFABF_B5DA;
pub const SIG_NET_MAGIC: u32 = 0x0A03_CF40;

/// Current Bitcoin P2P protocol version.
///
/// This value is sent in the `version` message during handshake
/// and is used for peer capability negotiation and feature gating.
///
/// The protocol version is defined in Bitcoin Core:
/// https://github.com/bitcoin/bitcoin/blob/707ad466968b947b364cfc25bcb4d6895e799418/src/node/protocol_version.h#L12
pub const PROTOCOL_VERSION: i32 = 70016;

/// Hard cap on a single message payload (32 MiB).
pub const MAX_MESSAGE_SIZE: usize = 0x0200_0000;

/// Maximum number of entries an `addr` or `addrv2` message may carry.
pub const MAX_ADDRESSES: u64 = 1000;

/// Maximum address length accepted in an `addrv2` entry.
pub const MAX_ADDRV2_ADDRESS_SIZE: u64 = 512;

/// Length of the command field in the message header.
pub const COMMAND_LEN: usize = 12;

/// Size of the header that follows the magic: command + length + checksum.
pub const HEADER_LENGTH: usize = COMMAND_LEN + 4 + 4;

/// Full frame overhead, magic included.
pub const FRAME_OVERHEAD: usize = 4 + HEADER_LENGTH;

/// `PeerAddress` layouts, carried as the serializer's protocol version.
///
/// - `0`: embedded in `version` payloads (no timestamp)
/// - `1`: legacy `addr` entries
/// - `2`: BIP 155 `addrv2` entries
pub const ADDRESS_FORMAT_VERSION: u32 = 0;
pub const ADDRESS_FORMAT_V1: u32 = 1;
pub const ADDRESS_FORMAT_V2: u32 = 2;
