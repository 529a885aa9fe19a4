//! Bitcoin P2P wire protocol.
//!
//! - [`codec`] frames messages (magic, header, checksum) and finds frame
//!   boundaries in a noisy byte stream.
//! - [`message`], [`address`] and [`address_message`] hold the typed
//!   payloads. Every payload type implements [`WireMessage`], which keeps
//!   the parsed bytes around (in retain mode) so that an unchanged message
//!   re-serializes without re-encoding.
//!
//! Protocol reference:
//! https://developer.bitcoin.org/reference/p2p_networking.html
pub mod address;
pub mod address_message;
pub mod codec;
pub mod constants;
pub mod message;
pub mod payload;
pub mod services;
pub mod state;

pub(crate) mod decode;
pub(crate) mod encode;

pub use address::{PeerAddress, PeerHost};
pub use address_message::{AddressFormat, AddressMessage};
pub use codec::{MagicSearch, PacketHeader, Serializer};
pub use encode::varint_size;
pub use message::{Command, Message, Ping, Pong, SendAddrV2, UnknownMessage};
pub use payload::build_version_payload;
pub use services::Services;
pub use state::{MessageState, OwnerHandle, WireMessage};
