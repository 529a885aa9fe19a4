//! Error types for the wire codec and the connection engine.

use std::io;

/// Failure while framing, parsing or encoding a protocol message.
///
/// Every variant is fatal for the message (and, on a live connection, for
/// that connection only). Noise before the network magic and unknown
/// commands are not errors and never show up here.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The payload ended before a field could be read.
    #[error("unexpected end of payload while reading {0}")]
    Truncated(&'static str),

    /// The header declared a payload size that is negative or above the cap.
    #[error("declared payload size {0} is out of bounds")]
    HeaderSize(i64),

    /// A command name that is not ASCII text of at most 12 bytes.
    #[error("invalid command name {0:?}")]
    InvalidCommand(String),

    /// The payload does not hash to the checksum carried in the header.
    #[error("checksum mismatch: header {expected}, payload {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// An address list declared more entries than a peer may send.
    #[error("address message declares {0} entries, limit is 1000")]
    TooManyAddresses(u64),

    /// A BIP155 address field declared an absurd length.
    #[error("address length {0} is too large")]
    AddressTooLong(u64),

    /// A known BIP155 network id carried the wrong number of address bytes.
    #[error("network id {network_id:#04x} expects {expected} address bytes, got {actual}")]
    AddressLength {
        network_id: u8,
        expected: usize,
        actual: usize,
    },

    /// The address cannot be expressed in the requested layout.
    #[error("address cannot be encoded: {0}")]
    Unencodable(&'static str),

    /// The serializer's protocol version names no known `PeerAddress` layout.
    #[error("protocol version {0} has no peer address layout")]
    UnsupportedLayout(u32),

    /// A child carries a serializer for a different layout than its container.
    #[error("address uses protocol version {actual}, container requires {expected}")]
    ProtocolVersionMismatch { expected: u32, actual: u32 },

    /// An encoded message would exceed the 32 MiB cap.
    #[error("message of {0} bytes exceeds the maximum message size")]
    MessageTooLarge(usize),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure reported by the connection engine.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Queuing this write would exceed the per-connection outbound budget.
    #[error("outbound buffer overflowed: {queued} queued + {requested} requested > {limit}")]
    OutboundOverflow {
        queued: usize,
        requested: usize,
        limit: usize,
    },

    /// The connection was closed before the operation could complete.
    #[error("connection closed")]
    Closed,

    /// The outbound connect attempt failed.
    #[error("failed to connect: {0}")]
    ConnectFailed(#[source] io::Error),

    /// The outbound connect attempt did not finish within the caller's timeout.
    #[error("connect timed out")]
    ConnectTimeout,

    /// The manager is not running (never started or already shut down).
    #[error("connection manager is not running")]
    NotRunning,

    /// The collaborator refused or mishandled the connection.
    #[error("connection rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
