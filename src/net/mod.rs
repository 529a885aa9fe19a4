//! Non-blocking connection reactor.
//!
//! [`ClientConnectionManager`] opens outbound connections and [`Server`]
//! accepts inbound ones. Both run a single-threaded tokio runtime on a
//! dedicated thread and hand each socket to a [`StreamConnection`], which
//! consumes bytes and writes through its [`WriteTarget`].
//!
//! [`PeerConnection`] is the stock [`StreamConnection`] for framed protocol
//! messages.
pub mod client;
pub mod connection;
pub mod peer;
pub mod server;

pub(crate) mod handler;

pub use client::ClientConnectionManager;
pub use connection::{Completion, StreamConnection, StreamConnectionFactory, WriteTarget};
pub use peer::{PeerConnection, PeerFactory, PeerHandle, INBOUND_QUEUE_CAPACITY};
pub use server::Server;
