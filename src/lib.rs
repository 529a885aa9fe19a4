//! Bitcoin P2P wire protocol engine.
//!
//! - [`wire`]: message framing and lazily parsed, cache-aware payloads.
//! - [`net`]: a non-blocking reactor for many peer connections.
//! - [`network`]: per-network parameters (magic, default port).
//! - [`config`]: engine settings from TOML and the environment.
pub mod config;
pub mod error;
pub mod net;
pub mod network;
pub mod wire;

pub use error::{NetError, WireError};
