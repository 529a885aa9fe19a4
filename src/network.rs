//! Per-network constants.
//!
//! A [`NetworkParams`] value is built once (from a preset or from config)
//! and passed by value into every serializer. There is no process-wide
//! default network.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::wire::constants::{MAIN_NET_MAGIC, REG_TEST_MAGIC, SIG_NET_MAGIC, TEST_NET3_MAGIC};

/// How a frame's 4-byte checksum is derived from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumScheme {
    /// First 4 bytes of `SHA256(SHA256(payload))`.
    DoubleSha256,
}

impl ChecksumScheme {
    pub fn checksum(&self, payload: &[u8]) -> [u8; 4] {
        match self {
            ChecksumScheme::DoubleSha256 => {
                let hash = Sha256::digest(Sha256::digest(payload));
                [hash[0], hash[1], hash[2], hash[3]]
            }
        }
    }
}

/// Immutable identity of a Bitcoin network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkParams {
    id: &'static str,
    packet_magic: u32,
    port: u16,
    checksum: ChecksumScheme,
}

impl NetworkParams {
    pub const fn mainnet() -> Self {
        Self {
            id: "main",
            packet_magic: MAIN_NET_MAGIC,
            port: 8333,
            checksum: ChecksumScheme::DoubleSha256,
        }
    }

    pub const fn testnet3() -> Self {
        Self {
            id: "test",
            packet_magic: TEST_NET3_MAGIC,
            port: 18333,
            checksum: ChecksumScheme::DoubleSha256,
        }
    }

    pub const fn regtest() -> Self {
        Self {
            id: "regtest",
            packet_magic: REG_TEST_MAGIC,
            port: 18444,
            checksum: ChecksumScheme::DoubleSha256,
        }
    }

    pub const fn signet() -> Self {
        Self {
            id: "signet",
            packet_magic: SIG_NET_MAGIC,
            port: 38333,
            checksum: ChecksumScheme::DoubleSha256,
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Magic value written big-endian in front of every message.
    pub fn packet_magic(&self) -> u32 {
        self.packet_magic
    }

    /// Default TCP port on which to connect to nodes.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn checksum_scheme(&self) -> ChecksumScheme {
        self.checksum
    }
}

impl fmt::Display for NetworkParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id)
    }
}

impl FromStr for NetworkParams {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" | "mainnet" => Ok(Self::mainnet()),
            "test" | "testnet" | "testnet3" => Ok(Self::testnet3()),
            "regtest" => Ok(Self::regtest()),
            "signet" => Ok(Self::signet()),
            other => Err(format!("unknown network: {other}")),
        }
    }
}
