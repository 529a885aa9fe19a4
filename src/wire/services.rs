use std::fmt::{self, Debug, Formatter};

/// Service bits a node advertises in `version` and address entries.
///
/// Unknown bits are carried through unchanged.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Services(u64);

impl Services {
    pub const NONE: Services = Services(0x00);

    /// Full node, serves the whole chain.
    pub const NODE_NETWORK: Services = Services(0x01);

    /// BIP111 bloom-filtered connections.
    pub const NODE_BLOOM: Services = Services(0x04);

    /// BIP144 witness data.
    pub const NODE_WITNESS: Services = Services(0x08);

    /// BIP157 compact block filters.
    pub const NODE_COMPACT_FILTERS: Services = Services(0x40);

    /// BIP159: like `NODE_NETWORK` but only the last 288 blocks.
    pub const NODE_NETWORK_LIMITED: Services = Services(0x0400);

    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, other: Services) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn names(self) -> Vec<&'static str> {
        const NAMED: [(Services, &str); 5] = [
            (Services::NODE_NETWORK, "NODE_NETWORK"),
            (Services::NODE_BLOOM, "NODE_BLOOM"),
            (Services::NODE_WITNESS, "NODE_WITNESS"),
            (Services::NODE_COMPACT_FILTERS, "NODE_COMPACT_FILTERS"),
            (Services::NODE_NETWORK_LIMITED, "NODE_NETWORK_LIMITED"),
        ];

        if self.is_empty() {
            return vec!["NONE"];
        }
        NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl From<u64> for Services {
    fn from(value: u64) -> Self {
        Services::new(value)
    }
}

impl Debug for Services {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Services(NONE)");
        }
        write!(f, "Services({}) [0x{:016x}]", self.names().join(" | "), self.bits())
    }
}
