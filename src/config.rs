//! Engine configuration: defaults, then a TOML file, then `BTC_WIRE_*`
//! environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::network::NetworkParams;
use crate::wire::codec::Serializer;
use crate::wire::constants::PROTOCOL_VERSION;

/// Settings shared by the binaries and the connection managers.
///
/// File: `$BTC_WIRE_CONFIG`, else `~/.config/btc-wire/config.toml`.
/// Env overrides: `BTC_WIRE_NETWORK`, `BTC_WIRE_PROTOCOL_VERSION`,
/// `BTC_WIRE_PARSE_RETAIN`, `BTC_WIRE_CONNECT_TIMEOUT_MS`, `BTC_WIRE_LISTEN_PORT`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// main, test, regtest or signet.
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,
    /// Keep raw bytes of parsed messages for cheap re-serialization.
    #[serde(default)]
    pub parse_retain: bool,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Port for inbound connections; 0 means the network's default port.
    #[serde(default)]
    pub listen_port: u16,
}

fn default_network() -> String {
    "main".to_string()
}
fn default_protocol_version() -> u32 {
    PROTOCOL_VERSION as u32
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            protocol_version: default_protocol_version(),
            parse_retain: false,
            connect_timeout_ms: default_connect_timeout_ms(),
            listen_port: 0,
        }
    }
}

impl EngineConfig {
    /// Resolves the configured network. Unknown names fall back to mainnet.
    pub fn params(&self) -> NetworkParams {
        self.network.parse().unwrap_or_else(|e: String| {
            warn!(error = %e, "falling back to mainnet");
            NetworkParams::mainnet()
        })
    }

    pub fn serializer(&self) -> Serializer {
        Serializer::with_version(self.params(), self.protocol_version, self.parse_retain)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn listen_port(&self) -> u16 {
        if self.listen_port == 0 {
            self.params().port()
        } else {
            self.listen_port
        }
    }

    /// Applies overrides from `var` (normally `std::env::var`).
    ///
    /// Values that do not parse are ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(s) = var("BTC_WIRE_NETWORK") {
            self.network = s;
        }
        if let Some(v) = var("BTC_WIRE_PROTOCOL_VERSION").and_then(|s| s.parse().ok()) {
            self.protocol_version = v;
        }
        if let Some(v) = var("BTC_WIRE_PARSE_RETAIN").and_then(|s| s.parse().ok()) {
            self.parse_retain = v;
        }
        if let Some(v) = var("BTC_WIRE_CONNECT_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
            self.connect_timeout_ms = v;
        }
        if let Some(v) = var("BTC_WIRE_LISTEN_PORT").and_then(|s| s.parse().ok()) {
            self.listen_port = v;
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> EngineConfig {
    let mut c = config_path()
        .and_then(|p| load_file(&p))
        .unwrap_or_default();
    c.apply_env(|k| std::env::var(k).ok());
    c
}

fn config_path() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os("BTC_WIRE_CONFIG") {
        return Some(PathBuf::from(p));
    }
    std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config/btc-wire/config.toml"))
}

/// Reads one TOML file. Missing or malformed files yield `None`.
pub fn load_file(path: &Path) -> Option<EngineConfig> {
    let s = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<EngineConfig>(&s) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.params(), NetworkParams::mainnet());
        assert_eq!(c.protocol_version, 70016);
        assert_eq!(c.listen_port(), 8333);
        assert_eq!(c.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn file_fields_override_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "network = \"regtest\"\nparse_retain = true").unwrap();

        let c = load_file(f.path()).unwrap();
        assert_eq!(c.params(), NetworkParams::regtest());
        assert!(c.parse_retain);
        assert_eq!(c.connect_timeout_ms, 10_000);
        assert!(c.serializer().is_parse_retain());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "netwrk = \"regtest\"").unwrap();
        assert!(load_file(f.path()).is_none());
    }

    #[test]
    fn env_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("BTC_WIRE_NETWORK", "signet"),
            ("BTC_WIRE_LISTEN_PORT", "19000"),
            ("BTC_WIRE_CONNECT_TIMEOUT_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut c = EngineConfig::default();
        c.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.params(), NetworkParams::signet());
        assert_eq!(c.listen_port(), 19000);
        assert_eq!(c.connect_timeout_ms, 10_000);
    }
}
