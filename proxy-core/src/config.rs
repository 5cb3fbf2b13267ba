//! Runtime configuration, loaded from an optional TOML file and overridden
//! field-by-field by CLI flags in `proxy-runner` (spec §6, ambient addition).
use serde_derive::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PUBLISHER_PORT: u16 = 9000;
pub const DEFAULT_PULLER_PORT: u16 = 9001;
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_SERVER_BROADCAST_PORT: u16 = 9080;
pub const DEFAULT_PROXY_BROADCAST_PORT: u16 = 9081;
pub const DEFAULT_ADMIN_PORT: u16 = 9082;
pub const DEFAULT_PORTS_COUNT: usize = 4;
pub const DEFAULT_DISCOVERY_RETRIES: u32 = 5;
pub const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 500;
pub const DEFAULT_PINGER_SLEEP_MS: u64 = 1000;
pub const DEFAULT_TICK_SLEEP_MS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub address: String,
    pub publisher_port: u16,
    pub puller_port: u16,
    pub broadcast_port: u16,
    pub use_broadcast: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proxy {
    pub broadcast_port: u16,
    pub use_broadcast: bool,
    pub admin_port: u16,
    pub ports_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discovery {
    pub retries: u32,
    pub timeout_ms: u64,
    pub pinger_sleep_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub server: Server,
    pub proxy: Proxy,
    pub discovery: Discovery,
    pub verbose: bool,
}

impl Default for ProxyConfig {
    fn default() -> ProxyConfig {
        ProxyConfig {
            server: Server {
                address: DEFAULT_ADDRESS.to_string(),
                publisher_port: DEFAULT_PUBLISHER_PORT,
                puller_port: DEFAULT_PULLER_PORT,
                broadcast_port: DEFAULT_SERVER_BROADCAST_PORT,
                use_broadcast: true,
            },
            proxy: Proxy {
                broadcast_port: DEFAULT_PROXY_BROADCAST_PORT,
                use_broadcast: true,
                admin_port: DEFAULT_ADMIN_PORT,
                ports_count: DEFAULT_PORTS_COUNT,
            },
            discovery: Discovery {
                retries: DEFAULT_DISCOVERY_RETRIES,
                timeout_ms: DEFAULT_DISCOVERY_TIMEOUT_MS,
                pinger_sleep_ms: DEFAULT_PINGER_SLEEP_MS,
            },
            verbose: false,
        }
    }
}

impl ProxyConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> ProxyConfig {
        serdeconv::from_toml_file(path).expect("Error loading proxy configuration file")
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery.timeout_ms)
    }

    pub fn pinger_sleep(&self) -> Duration {
        Duration::from_millis(self.discovery.pinger_sleep_ms)
    }

    pub fn tick_sleep() -> Duration {
        Duration::from_millis(DEFAULT_TICK_SLEEP_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_cli_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.server.publisher_port, 9000);
        assert_eq!(config.server.puller_port, 9001);
        assert_eq!(config.server.address, "127.0.0.1");
        assert_eq!(config.server.broadcast_port, 9080);
        assert_eq!(config.proxy.broadcast_port, 9081);
        assert_eq!(config.proxy.admin_port, 9082);
        assert_eq!(config.proxy.ports_count, 4);
        assert!(config.server.use_broadcast);
        assert!(config.proxy.use_broadcast);
    }
}
