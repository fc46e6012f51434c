//! DNS Seed Configuration
//!
//! Configurable parameters for the DNS Seed service. Values come from an
//! optional TOML file, then command-line overrides, then `validate()`.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Main configuration for the DNS Seed service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    // === Network ===

    /// UDP address the DNS server binds to
    pub listen_addr: SocketAddr,

    /// Zone this seed is authoritative for, without trailing dot
    pub root_domain: String,

    /// HTTP API address for metrics
    pub api_listen_addr: SocketAddr,

    // === lightningd ===

    /// Time between polls of lightningd (seconds)
    pub poll_interval_secs: u64,

    /// lightningd data directory; `$HOME` and `~` are expanded on load
    pub lightning_dir: PathBuf,

    /// Network subdirectory holding the RPC socket
    pub network: String,

    /// Name of the RPC socket file
    pub rpc_file: String,

    // === Responses ===

    /// Peers returned for a wildcard SRV query
    pub max_results: usize,

    /// Well-known Lightning port
    pub default_port: u16,

    // === Monitoring ===

    /// Interval between status log lines (seconds)
    pub status_interval_secs: u64,

    // === Announcements ===

    pub irc: IrcConfig,
}

/// Announcement channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrcConfig {
    pub enabled: bool,

    /// `host:port` of the IRC server
    pub server: String,

    pub channel: String,

    pub nick: String,

    /// Wait before reconnecting after a lost connection (seconds)
    pub reconnect_delay_secs: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            // Network
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 53)),  // Needs CAP_NET_BIND_SERVICE
            root_domain: "lseed.bitcoinstats.com".to_string(),
            api_listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),

            // lightningd
            poll_interval_secs: 10,
            lightning_dir: expand_home(Path::new("$HOME/.lightning")),
            network: "bitcoin".to_string(),
            rpc_file: "lightning-rpc".to_string(),

            // Responses
            max_results: 25,
            default_port: crate::types::DEFAULT_PORT,

            // Monitoring
            status_interval_secs: 60,

            irc: IrcConfig::default(),
        }
    }
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server: "irc.lfnet.org:6667".to_string(),
            channel: "#lightning-nodes".to_string(),
            nick: "lseed".to_string(),
            reconnect_delay_secs: 30,
        }
    }
}

impl SeedConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.lightning_dir = expand_home(&config.lightning_dir);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path of the lightningd JSON-RPC socket
    pub fn rpc_socket_path(&self) -> PathBuf {
        self.lightning_dir.join(&self.network).join(&self.rpc_file)
    }

    // Builder-style methods for CLI overrides; `None` keeps the current value

    pub fn with_listen_addr(mut self, addr: Option<SocketAddr>) -> Self {
        if let Some(addr) = addr {
            self.listen_addr = addr;
        }
        self
    }

    pub fn with_root_domain(mut self, domain: Option<String>) -> Self {
        if let Some(domain) = domain {
            self.root_domain = domain;
        }
        self
    }

    pub fn with_poll_interval(mut self, secs: Option<u64>) -> Self {
        if let Some(secs) = secs {
            self.poll_interval_secs = secs;
        }
        self
    }

    pub fn with_lightning_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.lightning_dir = expand_home(&dir);
        }
        self
    }

    pub fn with_network(mut self, network: Option<String>) -> Self {
        if let Some(network) = network {
            self.network = network;
        }
        self
    }

    pub fn with_rpc_file(mut self, rpc_file: Option<String>) -> Self {
        if let Some(rpc_file) = rpc_file {
            self.rpc_file = rpc_file;
        }
        self
    }

    pub fn with_max_results(mut self, results: Option<usize>) -> Self {
        if let Some(results) = results {
            self.max_results = results;
        }
        self
    }

    pub fn with_api_listen_addr(mut self, addr: Option<SocketAddr>) -> Self {
        if let Some(addr) = addr {
            self.api_listen_addr = addr;
        }
        self
    }

    pub fn with_irc_enabled(mut self, enabled: bool) -> Self {
        self.irc.enabled = enabled;
        self
    }

    /// Validate configuration values and normalize the root domain
    pub fn validate(mut self) -> anyhow::Result<Self> {
        self.root_domain = self.root_domain.trim_end_matches('.').to_ascii_lowercase();

        if self.root_domain.is_empty() {
            anyhow::bail!("root_domain must not be empty");
        }

        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be greater than 0");
        }

        if !(1..=255).contains(&self.max_results) {
            anyhow::bail!("max_results ({}) must be between 1 and 255", self.max_results);
        }

        if self.default_port == 0 {
            anyhow::bail!("default_port must not be 0");
        }

        if self.status_interval_secs == 0 {
            anyhow::bail!("status_interval_secs must be greater than 0");
        }

        Ok(self)
    }
}

/// Replace a leading `$HOME` or `~` with the home directory
fn expand_home(path: &Path) -> PathBuf {
    let Some(text) = path.to_str() else {
        return path.to_path_buf();
    };
    let Ok(home) = std::env::var("HOME") else {
        return path.to_path_buf();
    };

    for prefix in ["$HOME", "~"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            if rest.is_empty() || rest.starts_with('/') {
                return PathBuf::from(format!("{}{}", home, rest));
            }
        }
    }
    path.to_path_buf()
}
