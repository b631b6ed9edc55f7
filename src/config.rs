use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Where dnsmasq writes its lease database unless told otherwise.
pub const DEFAULT_LEASE_FILE: &str = "/var/lib/misc/dnsmasq.leases";

/// Extra-argument prefix that overrides [`DEFAULT_LEASE_FILE`].
pub const LEASE_FILE_FLAG: &str = "--dhcp-leasefile=";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address of the bridge dnsmasq serves; its first three octets
    /// become the DHCP range prefix.
    pub bridge_address: String,
    /// Appended verbatim after the internally computed arguments.
    #[serde(default)]
    pub dnsmasq_args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_address: "192.168.100.1".to_string(),
            dnsmasq_args: Vec::new(),
        }
    }
}

impl Config {
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.dhcp_prefix()?;
        Ok(())
    }

    /// Returns the first three dot-separated components of the bridge address.
    ///
    /// The components are not checked for being numeric; only their count is.
    pub fn dhcp_prefix(&self) -> Result<String> {
        let octets: Vec<&str> = self.bridge_address.trim().split('.').collect();
        if octets.len() < 3 || octets[..3].iter().any(|octet| octet.is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "bridge_address {:?} needs at least three dot-separated octets",
                self.bridge_address
            )));
        }
        Ok(octets[..3].join("."))
    }

    /// Resolves the lease database path.
    ///
    /// The last `--dhcp-leasefile=` entry in `dnsmasq_args` wins, matching
    /// how dnsmasq itself treats repeated options.
    pub fn lease_file_path(&self) -> PathBuf {
        self.dnsmasq_args
            .iter()
            .filter_map(|arg| arg.strip_prefix(LEASE_FILE_FLAG))
            .next_back()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LEASE_FILE))
    }
}
