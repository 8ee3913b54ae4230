//! Configuration types for the replay server.

mod listen;
mod protocol;

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use listen::{AdminConfig, ListenConfig, TlsConfig};
pub use protocol::{HttpVersion, Protocol};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReplayConfig {
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub tls: TlsConfig,
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub admin_host: Option<IpAddr>,
    pub admin_port: Option<u16>,
    pub bind_address: Option<IpAddr>,
    pub cert_dir: Option<PathBuf>,
}

impl ReplayConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        // An empty file is a valid, all-defaults config
        let config: ReplayConfig = if contents.trim().is_empty() {
            ReplayConfig::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of this config
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self, anyhow::Error> {
        if let Some(host) = overrides.admin_host {
            self.admin.host = host;
        }
        if let Some(port) = overrides.admin_port {
            self.admin.port = port;
        }
        if let Some(address) = overrides.bind_address {
            self.listen.bind_address = Some(address);
        }
        if let Some(dir) = overrides.cert_dir {
            self.tls.cert_dir = dir;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.admin.port == 0 {
            anyhow::bail!("admin.port must be a non-zero port number");
        }

        if self.tls.cert_dir.as_os_str().is_empty() {
            anyhow::bail!(
                "tls.cert_dir must not be empty. \
                 Please provide a directory for the local certificate authority"
            );
        }

        Ok(())
    }
}
