//! Admin, listen, and TLS configuration.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Administrative listener (reset, health, introspection)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AdminConfig {
    #[serde(default = "default_admin_host")]
    pub host: IpAddr,
    #[serde(default = "default_admin_port")]
    pub port: u16,
}

fn default_admin_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_admin_port() -> u16 {
    2525
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: default_admin_host(),
            port: default_admin_port(),
        }
    }
}

/// Replay listener settings shared by every recorded instance
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenConfig {
    /// Address every instance binds to instead of its recorded server address.
    /// The recorded port is always kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<IpAddr>,
}

/// Local certificate authority settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TlsConfig {
    /// Directory holding the root CA and issued identities
    #[serde(default = "default_cert_dir")]
    pub cert_dir: PathBuf,
}

fn default_cert_dir() -> PathBuf {
    PathBuf::from(".rewind/certs")
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_dir: default_cert_dir(),
        }
    }
}
