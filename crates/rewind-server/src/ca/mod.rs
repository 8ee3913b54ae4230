//! Certificate provisioning for recorded TLS instances.
//!
//! Listeners ask a [`CertificateAuthority`] for an identity covering every
//! hostname a recorded instance served. [`LocalCa`] issues them in-process
//! from a root CA persisted on disk.

mod local;

pub use local::LocalCa;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

/// A PEM-encoded certificate chain and its private key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsIdentity {
    /// Leaf certificate first, followed by its issuer
    pub cert_pem: String,
    pub key_pem: String,
}

#[derive(Error, Debug)]
pub enum CaError {
    #[error("Certificate generation failed: {0}")]
    Generation(#[from] rcgen::Error),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt certificate store entry {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Identity '{0}' requested without any hostname")]
    NoHostnames(String),
}

/// Issues TLS identities for listeners
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Identity for `key_id` covering `hostnames`.
    ///
    /// Creates (and may persist) the identity on first use; later calls with
    /// the same key id in one run return the same pair.
    async fn request_identity(
        &self,
        hostnames: &[String],
        key_id: &str,
    ) -> Result<TlsIdentity, CaError>;
}
