//! TLS acceptor construction for recorded HTTPS instances.

use crate::ca::TlsIdentity;
use rustls::pki_types::CertificateDer;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Create a TLS acceptor from a PEM identity, advertising `alpn_protocols`.
pub fn create_tls_acceptor(
    identity: &TlsIdentity,
    alpn_protocols: Vec<Vec<u8>>,
) -> Result<TlsAcceptor, anyhow::Error> {
    // Load certificate chain
    let certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut identity.cert_pem.as_bytes())
        .collect::<Result<_, _>>()
        .map_err(|e| anyhow::anyhow!("Failed to parse certificate chain: {e}"))?;

    if certs.is_empty() {
        anyhow::bail!("No certificates found in identity");
    }

    // PKCS8, RSA, or SEC1 private key
    let key = rustls_pemfile::private_key(&mut identity.key_pem.as_bytes())
        .map_err(|e| anyhow::anyhow!("Failed to parse private key: {e}"))?
        .ok_or_else(|| anyhow::anyhow!("No private key found in identity"))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| anyhow::anyhow!("Failed to select TLS protocol versions: {e}"))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| anyhow::anyhow!("Failed to build TLS configuration: {e}"))?;
    config.alpn_protocols = alpn_protocols;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::{CertificateAuthority, LocalCa};

    #[tokio::test]
    async fn test_acceptor_from_issued_identity() {
        let dir = tempfile::tempdir().unwrap();
        let ca = LocalCa::open(dir.path()).await.unwrap();
        let identity = ca
            .request_identity(&["a.test".to_string()], "k")
            .await
            .unwrap();

        let acceptor = create_tls_acceptor(&identity, vec![b"h2".to_vec()]).unwrap();
        assert_eq!(acceptor.config().alpn_protocols, vec![b"h2".to_vec()]);
    }

    #[test]
    fn test_rejects_empty_identity() {
        let identity = TlsIdentity {
            cert_pem: String::new(),
            key_pem: String::new(),
        };
        let err = create_tls_acceptor(&identity, Vec::new())
            .err()
            .expect("expected an error");
        assert!(err.to_string().contains("No certificates"));
    }
}
