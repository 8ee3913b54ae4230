//! In-process certificate authority backed by a directory on disk.
//!
//! Layout of the cert dir:
//! - `ca.key` / `ca.pem`: the root CA; trust `ca.pem` in the client under test
//! - `<key_id>.json`: one issued identity per recorded TLS instance

use super::{CaError, CertificateAuthority, TlsIdentity};
use async_trait::async_trait;
use parking_lot::Mutex;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const CA_KEY_FILE: &str = "ca.key";
const CA_CERT_FILE: &str = "ca.pem";
const CA_COMMON_NAME: &str = "Rewind Local Replay CA";
const LEAF_VALIDITY_DAYS: i64 = 365;

/// On-disk form of an issued identity
#[derive(Debug, Serialize, Deserialize)]
struct StoredIdentity {
    hostnames: Vec<String>,
    cert_pem: String,
    key_pem: String,
}

pub struct LocalCa {
    dir: PathBuf,
    ca_cert: Certificate,
    ca_key: KeyPair,
    ca_cert_pem: String,
    /// A root created in this run cannot vouch for identities stored by an older one
    fresh: bool,
    issued: Mutex<HashMap<String, TlsIdentity>>,
}

impl LocalCa {
    /// Open the CA stored in `dir`, creating the root on first use
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CaError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| CaError::Io {
                path: dir.clone(),
                source,
            })?;

        let key_path = dir.join(CA_KEY_FILE);
        let cert_path = dir.join(CA_CERT_FILE);

        let (ca_key, fresh) = match read_optional(&key_path).await? {
            Some(pem) => {
                let key = KeyPair::from_pem(&pem).map_err(|e| CaError::Corrupt {
                    path: key_path.clone(),
                    reason: e.to_string(),
                })?;
                (key, false)
            }
            None => {
                let key = KeyPair::generate()?;
                write(&key_path, &key.serialize_pem()).await?;
                (key, true)
            }
        };

        // The issuer is rebuilt from the persisted key and a fixed subject, so
        // leaves it signs verify against the stored ca.pem.
        let ca_cert = root_params().self_signed(&ca_key)?;
        let ca_cert_pem = match read_optional(&cert_path).await? {
            Some(pem) if !fresh => pem,
            _ => {
                let pem = ca_cert.pem();
                write(&cert_path, &pem).await?;
                pem
            }
        };

        if fresh {
            info!("Created local CA in {}", dir.display());
        }
        info!(
            "Local CA certificate: {} (trust it in the client under test)",
            cert_path.display()
        );

        Ok(Self {
            dir,
            ca_cert,
            ca_key,
            ca_cert_pem,
            fresh,
            issued: Mutex::new(HashMap::new()),
        })
    }

    /// Path of the root certificate clients should trust
    pub fn ca_cert_path(&self) -> PathBuf {
        self.dir.join(CA_CERT_FILE)
    }

    pub fn ca_cert_pem(&self) -> &str {
        &self.ca_cert_pem
    }

    fn identity_path(&self, key_id: &str) -> PathBuf {
        self.dir.join(format!("{key_id}.json"))
    }

    /// A persisted identity, if it was issued by this root for exactly `hostnames`
    async fn load_identity(
        &self,
        path: &Path,
        hostnames: &[String],
    ) -> Result<Option<TlsIdentity>, CaError> {
        if self.fresh {
            return Ok(None);
        }
        let Some(raw) = read_optional(path).await? else {
            return Ok(None);
        };
        let stored: StoredIdentity =
            serde_json::from_str(&raw).map_err(|e| CaError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if stored.hostnames != hostnames {
            debug!(
                "Hostnames changed for {} ({:?} -> {:?}), reissuing",
                path.display(),
                stored.hostnames,
                hostnames
            );
            return Ok(None);
        }

        Ok(Some(TlsIdentity {
            cert_pem: stored.cert_pem,
            key_pem: stored.key_pem,
        }))
    }

    fn issue(&self, hostnames: &[String]) -> Result<TlsIdentity, CaError> {
        let mut params = CertificateParams::new(hostnames.to_vec())?;

        let mut dn = DistinguishedName::new();
        if let Some(primary) = hostnames.first() {
            dn.push(DnType::CommonName, primary.as_str());
        }
        params.distinguished_name = dn;
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        params.use_authority_key_identifier_extension = true;
        params.serial_number = Some(rcgen::SerialNumber::from(rand::random::<u64>()));

        let now = time::OffsetDateTime::now_utc();
        params.not_before = now - time::Duration::days(1);
        params.not_after = now + time::Duration::days(LEAF_VALIDITY_DAYS);

        let key = KeyPair::generate()?;
        let cert = params.signed_by(&key, &self.ca_cert, &self.ca_key)?;

        Ok(TlsIdentity {
            cert_pem: format!("{}{}", cert.pem(), self.ca_cert_pem),
            key_pem: key.serialize_pem(),
        })
    }
}

#[async_trait]
impl CertificateAuthority for LocalCa {
    async fn request_identity(
        &self,
        hostnames: &[String],
        key_id: &str,
    ) -> Result<TlsIdentity, CaError> {
        let cached = self.issued.lock().get(key_id).cloned();
        if let Some(identity) = cached {
            return Ok(identity);
        }

        let mut wanted: Vec<String> = hostnames.iter().map(|h| h.to_ascii_lowercase()).collect();
        wanted.sort();
        wanted.dedup();
        if wanted.is_empty() {
            return Err(CaError::NoHostnames(key_id.to_string()));
        }

        let path = self.identity_path(key_id);
        let identity = match self.load_identity(&path, &wanted).await? {
            Some(identity) => {
                debug!("Reusing identity {} for {:?}", key_id, wanted);
                identity
            }
            None => {
                let identity = self.issue(&wanted)?;
                let stored = StoredIdentity {
                    hostnames: wanted.clone(),
                    cert_pem: identity.cert_pem.clone(),
                    key_pem: identity.key_pem.clone(),
                };
                let json = serde_json::to_string_pretty(&stored).map_err(|e| CaError::Corrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                write(&path, &json).await?;
                info!("Issued identity {} for {:?}", key_id, wanted);
                identity
            }
        };

        Ok(self
            .issued
            .lock()
            .entry(key_id.to_string())
            .or_insert(identity)
            .clone())
    }
}

fn root_params() -> CertificateParams {
    let mut params = CertificateParams::default();

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, CA_COMMON_NAME);
    dn.push(DnType::OrganizationName, "Rewind");
    params.distinguished_name = dn;

    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.not_before = rcgen::date_time_ymd(2024, 1, 1);
    params.not_after = rcgen::date_time_ymd(2049, 12, 31);
    params
}

/// File contents, or `None` if it has not been created yet
async fn read_optional(path: &Path) -> Result<Option<String>, CaError> {
    match fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(CaError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

async fn write(path: &Path, contents: &str) -> Result<(), CaError> {
    fs::write(path, contents)
        .await
        .map_err(|source| CaError::Io {
            path: path.to_path_buf(),
            source,
        })
}
