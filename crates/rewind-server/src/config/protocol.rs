//! Transport protocol and recorded HTTP version types.

use serde::{Deserialize, Serialize};

/// Transport a recorded instance is served over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plaintext HTTP
    #[default]
    Http,
    /// HTTP over TLS
    Https,
}

impl Protocol {
    /// Get protocol name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    /// Parse protocol from URL scheme
    pub fn from_scheme(scheme: &str) -> Result<Self, String> {
        match scheme.to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            _ => Err(format!("Unsupported protocol scheme: {scheme}")),
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Protocol::Https)
    }
}

/// Application-layer framing a recorded instance spoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpVersion {
    /// HTTP/1.0 or HTTP/1.1
    Http1,
    /// HTTP/2
    Http2,
    /// Not recorded, or a version we do not frame explicitly (e.g. `h3`).
    /// TLS listeners negotiate HTTP/1.1 or HTTP/2 per connection.
    Negotiated,
}

impl HttpVersion {
    /// Interpret the `httpVersion` string a capture recorded
    pub fn from_recorded(version: &str) -> Self {
        match version.trim().to_ascii_lowercase().as_str() {
            "http/1.0" | "http/1.1" | "http/1" | "http/1.x" => HttpVersion::Http1,
            "http/2" | "http/2.0" | "h2" => HttpVersion::Http2,
            _ => HttpVersion::Negotiated,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, HttpVersion::Negotiated)
    }

    /// ALPN identifiers a TLS listener for this version advertises, in preference order
    pub fn alpn_protocols(&self) -> Vec<Vec<u8>> {
        match self {
            HttpVersion::Http1 => vec![b"http/1.1".to_vec()],
            HttpVersion::Http2 => vec![b"h2".to_vec()],
            HttpVersion::Negotiated => vec![b"h2".to_vec(), b"http/1.1".to_vec()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scheme() {
        assert_eq!(Protocol::from_scheme("HTTPS"), Ok(Protocol::Https));
        assert_eq!(Protocol::from_scheme("http"), Ok(Protocol::Http));
        assert!(Protocol::from_scheme("ws").is_err());
        assert!(Protocol::from_scheme("ftp").is_err());
    }

    #[test]
    fn test_recorded_versions() {
        assert_eq!(HttpVersion::from_recorded("HTTP/1.1"), HttpVersion::Http1);
        assert_eq!(HttpVersion::from_recorded("http/1.0"), HttpVersion::Http1);
        assert_eq!(HttpVersion::from_recorded("HTTP/2.0"), HttpVersion::Http2);
        assert_eq!(HttpVersion::from_recorded("h2"), HttpVersion::Http2);
        assert_eq!(
            HttpVersion::from_recorded("unknown"),
            HttpVersion::Negotiated
        );
        assert_eq!(HttpVersion::from_recorded("h3"), HttpVersion::Negotiated);
        assert_eq!(HttpVersion::from_recorded(""), HttpVersion::Negotiated);
    }

    #[test]
    fn test_alpn_per_version() {
        assert_eq!(HttpVersion::Http1.alpn_protocols(), vec![b"http/1.1".to_vec()]);
        assert_eq!(HttpVersion::Http2.alpn_protocols(), vec![b"h2".to_vec()]);
        assert_eq!(HttpVersion::Negotiated.alpn_protocols().len(), 2);
    }
}
