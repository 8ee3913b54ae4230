//! Origin (scheme + host + port) derivation.

use hyper::http::uri::Authority;
use hyper::Uri;
use serde::Serialize;
use std::fmt;

/// A virtual server: scheme, lowercased host and explicit port
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

/// Well-known port for a scheme
pub fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

impl Origin {
    /// Build an origin, filling an absent port with the scheme default.
    pub fn new(scheme: &str, host: &str, port: Option<u16>) -> Option<Self> {
        let scheme = scheme.to_ascii_lowercase();
        let port = port.or_else(|| default_port(&scheme))?;
        if host.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_ascii_lowercase(),
            scheme,
            port,
        })
    }

    /// Origin of an inbound request, from the listener scheme and its `Host` authority
    pub fn from_authority(scheme: &str, authority: &str) -> Option<Self> {
        let authority: Authority = authority.trim().parse().ok()?;
        Self::new(scheme, authority.host(), authority.port_u16())
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Split an absolute URL into its origin and request target (path + query).
pub fn split_url(url: &str) -> Option<(Origin, String)> {
    let uri: Uri = url.parse().ok()?;
    let scheme = uri.scheme_str()?;
    let host = uri.host()?;
    let origin = Origin::new(scheme, host, uri.port_u16())?;
    Some((origin, request_target(&uri)))
}

/// Request target of a URI: path plus query, `/` when empty
pub fn request_target(uri: &Uri) -> String {
    match uri.path_and_query().map(|pq| pq.as_str()) {
        Some(target) if target.starts_with('/') => target.to_string(),
        Some(target) if !target.is_empty() => format!("/{target}"),
        _ => "/".to_string(),
    }
}
