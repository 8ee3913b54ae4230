//! Serde model of the capture document.
//!
//! The capture is a HAR-shaped JSON document. Browser exports nest everything
//! under a top-level `log` object; hand-built captures usually do not, so both
//! shapes are accepted.

use serde::{Deserialize, Deserializer};

/// Top-level capture document
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "CaptureDocument")]
pub struct Capture {
    pub entries: Vec<CaptureEntry>,
    /// Listener URLs to bind (`protocol://hostname:port`)
    pub instances: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CaptureDocument {
    Wrapped { log: CaptureLog },
    Bare(CaptureLog),
}

#[derive(Deserialize)]
struct CaptureLog {
    entries: Vec<CaptureEntry>,
    #[serde(default)]
    instances: Option<Vec<String>>,
}

impl From<CaptureDocument> for Capture {
    fn from(doc: CaptureDocument) -> Self {
        let log = match doc {
            CaptureDocument::Wrapped { log } | CaptureDocument::Bare(log) => log,
        };
        Self {
            entries: log.entries,
            instances: log.instances,
        }
    }
}

/// One recorded request/response exchange
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureEntry {
    pub started_date_time: String,
    #[serde(default, rename = "serverIPAddress")]
    pub server_ip_address: Option<String>,
    pub request: CapturedRequest,
    pub response: CapturedResponse,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Vec<CapturedHeader>,
}

fn default_method() -> String {
    "GET".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedResponse {
    pub status: u16,
    pub headers: Vec<CapturedHeader>,
    #[serde(default = "default_http_version")]
    pub http_version: String,
    pub content: CapturedContent,
}

fn default_http_version() -> String {
    "unknown".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapturedHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapturedContent {
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default, deserialize_with = "deserialize_compression_flag")]
    pub compression: bool,
}

/// HAR writers disagree on `compression`: some emit a flag, most emit the
/// number of bytes saved. Any non-zero number counts as compressed.
fn deserialize_compression_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(flag)) => flag,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_and_wrapped_documents() {
        let bare = r#"{"entries": [], "instances": ["http://127.0.0.1:8080"]}"#;
        let capture: Capture = serde_json::from_str(bare).unwrap();
        assert!(capture.entries.is_empty());
        assert_eq!(capture.instances.unwrap(), vec!["http://127.0.0.1:8080"]);

        let wrapped = r#"{"log": {"version": "1.2", "entries": []}}"#;
        let capture: Capture = serde_json::from_str(wrapped).unwrap();
        assert!(capture.entries.is_empty());
        assert!(capture.instances.is_none());
    }

    #[test]
    fn test_compression_flag_variants() {
        let parse = |raw: &str| -> bool {
            let content: CapturedContent = serde_json::from_str(raw).unwrap();
            content.compression
        };
        assert!(parse(r#"{"compression": true}"#));
        assert!(parse(r#"{"compression": 812}"#));
        assert!(!parse(r#"{"compression": 0}"#));
        assert!(!parse(r#"{"compression": false}"#));
        assert!(!parse(r#"{}"#));
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        // response.content missing
        let raw = r#"{"entries": [{
            "startedDateTime": "2019-01-01T00:00:00.000Z",
            "request": {"method": "GET", "url": "http://a.test/"},
            "response": {"status": 200, "headers": []}
        }]}"#;
        assert!(serde_json::from_str::<Capture>(raw).is_err());
    }
}
