//! Response materialization: stored record + serve time → concrete response.

use crate::capture::ResponseRecord;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Framing headers that describe how the captured bytes were delimited on the
/// original connection. The replayed body is always sent with an exact length.
const FRAMING_HEADERS: [&str; 2] = ["content-length", "transfer-encoding"];

/// A response ready to be written to the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedResponse {
    pub status: u16,
    /// Header pairs in capture order, `Content-Length` last
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl MaterializedResponse {
    /// First value of a header, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Render `record` as served at `now`.
///
/// Dated headers are re-anchored on `now`; literal headers pass through
/// unchanged. The captured `Content-Length` is replaced by the stored body length.
pub fn materialize(record: &ResponseRecord, now: DateTime<Utc>) -> MaterializedResponse {
    let mut headers: Vec<(String, String)> = record
        .headers
        .iter()
        .filter(|(name, _)| is_replayable(name))
        .map(|(name, value)| (name.clone(), value.render(now)))
        .collect();

    headers.push(("Content-Length".to_string(), record.body.len().to_string()));

    MaterializedResponse {
        status: record.status,
        headers,
        body: record.body.clone(),
    }
}

/// HTTP/2 pseudo-headers (`:status`) show up in some captures but are not header fields
fn is_replayable(name: &str) -> bool {
    !name.starts_with(':')
        && !FRAMING_HEADERS
            .iter()
            .any(|framing| name.eq_ignore_ascii_case(framing))
}
