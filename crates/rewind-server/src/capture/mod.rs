//! Capture ingestion.
//!
//! This module turns a recorded-traffic capture into a replayable index:
//! - `types`: serde model of the capture document
//! - `dates`: HTTP-date classification and time-delta normalization
//! - `content`: body decoding and gzip re-compression
//! - `origin`: origin and request-target derivation
//! - `index`: the origin → path → responses index and instance descriptors

mod content;
pub mod dates;
mod index;
mod origin;
mod types;

#[cfg(test)]
mod tests;

pub use content::{decode_text, gzip, is_gzip_encoded};
pub use dates::{HeaderValue, TimeDelta};
pub use index::{CaptureIndex, InstanceDescriptor, OriginRecord, PathRecord, ResponseRecord};
pub use origin::{default_port, request_target, split_url, Origin};
pub use types::{
    Capture, CaptureEntry, CapturedContent, CapturedHeader, CapturedRequest, CapturedResponse,
};

/// Errors that abort indexing. No partial index is ever produced.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Malformed capture: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to read capture: {0}")]
    Io(#[from] std::io::Error),
    #[error("Entry {entry}: invalid request URL '{url}'")]
    InvalidUrl { entry: usize, url: String },
    #[error("Entry {entry}: invalid startedDateTime '{value}': {reason}")]
    InvalidStartedDateTime {
        entry: usize,
        value: String,
        reason: String,
    },
    #[error("Invalid instance URL '{0}'")]
    InvalidInstance(String),
    #[error("Unsupported content encoding '{0}'")]
    UnsupportedEncoding(String),
    #[error("Invalid {encoding} content: {reason}")]
    Decode { encoding: String, reason: String },
    #[error("Failed to gzip content: {0}")]
    Compression(#[source] std::io::Error),
    #[error("Entry {entry}: {source}")]
    Content {
        entry: usize,
        #[source]
        source: Box<CaptureError>,
    },
}
