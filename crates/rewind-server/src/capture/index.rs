//! The replay index: origin → path → ordered recorded responses.

use super::content::wire_body;
use super::dates::{parse_recording_time, HeaderValue};
use super::origin::{default_port, split_url, Origin};
use super::types::{Capture, CaptureEntry};
use super::CaptureError;
use crate::config::HttpVersion;
use crate::replay::{ConsumeError, Cursor};
use bytes::Bytes;
use hyper::Uri;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use tracing::{debug, info};

/// A recorded response, ready to be materialized
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub status: u16,
    /// Header pairs in capture order
    pub headers: Vec<(String, HeaderValue)>,
    /// Wire-ready body; its length is the served `Content-Length`
    pub body: Bytes,
}

/// Recorded responses for one request target, plus its replay cursor
#[derive(Debug, Default)]
pub struct PathRecord {
    responses: Vec<ResponseRecord>,
    cursor: Cursor,
}

impl PathRecord {
    /// Consume the next recorded response.
    ///
    /// Returns `None` once every response has been served.
    pub fn consume_next(&self) -> Option<&ResponseRecord> {
        self.cursor
            .advance(self.responses.len())
            .and_then(|idx| self.responses.get(idx))
    }

    pub fn responses(&self) -> &[ResponseRecord] {
        &self.responses
    }

    /// Number of responses already served
    pub fn served(&self) -> usize {
        self.cursor.position()
    }

    pub fn reset(&self) {
        self.cursor.reset();
    }
}

/// All request targets recorded for one origin
#[derive(Debug, Default)]
pub struct OriginRecord {
    paths: HashMap<String, PathRecord>,
}

impl OriginRecord {
    pub fn path(&self, path: &str) -> Option<&PathRecord> {
        self.paths.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = (&String, &PathRecord)> {
        self.paths.iter()
    }
}

/// One listener to bind: a distinct (protocol, address, port) triple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDescriptor {
    #[serde(rename = "protocol")]
    pub scheme: String,
    pub address: String,
    pub port: u16,
    /// Every hostname served from this address and port
    pub hostnames: BTreeSet<String>,
    pub http_version: HttpVersion,
}

impl InstanceDescriptor {
    fn new(scheme: &str, address: &str, port: u16) -> Self {
        Self {
            scheme: scheme.to_string(),
            address: address.to_string(),
            port,
            hostnames: BTreeSet::new(),
            http_version: HttpVersion::Negotiated,
        }
    }

    /// Stable identifier for the TLS identity of this instance
    pub fn key_id(&self) -> String {
        let address: String = self
            .address
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}_{}_{}", self.scheme, address, self.port)
    }

    fn record_version(&mut self, version: HttpVersion) {
        if !self.http_version.is_known() {
            self.http_version = version;
        }
    }

    fn merge(&mut self, other: &InstanceDescriptor) {
        self.hostnames.extend(other.hostnames.iter().cloned());
        self.record_version(other.http_version);
    }
}

type InstanceKey = (String, String, u16);

/// Process-wide replay index built from one capture.
///
/// Everything except the per-path cursors is read-only once built.
#[derive(Debug, Default)]
pub struct CaptureIndex {
    origins: HashMap<Origin, OriginRecord>,
    instances: Vec<InstanceDescriptor>,
    entry_count: usize,
}

impl CaptureIndex {
    /// Parse and index a capture from JSON text
    pub fn from_json(raw: &str) -> Result<Self, CaptureError> {
        let capture: Capture = serde_json::from_str(raw)?;
        Self::from_capture(capture)
    }

    /// Parse and index a capture read to completion from `reader`
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CaptureError> {
        let capture: Capture = serde_json::from_reader(reader)?;
        Self::from_capture(capture)
    }

    /// Index a parsed capture. Any malformed entry aborts the whole build.
    pub fn from_capture(capture: Capture) -> Result<Self, CaptureError> {
        let mut origins: HashMap<Origin, OriginRecord> = HashMap::new();
        let mut derived: Vec<InstanceDescriptor> = Vec::new();
        let mut derived_idx: HashMap<InstanceKey, usize> = HashMap::new();

        for (entry_no, entry) in capture.entries.iter().enumerate() {
            let (origin, path) =
                split_url(&entry.request.url).ok_or_else(|| CaptureError::InvalidUrl {
                    entry: entry_no,
                    url: entry.request.url.clone(),
                })?;

            let record = build_response_record(entry_no, entry)?;

            let key = instance_key(&origin, entry);
            let slot = *derived_idx.entry(key.clone()).or_insert_with(|| {
                derived.push(InstanceDescriptor::new(&key.0, &key.1, key.2));
                derived.len() - 1
            });
            let descriptor = &mut derived[slot];
            descriptor.hostnames.insert(origin.host.clone());
            descriptor.record_version(HttpVersion::from_recorded(&entry.response.http_version));

            debug!(
                "Indexed entry {}: {} {}{} -> {}",
                entry_no, entry.request.method, origin, path, record.status
            );

            origins
                .entry(origin)
                .or_default()
                .paths
                .entry(path)
                .or_default()
                .responses
                .push(record);
        }

        let instances = match capture.instances {
            Some(ref urls) => declared_instances(urls, &derived)?,
            None => derived,
        };

        let index = Self {
            origins,
            instances,
            entry_count: capture.entries.len(),
        };
        info!(
            "Indexed {} entries across {} origins and {} instances",
            index.entry_count,
            index.origins.len(),
            index.instances.len()
        );
        Ok(index)
    }

    pub fn origin(&self, origin: &Origin) -> Option<&OriginRecord> {
        self.origins.get(origin)
    }

    pub fn origins(&self) -> impl Iterator<Item = (&Origin, &OriginRecord)> {
        self.origins.iter()
    }

    /// Listeners to bind
    pub fn instances(&self) -> &[InstanceDescriptor] {
        &self.instances
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Atomically take the next recorded response for (origin, path)
    pub fn consume_next(&self, origin: &Origin, path: &str) -> Result<&ResponseRecord, ConsumeError> {
        let origin_record = self
            .origins
            .get(origin)
            .ok_or_else(|| ConsumeError::UnknownOrigin {
                origin: origin.to_string(),
            })?;
        let path_record = origin_record
            .paths
            .get(path)
            .ok_or_else(|| ConsumeError::UnknownPath {
                origin: origin.to_string(),
                path: path.to_string(),
            })?;
        path_record
            .consume_next()
            .ok_or_else(|| ConsumeError::Exhausted {
                origin: origin.to_string(),
                path: path.to_string(),
                recorded: path_record.responses.len(),
            })
    }

    /// Rewind every cursor to the first recorded response
    pub fn reset_cursors(&self) {
        for record in self.origins.values() {
            for path in record.paths.values() {
                path.reset();
            }
        }
    }
}

fn build_response_record(entry_no: usize, entry: &CaptureEntry) -> Result<ResponseRecord, CaptureError> {
    let recorded_at = parse_recording_time(&entry.started_date_time).map_err(|e| {
        CaptureError::InvalidStartedDateTime {
            entry: entry_no,
            value: entry.started_date_time.clone(),
            reason: e.to_string(),
        }
    })?;

    let headers = entry
        .response
        .headers
        .iter()
        .map(|h| (h.name.clone(), HeaderValue::normalize(&h.value, recorded_at)))
        .collect();

    let body = wire_body(&entry.response.content, &entry.response.headers).map_err(|e| {
        CaptureError::Content {
            entry: entry_no,
            source: Box::new(e),
        }
    })?;

    Ok(ResponseRecord {
        status: entry.response.status,
        headers,
        body,
    })
}

/// (scheme, address, port) of the server that answered `entry`
fn instance_key(origin: &Origin, entry: &CaptureEntry) -> InstanceKey {
    let address = entry
        .server_ip_address
        .as_deref()
        .map(strip_brackets)
        .filter(|addr| !addr.is_empty())
        .unwrap_or_else(|| strip_brackets(&origin.host));
    (origin.scheme.clone(), address.to_string(), origin.port)
}

fn strip_brackets(address: &str) -> &str {
    address.trim().trim_start_matches('[').trim_end_matches(']')
}

/// Resolve explicitly declared listener URLs against the derived descriptors.
///
/// An exact (scheme, address, port) match wins; otherwise every derived
/// instance on the same scheme and port is folded into the declared one, so a
/// single local listener can stand in for several recorded servers.
fn declared_instances(
    urls: &[String],
    derived: &[InstanceDescriptor],
) -> Result<Vec<InstanceDescriptor>, CaptureError> {
    urls.iter()
        .map(|url| {
            let invalid = || CaptureError::InvalidInstance(url.clone());
            let uri: Uri = url.parse().map_err(|_| invalid())?;
            let scheme = uri.scheme_str().ok_or_else(invalid)?.to_ascii_lowercase();
            let address = strip_brackets(uri.host().ok_or_else(invalid)?).to_ascii_lowercase();
            let port = uri
                .port_u16()
                .or_else(|| default_port(&scheme))
                .ok_or_else(invalid)?;

            if let Some(exact) = derived
                .iter()
                .find(|d| d.scheme == scheme && d.address == address && d.port == port)
            {
                return Ok(exact.clone());
            }

            let mut descriptor = InstanceDescriptor::new(&scheme, &address, port);
            for candidate in derived
                .iter()
                .filter(|d| d.scheme == scheme && d.port == port)
            {
                descriptor.merge(candidate);
            }
            if descriptor.hostnames.is_empty() {
                descriptor.hostnames.insert(address.clone());
            }
            Ok(descriptor)
        })
        .collect()
}
