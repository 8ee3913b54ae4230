//! Captured body decoding.
//!
//! Captures store bodies as text plus a declared encoding. Decoding turns that
//! back into the bytes the server sent, and re-compresses them when the
//! original response went over the wire gzipped.

use super::types::{CapturedContent, CapturedHeader};
use super::CaptureError;
use base64::Engine;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// Decode captured text into raw bytes per its declared encoding.
///
/// An absent encoding is the 8-bit `latin1`/`binary` default: one byte per character.
pub fn decode_text(text: &str, encoding: Option<&str>) -> Result<Vec<u8>, CaptureError> {
    let encoding = encoding.map(str::to_ascii_lowercase);
    match encoding.as_deref() {
        None | Some("") | Some("latin1") | Some("binary") => {
            Ok(text.chars().map(|c| (c as u32 & 0xFF) as u8).collect())
        }
        Some("ascii") => Ok(text.chars().map(|c| (c as u32 & 0x7F) as u8).collect()),
        Some("utf8") | Some("utf-8") => Ok(text.as_bytes().to_vec()),
        Some("base64") => base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map_err(|e| CaptureError::Decode {
                encoding: "base64".to_string(),
                reason: e.to_string(),
            }),
        Some("hex") => decode_hex(text.trim()),
        Some("utf16le") | Some("utf-16le") | Some("ucs2") | Some("ucs-2") => Ok(text
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect()),
        Some(other) => Err(CaptureError::UnsupportedEncoding(other.to_string())),
    }
}

fn decode_hex(text: &str) -> Result<Vec<u8>, CaptureError> {
    let invalid = |reason: &str| CaptureError::Decode {
        encoding: "hex".to_string(),
        reason: reason.to_string(),
    };

    if text.len() % 2 != 0 {
        return Err(invalid("odd number of digits"));
    }
    text.as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or_else(|| invalid("non-hex digit"))
        })
        .collect()
}

/// Whether any `Content-Encoding` header lists `gzip`
pub fn is_gzip_encoded(headers: &[CapturedHeader]) -> bool {
    headers
        .iter()
        .filter(|h| h.name.eq_ignore_ascii_case("content-encoding"))
        .flat_map(|h| h.value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("gzip"))
}

pub fn gzip(raw: &[u8]) -> Result<Vec<u8>, CaptureError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(raw).map_err(CaptureError::Compression)?;
    encoder.finish().map_err(CaptureError::Compression)
}

/// Build the wire-ready body buffer for a captured response.
///
/// Empty or missing text yields an empty buffer and is never compressed.
pub fn wire_body(
    content: &CapturedContent,
    headers: &[CapturedHeader],
) -> Result<Bytes, CaptureError> {
    let Some(text) = content.text.as_deref().filter(|t| !t.is_empty()) else {
        return Ok(Bytes::new());
    };

    let raw = decode_text(text, content.encoding.as_deref())?;
    if raw.is_empty() {
        return Ok(Bytes::new());
    }

    if content.compression || is_gzip_encoded(headers) {
        Ok(Bytes::from(gzip(&raw)?))
    } else {
        Ok(Bytes::from(raw))
    }
}
