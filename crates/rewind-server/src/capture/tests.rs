use super::*;
use crate::config::HttpVersion;
use flate2::read::GzDecoder;
use std::io::Read;

fn entry(url: &str, server_ip: Option<&str>, version: &str, text: &str) -> String {
    let server_ip = server_ip
        .map(|ip| format!(r#""serverIPAddress": "{ip}","#))
        .unwrap_or_default();
    format!(
        r#"{{"startedDateTime": "2019-06-01T10:00:00.000Z", {server_ip}
            "request": {{"method": "GET", "url": "{url}"}},
            "response": {{"status": 200, "httpVersion": "{version}", "headers": [],
                         "content": {{"size": {size}, "text": "{text}"}}}}}}"#,
        size = text.len()
    )
}

fn capture(entries: &[String]) -> String {
    format!(r#"{{"entries": [{}]}}"#, entries.join(","))
}

fn drain(index: &CaptureIndex, url: &str) -> Vec<String> {
    let (origin, path) = split_url(url).unwrap();
    std::iter::from_fn(|| index.consume_next(&origin, &path).ok())
        .map(|record| String::from_utf8_lossy(&record.body).to_string())
        .collect()
}

#[test]
fn test_responses_keep_capture_order_per_path() {
    let index = CaptureIndex::from_json(&capture(&[
        entry("http://a.test/x", None, "HTTP/1.1", "x1"),
        entry("http://a.test/y", None, "HTTP/1.1", "y1"),
        entry("http://a.test/x", None, "HTTP/1.1", "x2"),
        entry("http://a.test/x?q=1", None, "HTTP/1.1", "xq"),
        entry("http://a.test:80/x", None, "HTTP/1.1", "x3"),
    ]))
    .unwrap();

    assert_eq!(index.entry_count(), 5);
    assert_eq!(drain(&index, "http://a.test/x"), vec!["x1", "x2", "x3"]);
    assert_eq!(drain(&index, "http://a.test/y"), vec!["y1"]);
    assert_eq!(drain(&index, "http://a.test/x?q=1"), vec!["xq"]);

    index.reset_cursors();
    assert_eq!(drain(&index, "http://a.test/x"), vec!["x1", "x2", "x3"]);
}

#[test]
fn test_instances_group_hostnames_by_server() {
    let index = CaptureIndex::from_json(&capture(&[
        entry("https://a.test/", Some("10.0.0.1"), "unknown", "1"),
        entry("https://b.test/", Some("10.0.0.1"), "HTTP/2.0", "2"),
        entry("https://c.test/", Some("10.0.0.1"), "HTTP/1.1", "3"),
        entry("http://a.test/", Some("10.0.0.1"), "HTTP/1.1", "4"),
        entry("https://d.test:8443/", Some("[::1]"), "h3", "5"),
        entry("http://e.test:8080/", None, "HTTP/1.0", "6"),
    ]))
    .unwrap();

    let instances = index.instances();
    assert_eq!(instances.len(), 4);

    let tls = &instances[0];
    assert_eq!((tls.scheme.as_str(), tls.address.as_str(), tls.port), ("https", "10.0.0.1", 443));
    assert_eq!(
        tls.hostnames.iter().cloned().collect::<Vec<_>>(),
        vec!["a.test", "b.test", "c.test"]
    );
    // First known version wins over later ones
    assert_eq!(tls.http_version, HttpVersion::Http2);

    let plain = &instances[1];
    assert_eq!((plain.scheme.as_str(), plain.port), ("http", 80));
    assert_eq!(plain.http_version, HttpVersion::Http1);

    let v6 = &instances[2];
    assert_eq!(v6.address, "::1");
    assert_eq!(v6.http_version, HttpVersion::Negotiated);

    // No serverIPAddress: the URL host stands in
    let fallback = &instances[3];
    assert_eq!(fallback.address, "e.test");
    assert_eq!(fallback.port, 8080);
}

#[test]
fn test_key_id_is_filesystem_safe() {
    let index = CaptureIndex::from_json(&capture(&[entry(
        "https://d.test:8443/",
        Some("[fe80::1]"),
        "h2",
        "",
    )]))
    .unwrap();
    assert_eq!(index.instances()[0].key_id(), "https_fe80__1_8443");
}

#[test]
fn test_malformed_entry_aborts_indexing() {
    let bad_url = capture(&[
        entry("http://a.test/x", None, "HTTP/1.1", "ok"),
        entry("/relative", None, "HTTP/1.1", "bad"),
    ]);
    assert!(matches!(
        CaptureIndex::from_json(&bad_url),
        Err(CaptureError::InvalidUrl { entry: 1, .. })
    ));

    let bad_time = entry("http://a.test/x", None, "HTTP/1.1", "ok")
        .replace("2019-06-01T10:00:00.000Z", "yesterday");
    assert!(matches!(
        CaptureIndex::from_json(&capture(&[bad_time])),
        Err(CaptureError::InvalidStartedDateTime { entry: 0, .. })
    ));

    let bad_encoding = r#"{"entries": [{"startedDateTime": "2019-06-01T10:00:00Z",
        "request": {"url": "http://a.test/x"},
        "response": {"status": 200, "headers": [],
                     "content": {"size": 2, "text": "zz", "encoding": "rot13"}}}]}"#;
    assert!(matches!(
        CaptureIndex::from_json(bad_encoding),
        Err(CaptureError::Content { entry: 0, .. })
    ));

    assert!(matches!(
        CaptureIndex::from_json("{\"entries\": [}"),
        Err(CaptureError::Json(_))
    ));
}

#[test]
fn test_gzip_body_decompresses_to_original() {
    let raw = r#"{"log": {"entries": [{"startedDateTime": "2019-06-01T10:00:00Z",
        "request": {"url": "https://a.test/data.json"},
        "response": {"status": 200, "headers": [
            {"name": "Content-Encoding", "value": "gzip"},
            {"name": "Content-Type", "value": "application/json"}],
            "content": {"size": 13, "text": "eyJvayI6dHJ1ZX0=", "encoding": "base64"}}}]}}"#;
    let index = CaptureIndex::from_json(raw).unwrap();
    let (origin, path) = split_url("https://a.test/data.json").unwrap();
    let record = index.consume_next(&origin, &path).unwrap();

    let mut decoded = String::new();
    GzDecoder::new(&record.body[..])
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, r#"{"ok":true}"#);
}

#[test]
fn test_date_headers_are_normalized_and_others_kept() {
    let raw = r#"{"entries": [{"startedDateTime": "2019-06-01T10:00:00Z",
        "request": {"url": "http://a.test/"},
        "response": {"status": 304, "headers": [
            {"name": "Date", "value": "Sat, 01 Jun 2019 10:00:00 GMT"},
            {"name": "Last-Modified", "value": "Saturday, 01-Jun-19 09:00:00 GMT"},
            {"name": "ETag", "value": "\"abc\""}],
            "content": {"size": 0}}}]}"#;
    let index = CaptureIndex::from_json(raw).unwrap();
    let (origin, path) = split_url("http://a.test/").unwrap();
    let record = index.consume_next(&origin, &path).unwrap();

    assert_eq!(record.status, 304);
    assert!(record.body.is_empty());
    assert_eq!(record.headers[0].1, HeaderValue::Dated(TimeDelta::from_millis(0)));
    assert_eq!(
        record.headers[1].1,
        HeaderValue::Dated(TimeDelta::from_millis(-3_600_000))
    );
    assert_eq!(record.headers[2].1, HeaderValue::Literal("\"abc\"".to_string()));
}

#[test]
fn test_declared_instances_resolve_against_derived() {
    let entries = [
        entry("https://a.test/", Some("10.0.0.1"), "HTTP/2.0", "1"),
        entry("https://b.test/", Some("10.0.0.2"), "HTTP/1.1", "2"),
    ];
    let raw = format!(
        r#"{{"entries": [{}], "instances": [
            "https://10.0.0.1:443",
            "https://127.0.0.1",
            "http://localhost:9000"
        ]}}"#,
        entries.join(",")
    );
    let index = CaptureIndex::from_json(&raw).unwrap();
    let instances = index.instances();
    assert_eq!(instances.len(), 3);

    // Exact match keeps the derived descriptor
    assert_eq!(instances[0].address, "10.0.0.1");
    assert_eq!(
        instances[0].hostnames.iter().cloned().collect::<Vec<_>>(),
        vec!["a.test"]
    );
    assert_eq!(instances[0].http_version, HttpVersion::Http2);

    // Same scheme and port folds every recorded server together
    assert_eq!(instances[1].address, "127.0.0.1");
    assert_eq!(
        instances[1].hostnames.iter().cloned().collect::<Vec<_>>(),
        vec!["a.test", "b.test"]
    );
    assert_eq!(instances[1].http_version, HttpVersion::Http2);

    // Nothing recorded there: the URL host is the only hostname
    assert_eq!(
        instances[2].hostnames.iter().cloned().collect::<Vec<_>>(),
        vec!["localhost"]
    );
    assert_eq!(instances[2].http_version, HttpVersion::Negotiated);
}

#[test]
fn test_invalid_declared_instance_is_rejected() {
    let raw = format!(
        r#"{{"entries": [{}], "instances": ["not a url"]}}"#,
        entry("http://a.test/", None, "HTTP/1.1", "")
    );
    assert!(matches!(
        CaptureIndex::from_json(&raw),
        Err(CaptureError::InvalidInstance(_))
    ));
}
