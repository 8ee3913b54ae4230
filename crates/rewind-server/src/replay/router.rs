//! Request routing for replay listeners.
//!
//! Every inbound request is mapped to (origin, request target), the next
//! recorded response for that pair is consumed, and the materialized response
//! is written back. A miss answers 500 with a diagnostic body.

use super::materialize::{materialize, MaterializedResponse};
use super::state::ReplayState;
use crate::admin_api::types::build_response;
use crate::capture::{request_target, Origin};
use crate::config::Protocol;
use crate::metrics;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::{HeaderName, HeaderValue, HOST};
use hyper::http::request::Parts;
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Handle a request on a replay listener speaking `protocol`
pub async fn handle_replay_request<B>(
    req: Request<B>,
    state: Arc<ReplayState>,
    protocol: Protocol,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let path = request_target(&parts.uri);

    let Some(origin) = request_origin(&parts, protocol) else {
        warn!("{} {} carries no usable Host authority", parts.method, path);
        return Ok(build_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Request carries no usable Host header; cannot determine the recorded origin",
        ));
    };

    // The cursor is consumed before the body is drained or bytes are written
    let outcome = state
        .consume_next(&origin, &path)
        .map(|record| materialize(record, chrono::Utc::now()));

    if let Err(e) = body.collect().await {
        debug!("Failed to drain request body for {}{}: {}", origin, path, e);
    }

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    match outcome {
        Ok(materialized) => {
            let status = materialized.status;
            let bytes = materialized.body.len();
            let response = into_hyper_response(materialized);
            metrics::record_replay(status, elapsed_ms);
            info!(
                method = %parts.method,
                origin = %origin,
                path = %path,
                status,
                bytes,
                latency_ms = elapsed_ms,
                "replayed"
            );
            Ok(response)
        }
        Err(miss) => {
            metrics::record_miss(miss.reason(), elapsed_ms);
            warn!("{} {}{}: {}", parts.method, origin, path, miss);
            Ok(build_response(StatusCode::INTERNAL_SERVER_ERROR, miss.to_string()))
        }
    }
}

/// Origin of an inbound request: listener scheme plus the URI authority
/// (HTTP/2, absolute-form) or the `Host` header (HTTP/1.1 origin-form).
fn request_origin(parts: &Parts, protocol: Protocol) -> Option<Origin> {
    let authority = match parts.uri.authority() {
        Some(authority) => authority.as_str().to_string(),
        None => parts.headers.get(HOST)?.to_str().ok()?.to_string(),
    };
    Origin::from_authority(protocol.as_str(), &authority)
}

/// Write a materialized response onto a hyper response, header for header
fn into_hyper_response(materialized: MaterializedResponse) -> Response<Full<Bytes>> {
    let Ok(status) = StatusCode::from_u16(materialized.status) else {
        warn!(
            "Recorded status {} is not a valid HTTP status",
            materialized.status
        );
        return build_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Recorded status {} cannot be replayed", materialized.status),
        );
    };

    let mut response = Response::new(Full::new(materialized.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &materialized.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => debug!("Skipping header that cannot be sent: {}", name),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureIndex;

    const CAPTURE: &str = r#"{"entries": [
        {"startedDateTime": "2019-01-01T12:00:00.000Z",
         "request": {"method": "GET", "url": "https://a.test/page?x=1"},
         "response": {"status": 201, "headers": [
            {"name": "Content-Type", "value": "text/plain"},
            {"name": "Date", "value": "Tue, 01 Jan 2019 12:00:00 GMT"},
            {"name": "Set-Cookie", "value": "a=1"},
            {"name": "Set-Cookie", "value": "b=2"},
            {"name": "Content-Length", "value": "1000"}
         ], "content": {"size": 5, "text": "first"}}},
        {"startedDateTime": "2019-01-01T12:00:01.000Z",
         "request": {"method": "GET", "url": "https://a.test/page?x=1"},
         "response": {"status": 200, "headers": [], "content": {"size": 6, "text": "second"}}}
    ]}"#;

    fn state() -> Arc<ReplayState> {
        Arc::new(ReplayState::new(CaptureIndex::from_json(CAPTURE).unwrap()))
    }

    fn request(host: &str, target: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .uri(target)
            .header(HOST, host)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn serve(
        state: &Arc<ReplayState>,
        host: &str,
        target: &str,
        protocol: Protocol,
    ) -> Response<Full<Bytes>> {
        handle_replay_request(request(host, target), Arc::clone(state), protocol)
            .await
            .unwrap()
    }

    async fn body_of(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_serves_in_recorded_order_then_exhausts() {
        let state = state();

        let first = serve(&state, "a.test", "/page?x=1", Protocol::Https).await;
        assert_eq!(first.status(), StatusCode::CREATED);
        assert_eq!(first.headers()["content-length"], "5");
        assert_eq!(first.headers()["content-type"], "text/plain");
        let cookies: Vec<_> = first.headers().get_all("set-cookie").iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert_eq!(body_of(first).await, Bytes::from_static(b"first"));

        let second = serve(&state, "a.test:443", "/page?x=1", Protocol::Https).await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(body_of(second).await, Bytes::from_static(b"second"));

        let third = serve(&state, "a.test", "/page?x=1", Protocol::Https).await;
        assert_eq!(third.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(third).await;
        assert!(String::from_utf8_lossy(&body).contains("exhausted"));
    }

    #[tokio::test]
    async fn test_unknown_origin_and_path_are_diagnosed() {
        let state = state();

        let wrong_scheme = serve(&state, "a.test", "/page?x=1", Protocol::Http).await;
        assert_eq!(wrong_scheme.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = String::from_utf8_lossy(&body_of(wrong_scheme).await).to_string();
        assert!(body.contains("origin http://a.test:80"), "{body}");

        let wrong_path = serve(&state, "a.test", "/page", Protocol::Https).await;
        let body = String::from_utf8_lossy(&body_of(wrong_path).await).to_string();
        assert!(body.contains("path /page on origin https://a.test:443"), "{body}");

        // Misses never advance the cursor
        let hit = serve(&state, "a.test", "/page?x=1", Protocol::Https).await;
        assert_eq!(body_of(hit).await, Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn test_missing_host_is_server_error() {
        let req = Request::builder()
            .uri("/page?x=1")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = handle_replay_request(req, state(), Protocol::Https).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_absolute_form_uses_uri_authority() {
        let req = Request::builder()
            .uri("https://a.test/page?x=1")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = handle_replay_request(req, state(), Protocol::Https).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_date_header_is_reanchored() {
        let response = serve(&state(), "a.test", "/page?x=1", Protocol::Https).await;
        let date = response.headers()["date"].to_str().unwrap();
        assert_ne!(date, "Tue, 01 Jan 2019 12:00:00 GMT");
        assert!(crate::capture::dates::parse_http_date(date).is_some());
    }
}
