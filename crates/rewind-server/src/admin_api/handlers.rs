//! Admin endpoint handlers.

use crate::admin_api::types::{
    build_response_with_headers, empty_response, json_response, ListInstancesResponse,
    ListRoutesResponse, RouteSummary,
};
use crate::metrics;
use crate::replay::ReplayState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;

/// POST /reset - rewind every replay cursor
pub fn handle_reset(state: &ReplayState) -> Response<Full<Bytes>> {
    state.reset_all();
    metrics::record_reset();
    empty_response(StatusCode::NO_CONTENT)
}

/// GET /health
pub fn handle_health() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &json!({"status": "ok"}))
}

/// GET /routes - recorded and served counts per (origin, path)
pub fn handle_routes(state: &ReplayState) -> Response<Full<Bytes>> {
    let index = state.index();
    let mut routes: Vec<RouteSummary> = index
        .origins()
        .flat_map(|(origin, record)| {
            record.paths().map(move |(path, path_record)| RouteSummary {
                origin: origin.to_string(),
                path: path.clone(),
                recorded: path_record.responses().len(),
                served: path_record.served(),
            })
        })
        .collect();
    routes.sort_by(|a, b| (&a.origin, &a.path).cmp(&(&b.origin, &b.path)));

    json_response(
        StatusCode::OK,
        &ListRoutesResponse {
            entry_count: index.entry_count(),
            routes,
        },
    )
}

/// GET /instances - the listeners derived from the capture
pub fn handle_instances(state: &ReplayState) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &ListInstancesResponse {
            instances: state.index().instances(),
        },
    )
}

/// GET /metrics - Prometheus metrics
pub fn handle_metrics() -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        metrics::collect_metrics(),
    )
}
