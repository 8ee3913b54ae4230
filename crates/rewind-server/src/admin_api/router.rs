//! Route dispatch logic for the Admin API.

use crate::admin_api::handlers;
use crate::admin_api::types::not_found;
use crate::replay::ReplayState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::debug;

/// Main request router
pub async fn route_request<B>(
    req: Request<B>,
    state: Arc<ReplayState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Admin API: {} {}", method, path);

    let response = match (&method, path.as_str()) {
        (&Method::POST, "/reset") => handlers::handle_reset(&state),
        (&Method::GET, "/health") => handlers::handle_health(),
        (&Method::GET, "/routes") => handlers::handle_routes(&state),
        (&Method::GET, "/instances") => handlers::handle_instances(&state),
        (&Method::GET, "/metrics") => handlers::handle_metrics(),
        _ => not_found(),
    };
    Ok(response)
}
