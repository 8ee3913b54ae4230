//! Admin API server.

use crate::admin_api::router::route_request;
use crate::replay::ReplayState;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Admin API server: reset, health and introspection endpoints
pub struct AdminApiServer {
    state: Arc<ReplayState>,
}

impl AdminApiServer {
    /// Create a new admin API server
    pub fn new(state: Arc<ReplayState>) -> Self {
        Self { state }
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!(
            "Rewind Admin API listening on http://{}",
            listener.local_addr()?
        );

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Admin API accept error: {}", e);
                    continue;
                }
            };
            debug!("Admin API connection from {}", peer);
            let io = TokioIo::new(stream);
            let state = Arc::clone(&self.state);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let state = Arc::clone(&state);
                    async move { route_request(req, state).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Admin API connection error: {}", e);
                }
            });
        }
    }
}
