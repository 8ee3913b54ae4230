//! Admin REST API for the replay server.
//!
//! Runs on its own listener (default `127.0.0.1:2525`) and provides:
//! - `POST /reset` to rewind every replay cursor
//! - health, route and instance introspection
//! - Prometheus metrics

mod handlers;
mod router;
mod server;
pub(crate) mod types;

pub use router::route_request;
pub use server::AdminApiServer;
