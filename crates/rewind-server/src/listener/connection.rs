//! Per-connection serving with reset-triggered graceful close.

use crate::config::{HttpVersion, Protocol};
use crate::replay::{handle_replay_request, ReplayState};
use hyper::server::conn::{http1, http2};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulConnection;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tracing::debug;

/// Application-layer framing a connection is served with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Http1,
    Http2,
    /// Detect HTTP/1.1 or HTTP/2 from the connection preface
    Auto,
}

impl Framing {
    /// Framing for a listener recorded as `version` over `protocol`.
    ///
    /// Plaintext listeners always speak HTTP/1.1.
    pub fn for_listener(protocol: Protocol, version: HttpVersion) -> Self {
        if !protocol.is_tls() {
            return Framing::Http1;
        }
        match version {
            HttpVersion::Http1 => Framing::Http1,
            HttpVersion::Http2 => Framing::Http2,
            HttpVersion::Negotiated => Framing::Auto,
        }
    }

    /// Narrow the listener framing to what ALPN settled on, if anything
    pub fn after_alpn(self, alpn: Option<&[u8]>) -> Self {
        match alpn {
            Some(b"h2") => Framing::Http2,
            Some(b"http/1.1") => Framing::Http1,
            _ => self,
        }
    }
}

/// Serve one accepted connection until the peer closes it or a reset
/// asks it to close after the in-flight response.
pub async fn serve_connection<I>(
    io: I,
    framing: Framing,
    protocol: Protocol,
    state: Arc<ReplayState>,
    peer: SocketAddr,
) where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    // Subscribe before the first request so no reset is missed
    let mut reset_rx = state.subscribe_resets();
    let io = TokioIo::new(io);
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        async move { handle_replay_request(req, state, protocol).await }
    });

    let result = match framing {
        // Replayed headers are exactly the recorded ones: no automatic Date
        Framing::Http1 => {
            let conn = http1::Builder::new()
                .auto_date_header(false)
                .serve_connection(io, service);
            drive(conn, &mut reset_rx, peer).await
        }
        Framing::Http2 => {
            let conn = http2::Builder::new(TokioExecutor::new())
                .auto_date_header(false)
                .serve_connection(io, service);
            drive(conn, &mut reset_rx, peer).await
        }
        Framing::Auto => {
            let mut builder = auto::Builder::new(TokioExecutor::new());
            builder.http1().auto_date_header(false);
            builder.http2().auto_date_header(false);
            let conn = builder.serve_connection(io, service);
            drive(conn, &mut reset_rx, peer).await
        }
    };

    if let Err(e) = result {
        debug!("Connection error from {}: {}", peer, e);
    }
}

/// Drive `conn` to completion, switching to graceful shutdown on reset
async fn drive<C>(
    conn: C,
    reset_rx: &mut broadcast::Receiver<()>,
    peer: SocketAddr,
) -> Result<(), String>
where
    C: GracefulConnection,
    C::Error: Display,
{
    tokio::pin!(conn);
    tokio::select! {
        result = conn.as_mut() => return result.map_err(|e| e.to_string()),
        _ = reset_rx.recv() => {
            debug!("Reset: closing connection from {} after in-flight response", peer);
        }
    }
    conn.as_mut().graceful_shutdown();
    conn.await.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_is_always_http1() {
        for version in [HttpVersion::Http1, HttpVersion::Http2, HttpVersion::Negotiated] {
            assert_eq!(Framing::for_listener(Protocol::Http, version), Framing::Http1);
        }
    }

    #[test]
    fn test_tls_framing_follows_recorded_version() {
        assert_eq!(
            Framing::for_listener(Protocol::Https, HttpVersion::Http1),
            Framing::Http1
        );
        assert_eq!(
            Framing::for_listener(Protocol::Https, HttpVersion::Http2),
            Framing::Http2
        );
        assert_eq!(
            Framing::for_listener(Protocol::Https, HttpVersion::Negotiated),
            Framing::Auto
        );
    }

    #[test]
    fn test_alpn_narrows_auto() {
        assert_eq!(Framing::Auto.after_alpn(Some(b"h2")), Framing::Http2);
        assert_eq!(Framing::Auto.after_alpn(Some(b"http/1.1")), Framing::Http1);
        assert_eq!(Framing::Auto.after_alpn(None), Framing::Auto);
        assert_eq!(Framing::Http2.after_alpn(None), Framing::Http2);
    }
}
