//! Listener orchestration: one replay listener per recorded instance.
//!
//! Startup runs in two phases. Every TLS identity is provisioned first, then
//! every socket is bound, and only then do the accept loops start, so no
//! listener takes traffic while another can still fail.

mod connection;
mod network;
mod tls;

pub use connection::{serve_connection, Framing};
pub use network::create_reusable_listener;
pub use tls::create_tls_acceptor;

use crate::ca::{CaError, CertificateAuthority};
use crate::capture::InstanceDescriptor;
use crate::config::Protocol;
use crate::replay::ReplayState;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Instance {instance}: unsupported transport scheme '{scheme}'")]
    UnsupportedScheme { instance: String, scheme: String },

    #[error("Instance {instance}: certificate provisioning failed: {source}")]
    Certificate {
        instance: String,
        #[source]
        source: CaError,
    },

    #[error("Instance {instance}: invalid TLS identity: {reason}")]
    Tls { instance: String, reason: String },

    #[error("Instance {instance}: cannot resolve bind address '{address}'")]
    Address { instance: String, address: String },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// A listener that is bound and accepting
#[derive(Debug, Clone)]
pub struct BoundListener {
    pub instance: InstanceDescriptor,
    pub protocol: Protocol,
    pub framing: Framing,
    pub local_addr: SocketAddr,
}

/// Everything needed to bind one instance
struct PlannedListener {
    instance: InstanceDescriptor,
    protocol: Protocol,
    framing: Framing,
    addr: SocketAddr,
    acceptor: Option<TlsAcceptor>,
}

/// Binds and runs the replay listeners for every instance in the capture
pub struct ReplayListeners {
    state: Arc<ReplayState>,
    ca: Arc<dyn CertificateAuthority>,
    /// Overrides the recorded server address of every instance
    bind_address: Option<IpAddr>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ReplayListeners {
    pub fn new(
        state: Arc<ReplayState>,
        ca: Arc<dyn CertificateAuthority>,
        bind_address: Option<IpAddr>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            state,
            ca,
            bind_address,
            shutdown_tx,
        }
    }

    /// Provision, bind and start every instance listener.
    ///
    /// Any failure aborts before a single listener starts accepting.
    pub async fn start(&self) -> Result<Vec<BoundListener>, ListenerError> {
        let mut planned = Vec::new();
        for instance in self.state.index().instances() {
            planned.push(self.plan(instance).await?);
        }

        let mut sockets = Vec::with_capacity(planned.len());
        for plan in planned {
            let listener = create_reusable_listener(plan.addr).map_err(|source| {
                ListenerError::Bind {
                    addr: plan.addr,
                    source,
                }
            })?;
            sockets.push((plan, listener));
        }

        let mut bound = Vec::with_capacity(sockets.len());
        for (plan, listener) in sockets {
            let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
                addr: plan.addr,
                source,
            })?;
            info!(
                "Replaying {}://{} on {} ({:?}, hostnames: {:?})",
                plan.protocol.as_str(),
                plan.instance.address,
                local_addr,
                plan.framing,
                plan.instance.hostnames
            );

            bound.push(BoundListener {
                instance: plan.instance.clone(),
                protocol: plan.protocol,
                framing: plan.framing,
                local_addr,
            });
            self.spawn_accept_loop(plan, listener, local_addr);
        }

        Ok(bound)
    }

    /// Stop accepting on every listener
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    async fn plan(&self, instance: &InstanceDescriptor) -> Result<PlannedListener, ListenerError> {
        let label = format!("{}://{}:{}", instance.scheme, instance.address, instance.port);
        let protocol =
            Protocol::from_scheme(&instance.scheme).map_err(|_| ListenerError::UnsupportedScheme {
                instance: label.clone(),
                scheme: instance.scheme.clone(),
            })?;
        let framing = Framing::for_listener(protocol, instance.http_version);
        let addr = self.bind_addr(instance, &label).await?;

        let acceptor = if protocol.is_tls() {
            let hostnames: Vec<String> = instance.hostnames.iter().cloned().collect();
            let identity = self
                .ca
                .request_identity(&hostnames, &instance.key_id())
                .await
                .map_err(|source| ListenerError::Certificate {
                    instance: label.clone(),
                    source,
                })?;
            let acceptor = create_tls_acceptor(&identity, instance.http_version.alpn_protocols())
                .map_err(|e| ListenerError::Tls {
                    instance: label.clone(),
                    reason: e.to_string(),
                })?;
            Some(acceptor)
        } else {
            None
        };

        Ok(PlannedListener {
            instance: instance.clone(),
            protocol,
            framing,
            addr,
            acceptor,
        })
    }

    /// The bind override, else the recorded address, resolving hostnames
    async fn bind_addr(
        &self,
        instance: &InstanceDescriptor,
        label: &str,
    ) -> Result<SocketAddr, ListenerError> {
        if let Some(ip) = self.bind_address {
            return Ok(SocketAddr::new(ip, instance.port));
        }
        if let Ok(ip) = instance.address.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, instance.port));
        }
        let unresolvable = || ListenerError::Address {
            instance: label.to_string(),
            address: instance.address.clone(),
        };
        tokio::net::lookup_host((instance.address.as_str(), instance.port))
            .await
            .map_err(|_| unresolvable())?
            .next()
            .ok_or_else(unresolvable)
    }

    fn spawn_accept_loop(&self, plan: PlannedListener, listener: TcpListener, local_addr: SocketAddr) {
        let state = Arc::clone(&self.state);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let PlannedListener {
            protocol,
            framing,
            acceptor,
            ..
        } = plan;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                let state = Arc::clone(&state);
                                let acceptor = acceptor.clone();
                                tokio::spawn(async move {
                                    match acceptor {
                                        Some(acceptor) => {
                                            let stream = match acceptor.accept(stream).await {
                                                Ok(stream) => stream,
                                                Err(e) => {
                                                    error!(
                                                        "TLS handshake with {} on {} failed: {}",
                                                        peer, local_addr, e
                                                    );
                                                    return;
                                                }
                                            };
                                            let framing = framing.after_alpn(stream.get_ref().1.alpn_protocol());
                                            serve_connection(stream, framing, protocol, state, peer).await;
                                        }
                                        None => {
                                            serve_connection(stream, framing, protocol, state, peer).await;
                                        }
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Accept error on {}: {}", local_addr, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Listener on {} shutting down", local_addr);
                        break;
                    }
                }
            }
        });
    }
}
