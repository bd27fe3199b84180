//! WebTransport server
//!
//! Each session carries one bidirectional stream of length-prefixed JSON
//! messages. The transport decodes inbound frames and pushes them onto the
//! simulation queue; outbound frames arrive over the per-connection channel
//! registered with the hub.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, info, warn};
use wtransport::endpoint::IncomingSession;
use wtransport::{Endpoint, RecvStream};

use crate::config::ServerConfig;
use crate::lobby::identity::ConnectionId;
use crate::metrics::Metrics;
use crate::net::connection::outbound_channel;
use crate::net::framing::{read_message, write_message, FramingError};
use crate::net::gateway::Inbound;
use crate::net::protocol::{decode_client, Incoming};
use crate::net::tls::TlsConfig;

pub struct WebTransportServer {
    config: ServerConfig,
    tls_config: TlsConfig,
    inbound: Sender<Inbound>,
    metrics: Arc<Metrics>,
    next_connection: AtomicU64,
}

impl WebTransportServer {
    pub async fn new(
        config: ServerConfig,
        inbound: Sender<Inbound>,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        let tls_config = TlsConfig::load(&config).await?;
        Ok(Self {
            config,
            tls_config,
            inbound,
            metrics,
            next_connection: AtomicU64::new(1),
        })
    }

    /// Certificate hash for client pinning
    pub fn cert_hash(&self) -> &str {
        &self.tls_config.cert_hash
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.port)
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let builder = wtransport::ServerConfig::builder();
        // Unspecified address binds dual-stack (IPv4 + IPv6)
        let builder = if self.config.bind_address.is_unspecified() {
            builder.with_bind_default(self.config.port)
        } else {
            builder.with_bind_address(self.bind_addr())
        };
        let server_config = builder.with_identity(self.tls_config.identity).build();

        let server = Endpoint::server(server_config)?;
        info!("WebTransport server listening on port {}", self.config.port);

        loop {
            let incoming = server.accept().await;
            let connection = self.next_connection.fetch_add(1, Ordering::Relaxed);
            let inbound = self.inbound.clone();
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(incoming, connection, inbound, metrics).await {
                    warn!("Connection {} error: {}", connection, e);
                }
            });
        }
    }
}

async fn handle_connection(
    incoming: IncomingSession,
    connection: ConnectionId,
    inbound: Sender<Inbound>,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let request = incoming.await?;
    debug!(
        "Session request from {:?}, path {}, connection {}",
        request.authority(),
        request.path(),
        connection
    );

    let session = request.accept().await?;
    let (mut send, mut recv) = session.accept_bi().await?;

    let (sender, mut outbound) = outbound_channel();
    enqueue_lifecycle(&inbound, Inbound::Connected { connection, sender }).await;

    // The hub drops the sender on unregister, which ends this task
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = write_message(&mut send, &frame).await {
                debug!("Write to connection {} failed: {}", connection, e);
                break;
            }
        }
    });

    let result = read_loop(connection, &mut recv, &inbound, &metrics).await;

    writer.abort();
    enqueue_lifecycle(&inbound, Inbound::Disconnected { connection }).await;
    result
}

async fn read_loop(
    connection: ConnectionId,
    recv: &mut RecvStream,
    inbound: &Sender<Inbound>,
    metrics: &Metrics,
) -> anyhow::Result<()> {
    loop {
        let payload = match read_message(recv).await {
            Ok(payload) => payload,
            Err(FramingError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let event = match decode_client(&payload) {
            Ok(Incoming::Message(message)) => Inbound::Message {
                connection,
                message,
                bytes: payload.len(),
            },
            Ok(Incoming::Unknown(kind)) => Inbound::Unknown { connection, kind },
            Err(e) => Inbound::Malformed {
                connection,
                reason: e.to_string(),
            },
        };

        match inbound.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics.invalid_requests.fetch_add(1, Ordering::Relaxed);
                warn!("Inbound queue full, dropped message from connection {}", connection);
            }
            Err(TrySendError::Disconnected(_)) => return Ok(()),
        }
    }
}

/// Lifecycle events must not be lost, so they wait for queue space
async fn enqueue_lifecycle(inbound: &Sender<Inbound>, event: Inbound) {
    let inbound = inbound.clone();
    match tokio::task::spawn_blocking(move || inbound.send(event)).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => debug!("Simulation loop is gone"),
        Err(e) => warn!("Lifecycle enqueue failed: {}", e),
    }
}
