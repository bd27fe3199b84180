use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use salvage_arena_server::config::ServerConfig;
use salvage_arena_server::metrics::{self, Metrics};
use salvage_arena_server::net::gateway::ProtocolGateway;
use salvage_arena_server::net::server_loop::{inbound_queue, start_simulation_loop};
use salvage_arena_server::net::transport::WebTransportServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Salvage Arena Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: {}:{}, max_rooms={}, capacity={}, {} Hz",
        config.bind_address, config.port, config.max_rooms, config.room_capacity, config.tick_rate
    );

    let metrics = Arc::new(Metrics::new());

    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let (inbound_tx, inbound_rx) = inbound_queue();
    let (stop, shutdown) = watch::channel(false);
    let gateway = ProtocolGateway::new(&config, metrics.clone());
    let simulation = start_simulation_loop(
        gateway,
        inbound_rx,
        config.tick_ms(),
        metrics.clone(),
        shutdown,
    );

    let server = WebTransportServer::new(config.clone(), inbound_tx, metrics.clone()).await?;
    info!("Server ready on https://{}", server.bind_addr());
    info!("Certificate hash: {}", server.cert_hash());

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    stop.send(true).ok();
    if tokio::time::timeout(Duration::from_secs(5), simulation).await.is_err() {
        error!("Simulation loop did not stop in time");
    }
    info!("Server stopped");

    Ok(())
}
