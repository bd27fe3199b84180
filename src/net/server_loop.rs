//! Simulation task
//!
//! Owns the gateway. Each tick drains the inbound queue, then advances every
//! arena; nothing else ever touches simulation state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::game::constants::net::INBOUND_QUEUE_CAPACITY;
use crate::metrics::Metrics;
use crate::net::gateway::{Inbound, ProtocolGateway};

/// Seconds between status log lines
const STATUS_INTERVAL_SECS: u64 = 30;

pub fn inbound_queue() -> (Sender<Inbound>, Receiver<Inbound>) {
    crossbeam_channel::bounded(INBOUND_QUEUE_CAPACITY)
}

/// Apply every queued event in arrival order
pub fn drain_inbound(gateway: &mut ProtocolGateway, inbound: &Receiver<Inbound>) -> usize {
    let mut handled = 0;
    for event in inbound.try_iter() {
        gateway.handle(event);
        handled += 1;
    }
    handled
}

/// Spawn the fixed-rate simulation loop. The loop stops, dropping every
/// arena, once `shutdown` flips to true.
pub fn start_simulation_loop(
    mut gateway: ProtocolGateway,
    inbound: Receiver<Inbound>,
    tick_ms: u64,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Simulation loop started at {} ms per tick", tick_ms);
        let start = Instant::now();
        let status_every = (STATUS_INTERVAL_SECS * 1000 / tick_ms).max(1);
        let mut tick_count: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            tick_count += 1;

            let tick_start = Instant::now();
            drain_inbound(&mut gateway, &inbound);
            gateway.tick(tick_ms);
            metrics.record_tick_time(tick_start.elapsed());

            if tick_count % status_every == 0 {
                info!(
                    "Sim: {}s, tick {}, {} rooms, {} identities ({} connected), {} connections",
                    start.elapsed().as_secs(),
                    tick_count,
                    gateway.rooms().room_count(),
                    gateway.identities().len(),
                    gateway.identities().connected_count(),
                    gateway.hub().count()
                );
            }
        }

        let dropped = gateway.shutdown();
        info!("Simulation loop stopped, {} rooms dropped", dropped);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::net::connection::outbound_channel;
    use crate::net::protocol::{ClientMessage, IdentityPayload};

    fn gateway() -> ProtocolGateway {
        ProtocolGateway::new(&ServerConfig::default(), Arc::new(Metrics::new()))
    }

    #[test]
    fn test_drain_applies_in_order() {
        let mut gateway = gateway();
        let (tx, rx) = inbound_queue();
        let (sender, mut outbound) = outbound_channel();

        tx.send(Inbound::Connected { connection: 7, sender }).unwrap();
        tx.send(Inbound::Message {
            connection: 7,
            message: ClientMessage::SetIdentity(IdentityPayload::new("fp", "Alice")),
            bytes: 48,
        })
        .unwrap();

        assert_eq!(drain_inbound(&mut gateway, &rx), 2);
        assert!(outbound.try_recv().is_ok());
        assert_eq!(gateway.identities().connected_count(), 1);
        assert_eq!(drain_inbound(&mut gateway, &rx), 0);
    }

    #[test]
    fn test_disconnect_after_drain_starts_grace() {
        let mut gateway = gateway();
        let (tx, rx) = inbound_queue();
        let (sender, _outbound) = outbound_channel();

        tx.send(Inbound::Connected { connection: 1, sender }).unwrap();
        tx.send(Inbound::Message {
            connection: 1,
            message: ClientMessage::SetIdentity(IdentityPayload::new("fp", "Alice")),
            bytes: 48,
        })
        .unwrap();
        tx.send(Inbound::Disconnected { connection: 1 }).unwrap();
        drain_inbound(&mut gateway, &rx);

        assert_eq!(gateway.identities().len(), 1);
        assert_eq!(gateway.identities().connected_count(), 0);
        assert_eq!(gateway.hub().count(), 0);
    }

    #[tokio::test]
    async fn test_loop_stops_on_shutdown() {
        let metrics = Arc::new(Metrics::new());
        let (_tx, rx) = inbound_queue();
        let (stop, shutdown) = watch::channel(false);

        let handle = start_simulation_loop(gateway(), rx, 5, metrics.clone(), shutdown);
        tokio::time::sleep(Duration::from_millis(40)).await;
        stop.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop exits")
            .unwrap();
        assert!(metrics.tick_count.load(std::sync::atomic::Ordering::Relaxed) > 0);
    }
}
