//! Prometheus-compatible metrics endpoint
//!
//! Exposes arena server metrics in Prometheus text format and as JSON.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::arena::ArenaCounters;

const TICK_HISTORY: usize = 1000;

/// Metrics registry for the arena server
#[derive(Debug)]
pub struct Metrics {
    // Population gauges
    pub rooms: AtomicU64,
    pub ships: AtomicU64,
    pub supplies: AtomicU64,
    pub bullets: AtomicU64,
    pub floating_attachments: AtomicU64,
    pub identities: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Network
    pub connections_active: AtomicU64,
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub invalid_requests: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub rooms_over_limit: AtomicU64,

    // Gameplay counters
    pub ships_destroyed: AtomicU64,
    pub shots_fired: AtomicU64,
    pub supplies_collected: AtomicU64,
    pub supplies_expired: AtomicU64,
    pub identities_expired: AtomicU64,
    pub bindings_repaired: AtomicU64,

    start_time: Instant,

    // Rolling tick times for percentile calculation
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            rooms: AtomicU64::new(0),
            ships: AtomicU64::new(0),
            supplies: AtomicU64::new(0),
            bullets: AtomicU64::new(0),
            floating_attachments: AtomicU64::new(0),
            identities: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            invalid_requests: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            rooms_over_limit: AtomicU64::new(0),
            ships_destroyed: AtomicU64::new(0),
            shots_fired: AtomicU64::new(0),
            supplies_collected: AtomicU64::new(0),
            supplies_expired: AtomicU64::new(0),
            identities_expired: AtomicU64::new(0),
            bindings_repaired: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();
            let last = sorted.len() - 1;

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(last)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(last)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted[last], Ordering::Relaxed);
        }
    }

    /// Fold one arena's per-tick counters into the totals
    pub fn add_arena_counters(&self, counters: ArenaCounters) {
        self.ships_destroyed
            .fetch_add(counters.ships_destroyed, Ordering::Relaxed);
        self.shots_fired.fetch_add(counters.shots_fired, Ordering::Relaxed);
        self.supplies_collected
            .fetch_add(counters.supplies_collected, Ordering::Relaxed);
        self.supplies_expired
            .fetch_add(counters.supplies_expired, Ordering::Relaxed);
    }

    pub fn record_sent(&self, frames: u64, bytes: u64) {
        self.messages_sent.fetch_add(frames, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("salvage_arena_rooms", "Number of live arenas", "gauge",
            self.rooms.load(Ordering::Relaxed));
        metric!("salvage_arena_ships", "Number of live ships", "gauge",
            self.ships.load(Ordering::Relaxed));
        metric!("salvage_arena_supplies", "Number of supplies on the ground", "gauge",
            self.supplies.load(Ordering::Relaxed));
        metric!("salvage_arena_bullets", "Number of bullets in flight", "gauge",
            self.bullets.load(Ordering::Relaxed));
        metric!("salvage_arena_floating_attachments", "Number of floating attachments", "gauge",
            self.floating_attachments.load(Ordering::Relaxed));
        metric!("salvage_arena_identities", "Number of known identities", "gauge",
            self.identities.load(Ordering::Relaxed));

        metric!("salvage_arena_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("salvage_arena_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("salvage_arena_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("salvage_arena_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("salvage_arena_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("salvage_arena_connections_active", "Active WebTransport connections", "gauge",
            self.connections_active.load(Ordering::Relaxed));
        metric!("salvage_arena_messages_sent_total", "Total messages sent", "counter",
            self.messages_sent.load(Ordering::Relaxed));
        metric!("salvage_arena_messages_received_total", "Total messages received", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("salvage_arena_bytes_sent_total", "Total bytes sent", "counter",
            self.bytes_sent.load(Ordering::Relaxed));
        metric!("salvage_arena_bytes_received_total", "Total bytes received", "counter",
            self.bytes_received.load(Ordering::Relaxed));
        metric!("salvage_arena_invalid_requests_total", "Rejected client messages", "counter",
            self.invalid_requests.load(Ordering::Relaxed));
        metric!("salvage_arena_frames_dropped_total", "Frames dropped on full outbound queues", "counter",
            self.frames_dropped.load(Ordering::Relaxed));
        metric!("salvage_arena_rooms_over_limit_total", "Rooms opened past max_rooms", "counter",
            self.rooms_over_limit.load(Ordering::Relaxed));

        metric!("salvage_arena_ships_destroyed_total", "Ships destroyed", "counter",
            self.ships_destroyed.load(Ordering::Relaxed));
        metric!("salvage_arena_shots_fired_total", "Bullets fired", "counter",
            self.shots_fired.load(Ordering::Relaxed));
        metric!("salvage_arena_supplies_collected_total", "Supplies picked up", "counter",
            self.supplies_collected.load(Ordering::Relaxed));
        metric!("salvage_arena_supplies_expired_total", "Supplies removed by expiry", "counter",
            self.supplies_expired.load(Ordering::Relaxed));
        metric!("salvage_arena_identities_expired_total", "Identities removed after the grace period", "counter",
            self.identities_expired.load(Ordering::Relaxed));
        metric!("salvage_arena_bindings_repaired_total", "Stale ship bindings cleared by the sweep", "counter",
            self.bindings_repaired.load(Ordering::Relaxed));
        metric!("salvage_arena_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view of the same metrics
    pub fn to_json(&self) -> String {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        json!({
            "population": {
                "rooms": load(&self.rooms),
                "ships": load(&self.ships),
                "supplies": load(&self.supplies),
                "bullets": load(&self.bullets),
                "floating_attachments": load(&self.floating_attachments),
                "identities": load(&self.identities),
            },
            "performance": {
                "tick_time_us": load(&self.tick_time_us),
                "tick_time_p95_us": load(&self.tick_time_p95_us),
                "tick_time_p99_us": load(&self.tick_time_p99_us),
                "tick_time_max_us": load(&self.tick_time_max_us),
                "tick_count": load(&self.tick_count),
            },
            "network": {
                "connections": load(&self.connections_active),
                "messages_sent": load(&self.messages_sent),
                "messages_received": load(&self.messages_received),
                "bytes_sent": load(&self.bytes_sent),
                "bytes_received": load(&self.bytes_received),
                "invalid_requests": load(&self.invalid_requests),
                "frames_dropped": load(&self.frames_dropped),
                "rooms_over_limit": load(&self.rooms_over_limit),
            },
            "gameplay": {
                "ships_destroyed": load(&self.ships_destroyed),
                "shots_fired": load(&self.shots_fired),
                "supplies_collected": load(&self.supplies_collected),
                "supplies_expired": load(&self.supplies_expired),
                "identities_expired": load(&self.identities_expired),
                "bindings_repaired": load(&self.bindings_repaired),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

/// Route a raw HTTP request line to a response
fn route(metrics: &Metrics, request: &str) -> String {
    let path = request.split_whitespace().nth(1).unwrap_or("/");
    match path {
        "/metrics" => http_response("200 OK", "text/plain; version=0.0.4", &metrics.to_prometheus()),
        "/metrics/json" | "/json" => http_response("200 OK", "application/json", &metrics.to_json()),
        "/health" | "/" => http_response("200 OK", "text/plain", "OK"),
        _ => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = route(&metrics, &request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
