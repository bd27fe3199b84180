use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::game::constants::sim::TICK_RATE;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Port of the metrics HTTP endpoint
    pub metrics_port: u16,
    /// Expected peak of concurrent arenas. Crossing it is logged and
    /// counted; joins are never refused because of it.
    pub max_rooms: usize,
    /// Identities admitted per arena
    pub room_capacity: usize,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Grace period before a disconnected identity is dropped
    pub identity_expiry_ms: u64,
    /// Medium tier cadence (ship roster)
    pub ship_broadcast_ms: u64,
    /// Low tier cadence (supplies and floating attachments)
    pub supply_broadcast_ms: u64,
    /// Ultra-low tier cadence (stats and consistency sweep)
    pub stats_broadcast_ms: u64,
    pub map_width: f32,
    pub map_height: f32,
    /// Path to TLS certificate file
    pub tls_cert_path: Option<String>,
    /// Path to TLS key file
    pub tls_key_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 4433,
            metrics_port: 9090,
            max_rooms: 100,
            room_capacity: 4,
            tick_rate: TICK_RATE,
            identity_expiry_ms: 30_000,
            ship_broadcast_ms: 33,
            supply_broadcast_ms: 66,
            stats_broadcast_ms: 1_000,
            map_width: 3_200.0,
            map_height: 3_200.0,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

/// Parse `name` into `target` if set; warn and keep the default otherwise
fn read_env<T: FromStr>(name: &str, target: &mut T, valid: impl Fn(&T) -> bool) {
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(parsed) if valid(&parsed) => *target = parsed,
        Ok(_) => tracing::warn!("{} '{}' is out of range, using default", name, raw),
        Err(_) => tracing::warn!("Invalid {} '{}', using default", name, raw),
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        read_env("BIND_ADDRESS", &mut config.bind_address, |_| true);
        read_env("PORT", &mut config.port, |p| *p > 0);
        read_env("METRICS_PORT", &mut config.metrics_port, |p| *p > 0);
        read_env("MAX_ROOMS", &mut config.max_rooms, |n| (1..=10_000).contains(n));
        read_env("ROOM_CAPACITY", &mut config.room_capacity, |n| (1..=256).contains(n));
        read_env("TICK_RATE", &mut config.tick_rate, |n| (1..=240).contains(n));
        read_env("IDENTITY_EXPIRY_MS", &mut config.identity_expiry_ms, |n| *n > 0);
        read_env("SHIP_BROADCAST_MS", &mut config.ship_broadcast_ms, |n| *n > 0);
        read_env("SUPPLY_BROADCAST_MS", &mut config.supply_broadcast_ms, |n| *n > 0);
        read_env("STATS_BROADCAST_MS", &mut config.stats_broadcast_ms, |n| *n > 0);
        read_env("MAP_WIDTH", &mut config.map_width, |w| w.is_finite() && *w >= 256.0);
        read_env("MAP_HEIGHT", &mut config.map_height, |h| h.is_finite() && *h >= 256.0);

        if let Ok(cert_path) = std::env::var("TLS_CERT_PATH") {
            config.tls_cert_path = Some(cert_path);
        }

        if let Ok(key_path) = std::env::var("TLS_KEY_PATH") {
            config.tls_key_path = Some(key_path);
        }

        config
    }

    /// Tick period in whole milliseconds
    pub fn tick_ms(&self) -> u64 {
        (1000 / self.tick_rate.max(1) as u64).max(1)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0".to_string());
        }
        if self.port == self.metrics_port {
            return Err("metrics_port must differ from port".to_string());
        }
        if self.max_rooms == 0 {
            return Err("max_rooms must be at least 1".to_string());
        }
        if self.room_capacity == 0 {
            return Err("room_capacity must be at least 1".to_string());
        }
        if self.tick_rate == 0 {
            return Err("tick_rate must be at least 1".to_string());
        }
        if self.ship_broadcast_ms > self.supply_broadcast_ms
            || self.supply_broadcast_ms > self.stats_broadcast_ms
        {
            return Err("broadcast tiers must be ordered ship <= supply <= stats".to_string());
        }
        if self.tls_cert_path.is_some() != self.tls_key_path.is_some() {
            return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string());
        }
        Ok(())
    }
}
