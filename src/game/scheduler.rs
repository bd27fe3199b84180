//! Tiered broadcast scheduler
//!
//! Ship state is broadcast more often than loot, and stats almost never.
//! Each arena owns one scheduler and advances it by the tick's delta; a tier
//! fires when its accumulator reaches the threshold and then restarts at zero.

use crate::config::ServerConfig;

/// Broadcast thresholds in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierThresholds {
    /// Medium tier: ship roster
    pub ships_ms: u64,
    /// Low tier: supplies and floating attachments
    pub supplies_ms: u64,
    /// Ultra-low tier: stats and consistency sweep
    pub stats_ms: u64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            ships_ms: 33,
            supplies_ms: 66,
            stats_ms: 1_000,
        }
    }
}

impl From<&ServerConfig> for TierThresholds {
    fn from(config: &ServerConfig) -> Self {
        Self {
            ships_ms: config.ship_broadcast_ms,
            supplies_ms: config.supply_broadcast_ms,
            stats_ms: config.stats_broadcast_ms,
        }
    }
}

/// Which tiers fired this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FiredTiers {
    pub ships: bool,
    pub supplies: bool,
    pub stats: bool,
}

impl FiredTiers {
    pub fn any(&self) -> bool {
        self.ships || self.supplies || self.stats
    }
}

#[derive(Debug, Clone)]
pub struct UpdateScheduler {
    thresholds: TierThresholds,
    ships_acc: u64,
    supplies_acc: u64,
    stats_acc: u64,
}

impl UpdateScheduler {
    pub fn new(thresholds: TierThresholds) -> Self {
        Self {
            thresholds,
            ships_acc: 0,
            supplies_acc: 0,
            stats_acc: 0,
        }
    }

    pub fn thresholds(&self) -> TierThresholds {
        self.thresholds
    }

    /// Advance every tier by `dt_ms`
    pub fn advance(&mut self, dt_ms: u64) -> FiredTiers {
        FiredTiers {
            ships: Self::step(&mut self.ships_acc, self.thresholds.ships_ms, dt_ms),
            supplies: Self::step(&mut self.supplies_acc, self.thresholds.supplies_ms, dt_ms),
            stats: Self::step(&mut self.stats_acc, self.thresholds.stats_ms, dt_ms),
        }
    }

    #[inline]
    fn step(acc: &mut u64, threshold: u64, dt_ms: u64) -> bool {
        *acc += dt_ms;
        if *acc >= threshold {
            *acc = 0;
            true
        } else {
            false
        }
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new(TierThresholds::default())
    }
}
