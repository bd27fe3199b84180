//! Opaque map handle
//!
//! The dungeon layout itself is generated client side from `seed`; the server
//! only needs the outer bounds for collision and spawning.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::util::vec2::Vec2;

/// Default tile edge length in world units
pub const DEFAULT_TILE_SIZE: f32 = 64.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapHandle {
    pub seed: u64,
    pub width: f32,
    pub height: f32,
    pub tile_size: f32,
}

impl MapHandle {
    pub fn new(seed: u64, width: f32, height: f32) -> Self {
        Self {
            seed,
            width,
            height,
            tile_size: DEFAULT_TILE_SIZE,
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    /// Whether a circle fits entirely inside the map
    pub fn contains(&self, point: Vec2, radius: f32) -> bool {
        point.x - radius >= 0.0
            && point.y - radius >= 0.0
            && point.x + radius <= self.width
            && point.y + radius <= self.height
    }

    /// Pull a circle back inside the map. Returns which axes were clamped.
    pub fn clamp(&self, point: &mut Vec2, radius: f32) -> (bool, bool) {
        let clamp_axis = |value: &mut f32, max: f32| {
            let lo = radius.min(max * 0.5);
            let hi = (max - radius).max(max * 0.5);
            let clamped = value.clamp(lo, hi);
            let hit = clamped != *value;
            *value = clamped;
            hit
        };
        let hit_x = clamp_axis(&mut point.x, self.width);
        let hit_y = clamp_axis(&mut point.y, self.height);
        (hit_x, hit_y)
    }

    /// Random spawn point kept one tile away from the edges
    pub fn spawn_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        let margin = self.tile_size.min(self.width * 0.25).min(self.height * 0.25);
        Vec2::new(
            rng.gen_range(margin..=(self.width - margin)),
            rng.gen_range(margin..=(self.height - margin)),
        )
    }
}
