//! Arena entity definitions
//!
//! Ships, supplies and bullets. Floating attachments reuse
//! [`Attachment`](crate::game::attachment::Attachment) directly.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::attachment::{Attachment, AttachmentKind, ShipContext, Transform};
use crate::game::constants::ship::{
    AMBIENT_TEMPERATURE, COOLING_PER_SECOND, MAX_AMMO, MAX_FUEL, MAX_INTEGRITY,
    OVERHEAT_DAMAGE_PER_DEGREE_SECOND, SAFE_TEMPERATURE,
};
use crate::game::constants::supply::{COOLANT_AMOUNT, REPAIRS_AMOUNT};
use crate::game::slots::AttachmentSlots;
use crate::game::timers::TimerHandle;
use crate::lobby::identity::IdentityKey;
use crate::util::vec2::Vec2;

pub type ShipId = Uuid;
pub type SupplyId = Uuid;
pub type BulletId = Uuid;

/// Per-ship combat statistics, reported on the ultra-low tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipStats {
    pub kills: u32,
    pub shots_fired: u32,
    pub shots_landed: u32,
    pub damage_dealt: f32,
}

/// A player-controlled combat entity
///
/// Resources are clamped to their ranges on every mutation; `active` flips to
/// false exactly once, on the hit that brings integrity to zero.
#[derive(Debug, Clone)]
pub struct Ship {
    pub id: ShipId,
    pub owner: IdentityKey,
    pub location: Vec2,
    /// Heading in degrees, 0 = up, clockwise
    pub rotation: f32,
    pub velocity: Vec2,
    pub integrity: f32,
    pub fuel: f32,
    pub ammo: f32,
    pub temperature: f32,
    pub slots: AttachmentSlots,
    pub engine_on: bool,
    pub weapons_firing: bool,
    pub active: bool,
    pub stats: ShipStats,
}

impl Ship {
    pub fn new(owner: IdentityKey, location: Vec2) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            location,
            rotation: 0.0,
            velocity: Vec2::ZERO,
            integrity: MAX_INTEGRITY,
            fuel: MAX_FUEL,
            ammo: MAX_AMMO,
            temperature: AMBIENT_TEMPERATURE,
            slots: AttachmentSlots::new(),
            engine_on: false,
            weapons_firing: false,
            active: true,
            stats: ShipStats::default(),
        }
    }

    /// Ship with the starting loadout: thruster at back, cannon at front,
    /// machine gun at front-right
    pub fn with_default_loadout(owner: IdentityKey, location: Vec2) -> Self {
        let mut ship = Self::new(owner, location);
        for kind in [
            AttachmentKind::Thruster,
            AttachmentKind::Cannon,
            AttachmentKind::MachineGun,
        ] {
            ship.attach(Attachment::new(kind));
        }
        ship
    }

    /// Place an attachment and claim ownership; returns the evicted ones
    pub fn attach(&mut self, mut attachment: Attachment) -> Vec<Attachment> {
        attachment.last_owner = Some(self.id);
        self.slots.add(attachment).into_vec()
    }

    pub fn transform(&self) -> Transform {
        Transform {
            location: self.location,
            rotation: self.rotation,
            velocity: self.velocity,
        }
    }

    pub fn context(&self, dt_ms: u64) -> ShipContext {
        ShipContext {
            rotation: self.rotation,
            ammo: self.ammo,
            fuel: self.fuel,
            dt_ms,
        }
    }

    /// Apply hull damage. Returns true only for the hit that destroys the ship.
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if !self.active || amount <= 0.0 || !amount.is_finite() {
            return false;
        }
        self.integrity = (self.integrity - amount).clamp(0.0, MAX_INTEGRITY);
        if self.integrity <= 0.0 {
            self.active = false;
            return true;
        }
        false
    }

    pub fn repair(&mut self, amount: f32) {
        self.integrity = (self.integrity + amount).clamp(0.0, MAX_INTEGRITY);
    }

    pub fn add_fuel(&mut self, amount: f32) {
        self.fuel = (self.fuel + amount).clamp(0.0, MAX_FUEL);
    }

    pub fn add_ammo(&mut self, amount: f32) {
        self.ammo = (self.ammo + amount).clamp(0.0, MAX_AMMO);
    }

    pub fn add_heat(&mut self, amount: f32) {
        self.temperature = (self.temperature + amount).max(AMBIENT_TEMPERATURE);
    }

    pub fn cool(&mut self, amount: f32) {
        self.temperature = (self.temperature - amount).max(AMBIENT_TEMPERATURE);
    }

    /// Passive cooling followed by overheat damage for this step.
    /// Returns true if the overheat destroyed the ship.
    pub fn update_thermal(&mut self, dt_ms: u64) -> bool {
        let dt = dt_ms as f32 / 1000.0;
        self.cool(COOLING_PER_SECOND * dt);
        if self.temperature > SAFE_TEMPERATURE {
            let damage =
                (self.temperature - SAFE_TEMPERATURE) * OVERHEAT_DAMAGE_PER_DEGREE_SECOND * dt;
            return self.apply_damage(damage);
        }
        false
    }

    /// Apply a picked up supply to this ship
    pub fn apply_supply(&mut self, kind: SupplyKind, amount: f32) {
        match kind {
            SupplyKind::Ammo => self.add_ammo(amount),
            SupplyKind::Fuel => self.add_fuel(amount),
            SupplyKind::Coolant => self.cool(amount),
            SupplyKind::Repairs => self.repair(amount),
        }
    }

    /// Location of the slot-mounted attachment facing `heading`, at `offset`
    /// from the hull centre
    pub fn muzzle(&self, heading: f32, offset: f32) -> Vec2 {
        self.location + Vec2::from_heading(heading) * offset
    }
}

/// Loot container kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SupplyKind {
    Ammo,
    Coolant,
    Fuel,
    Repairs,
}

impl SupplyKind {
    /// Fixed payload for kinds that are not split from a ship's reserves
    pub fn fixed_amount(self) -> Option<f32> {
        match self {
            SupplyKind::Coolant => Some(COOLANT_AMOUNT),
            SupplyKind::Repairs => Some(REPAIRS_AMOUNT),
            SupplyKind::Ammo | SupplyKind::Fuel => None,
        }
    }
}

/// Pending lifecycle timers of a supply
#[derive(Debug, Clone, Copy)]
pub struct SupplyTimers {
    pub flicker: TimerHandle,
    pub remove: TimerHandle,
}

/// A pickup ejected from a destroyed ship
#[derive(Debug, Clone)]
pub struct Supply {
    pub id: SupplyId,
    pub kind: SupplyKind,
    pub amount: f32,
    pub location: Vec2,
    pub velocity: Vec2,
    pub flickering: bool,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    pub timers: Option<SupplyTimers>,
}

impl Supply {
    pub fn new(
        kind: SupplyKind,
        amount: f32,
        location: Vec2,
        velocity: Vec2,
        now_ms: u64,
        lifetime_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            amount,
            location,
            velocity,
            flickering: false,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + lifetime_ms,
            timers: None,
        }
    }
}

/// A projectile in flight
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: BulletId,
    pub weapon_owner_id: ShipId,
    pub damage: f32,
    pub location: Vec2,
    pub velocity: Vec2,
    pub expires_at_ms: u64,
}

impl Bullet {
    pub fn new(owner: ShipId, damage: f32, location: Vec2, velocity: Vec2, expires_at_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            weapon_owner_id: owner,
            damage,
            location,
            velocity,
            expires_at_ms,
        }
    }
}
