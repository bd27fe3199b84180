//! Modular ship equipment
//!
//! Attachments are a closed set of kinds behind one capability surface
//! (`update`, `trigger`, `heading`, `sustain_damage`). Behaviour is selected
//! by [`AttachmentKind`], there is no type hierarchy.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::constants::attachment::{
    self as tuning, cannon, machine_gun, thruster, SLOT_ANGLE, SLOT_COUNT,
};
use crate::util::vec2::{normalize_degrees, Vec2};

pub type AttachmentId = Uuid;

/// Directional slot around a ship, listed clockwise from the nose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotLocation {
    Front,
    FrontRight,
    Right,
    BackRight,
    Back,
    BackLeft,
    Left,
    FrontLeft,
}

impl SlotLocation {
    pub const ALL: [SlotLocation; SLOT_COUNT] = [
        SlotLocation::Front,
        SlotLocation::FrontRight,
        SlotLocation::Right,
        SlotLocation::BackRight,
        SlotLocation::Back,
        SlotLocation::BackLeft,
        SlotLocation::Left,
        SlotLocation::FrontLeft,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % SLOT_COUNT]
    }

    /// Angle of this slot relative to the ship's nose, in degrees
    #[inline]
    pub fn angle_offset(self) -> f32 {
        SLOT_ANGLE * self.index() as f32
    }
}

/// The closed set of attachment kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttachmentKind {
    Thruster,
    Cannon,
    MachineGun,
}

impl AttachmentKind {
    pub fn is_thruster(self) -> bool {
        matches!(self, AttachmentKind::Thruster)
    }

    pub fn is_weapon(self) -> bool {
        matches!(self, AttachmentKind::Cannon | AttachmentKind::MachineGun)
    }

    fn weapon_profile(self) -> Option<WeaponProfile> {
        match self {
            AttachmentKind::Thruster => None,
            AttachmentKind::Cannon => Some(WeaponProfile {
                damage: cannon::DAMAGE,
                cooldown_ms: cannon::COOLDOWN_MS,
                bullet_speed: cannon::BULLET_SPEED,
                heat_per_shot: cannon::HEAT_PER_SHOT,
                ammo_per_shot: cannon::AMMO_PER_SHOT,
            }),
            AttachmentKind::MachineGun => Some(WeaponProfile {
                damage: machine_gun::DAMAGE,
                cooldown_ms: machine_gun::COOLDOWN_MS,
                bullet_speed: machine_gun::BULLET_SPEED,
                heat_per_shot: machine_gun::HEAT_PER_SHOT,
                ammo_per_shot: machine_gun::AMMO_PER_SHOT,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WeaponProfile {
    damage: f32,
    cooldown_ms: u64,
    bullet_speed: f32,
    heat_per_shot: f32,
    ammo_per_shot: f32,
}

/// Position, heading and velocity a detached attachment inherits from its ship
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub location: Vec2,
    pub rotation: f32,
    pub velocity: Vec2,
}

/// What the owning ship can offer a triggered attachment this tick
#[derive(Debug, Clone, Copy)]
pub struct ShipContext {
    pub rotation: f32,
    pub ammo: f32,
    pub fuel: f32,
    pub dt_ms: u64,
}

/// Result of triggering an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerOutput {
    /// A weapon fired along `heading`
    Shot {
        heading: f32,
        damage: f32,
        bullet_speed: f32,
        heat: f32,
        ammo: f32,
    },
    /// A thruster pushed the ship
    Thrust {
        acceleration: Vec2,
        fuel: f32,
        heat: f32,
    },
}

/// A single piece of equipment, attached to a ship or floating free
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: AttachmentId,
    pub kind: AttachmentKind,
    pub integrity: f32,
    /// Slot this attachment occupies; `None` while floating
    pub location: Option<SlotLocation>,
    pub is_thrown: bool,
    /// Ship that last held this attachment
    pub last_owner: Option<Uuid>,
    /// Remaining weapon cooldown
    pub cooldown_ms: u64,
    /// Transform while floating (ignored while attached)
    pub transform: Transform,
}

impl Attachment {
    pub fn new(kind: AttachmentKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            integrity: tuning::MAX_INTEGRITY,
            location: None,
            is_thrown: false,
            last_owner: None,
            cooldown_ms: 0,
            transform: Transform::default(),
        }
    }

    /// World heading of this attachment for a ship facing `ship_rotation`
    pub fn heading(&self, ship_rotation: f32) -> f32 {
        let offset = self.location.map(SlotLocation::angle_offset).unwrap_or(0.0);
        normalize_degrees(ship_rotation + offset)
    }

    /// Advance internal timers
    pub fn update(&mut self, dt_ms: u64) {
        self.cooldown_ms = self.cooldown_ms.saturating_sub(dt_ms);
    }

    /// Try to use the attachment. Weapons fire when cooled down and fed;
    /// thrusters push opposite to the direction they face.
    pub fn trigger(&mut self, ship: &ShipContext) -> Option<TriggerOutput> {
        if self.location.is_none() {
            return None;
        }
        let heading = self.heading(ship.rotation);

        match self.kind.weapon_profile() {
            Some(profile) => {
                if self.cooldown_ms > 0 || ship.ammo < profile.ammo_per_shot {
                    return None;
                }
                self.cooldown_ms = profile.cooldown_ms;
                Some(TriggerOutput::Shot {
                    heading,
                    damage: profile.damage,
                    bullet_speed: profile.bullet_speed,
                    heat: profile.heat_per_shot,
                    ammo: profile.ammo_per_shot,
                })
            }
            None => {
                let dt = ship.dt_ms as f32 / 1000.0;
                let fuel = thruster::FUEL_PER_SECOND * dt;
                if ship.fuel < fuel {
                    return None;
                }
                Some(TriggerOutput::Thrust {
                    acceleration: -Vec2::from_heading(heading) * thruster::THRUST,
                    fuel,
                    heat: thruster::HEAT_PER_SECOND * dt,
                })
            }
        }
    }

    /// Apply damage; returns true once the attachment is broken
    pub fn sustain_damage(&mut self, amount: f32) -> bool {
        self.integrity = (self.integrity - amount.max(0.0)).max(0.0);
        self.integrity <= 0.0
    }
}
