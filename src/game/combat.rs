//! Collision-driven combat resolution
//!
//! Consumes [`Collision`] events drained from the physics service and the
//! arena's due timers. Every handler tolerates entities that were already
//! removed earlier in the same tick, so duplicated or reordered events
//! resolve to no-ops.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use tracing::debug;

use crate::game::attachment::{Attachment, AttachmentId};
use crate::game::constants::attachment::{
    FLOATING_TTL_MS, RADIUS as ATTACHMENT_RADIUS, THROWN_ATTACHMENT_DAMAGE, THROWN_GRACE_MS,
};
use crate::game::constants::ship::{RAM_DAMAGE_FACTOR, RAM_MIN_SPEED};
use crate::game::constants::supply::{
    FLICKER_AFTER_MS, MAX_AMMO, MAX_FUEL, MIN_AMOUNT, RADIUS as SUPPLY_RADIUS, REMOVE_AFTER_MS,
    SCATTER_SPEED,
};
use crate::game::physics::{BodyDesc, BodyHandle, Collision, PhysicsService};
use crate::game::registry::{EntityRegistry, FloatingAttachment};
use crate::game::state::{BulletId, ShipId, Supply, SupplyId, SupplyKind, SupplyTimers};
use crate::game::timers::TimerQueue;
use crate::lobby::identity::IdentityKey;
use crate::util::vec2::Vec2;

/// Deferred arena actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaTimer {
    SupplyFlicker(SupplyId),
    SupplyRemove(SupplyId),
    ThrownGrace(AttachmentId),
    FloatingExpire(AttachmentId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExplosionSize {
    Small,
    Large,
}

/// Why a ship left the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeathCause {
    /// Integrity reached zero in combat or from overheating
    Destroyed,
    /// The owning client reported the death
    Reported,
    /// The owning identity expired without reconnecting
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplyRemoval {
    Collected,
    Expired,
}

/// Side effects of resolution, turned into outbound messages by the arena
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    Explosion {
        location: Vec2,
        size: ExplosionSize,
    },
    ShipDestroyed {
        ship_id: ShipId,
        owner: IdentityKey,
        location: Vec2,
        rotation: f32,
        cause: DeathCause,
    },
    SupplyFlickering(SupplyId),
    SupplyRemoved {
        id: SupplyId,
        reason: SupplyRemoval,
    },
}

/// Borrowed view of one arena's mutable state, valid for a single resolution pass
pub struct CombatResolver<'a> {
    pub registry: &'a mut EntityRegistry,
    pub physics: &'a mut dyn PhysicsService,
    pub timers: &'a mut TimerQueue<ArenaTimer>,
    pub rng: &'a mut StdRng,
    pub now_ms: u64,
    pub events: &'a mut Vec<CombatEvent>,
}

impl<'a> CombatResolver<'a> {
    pub fn resolve(&mut self, collision: Collision) {
        match collision {
            Collision::BulletShip { bullet, ship } => self.bullet_hit_ship(bullet, ship),
            Collision::BulletMap { bullet } => self.remove_bullet(bullet),
            Collision::ShipSupply { ship, supply } => self.collect_supply(ship, supply),
            Collision::ShipShip { a, b, relative_speed } => self.ram(a, b, relative_speed),
            Collision::ShipAttachment { ship, attachment } => self.touch_attachment(ship, attachment),
        }
    }

    pub fn on_timer(&mut self, timer: ArenaTimer) {
        match timer {
            ArenaTimer::SupplyFlicker(id) => {
                if let Some(supply) = self.registry.supply_mut(id) {
                    if !supply.flickering {
                        supply.flickering = true;
                        self.events.push(CombatEvent::SupplyFlickering(id));
                    }
                }
            }
            ArenaTimer::SupplyRemove(id) => {
                if self.registry.remove_supply(id).is_some() {
                    self.physics.remove_body(BodyHandle::Supply(id));
                    self.events.push(CombatEvent::SupplyRemoved {
                        id,
                        reason: SupplyRemoval::Expired,
                    });
                }
            }
            ArenaTimer::ThrownGrace(id) => {
                if let Some(attachment) = self.registry.floating_attachment_mut(id) {
                    attachment.is_thrown = false;
                }
            }
            ArenaTimer::FloatingExpire(id) => {
                if self.registry.remove_floating(id).is_some() {
                    self.physics.remove_body(BodyHandle::Attachment(id));
                }
            }
        }
    }

    fn remove_bullet(&mut self, id: BulletId) {
        if self.registry.remove_bullet(id).is_some() {
            self.physics.remove_body(BodyHandle::Bullet(id));
        }
    }

    fn bullet_hit_ship(&mut self, bullet_id: BulletId, ship_id: ShipId) {
        let Some(bullet) = self.registry.bullet(bullet_id) else {
            return;
        };
        // No friendly fire on yourself; the bullet keeps flying
        if bullet.weapon_owner_id == ship_id {
            return;
        }
        if !self.registry.ship(ship_id).is_some_and(|s| s.active) {
            return;
        }

        let impact = self
            .physics
            .location(BodyHandle::Bullet(bullet_id))
            .unwrap_or(bullet.location);
        let Some(bullet) = self.registry.remove_bullet(bullet_id) else {
            return;
        };
        self.physics.remove_body(BodyHandle::Bullet(bullet_id));

        if let Some(owner) = self.registry.ship_mut(bullet.weapon_owner_id) {
            owner.stats.shots_landed += 1;
        }
        self.events.push(CombatEvent::Explosion {
            location: impact,
            size: ExplosionSize::Small,
        });
        self.damage_ship(ship_id, bullet.damage, Some(bullet.weapon_owner_id));
    }

    fn ram(&mut self, a: ShipId, b: ShipId, relative_speed: f32) {
        if relative_speed <= RAM_MIN_SPEED {
            return;
        }
        let damage = relative_speed * RAM_DAMAGE_FACTOR;
        self.damage_ship(a, damage, Some(b));
        self.damage_ship(b, damage, Some(a));
    }

    fn collect_supply(&mut self, ship_id: ShipId, supply_id: SupplyId) {
        if !self.registry.ship(ship_id).is_some_and(|s| s.active) {
            return;
        }
        let Some(supply) = self.registry.remove_supply(supply_id) else {
            return;
        };
        self.physics.remove_body(BodyHandle::Supply(supply_id));
        if let Some(timers) = supply.timers {
            self.timers.cancel(timers.flicker);
            self.timers.cancel(timers.remove);
        }
        if let Some(ship) = self.registry.ship_mut(ship_id) {
            ship.apply_supply(supply.kind, supply.amount);
        }
        self.events.push(CombatEvent::SupplyRemoved {
            id: supply_id,
            reason: SupplyRemoval::Collected,
        });
    }

    fn touch_attachment(&mut self, ship_id: ShipId, attachment_id: AttachmentId) {
        if !self.registry.ship(ship_id).is_some_and(|s| s.active) {
            return;
        }
        let Some(attachment) = self.registry.floating_attachment_mut(attachment_id) else {
            return;
        };

        if attachment.is_thrown {
            let thrower = attachment.last_owner;
            if thrower == Some(ship_id) {
                return;
            }
            // A thrown attachment spends itself on the first ship it strikes
            attachment.is_thrown = false;
            let broken = attachment.sustain_damage(THROWN_ATTACHMENT_DAMAGE);
            let location = attachment.transform.location;
            if broken {
                self.discard_floating(attachment_id);
            }
            self.events.push(CombatEvent::Explosion {
                location,
                size: ExplosionSize::Small,
            });
            self.damage_ship(ship_id, THROWN_ATTACHMENT_DAMAGE, thrower);
            return;
        }

        let Some(floating) = self.registry.remove_floating(attachment_id) else {
            return;
        };
        self.physics.remove_body(BodyHandle::Attachment(attachment_id));
        for handle in &floating.timers {
            self.timers.cancel(*handle);
        }

        let evicted = match self.registry.ship_mut(ship_id) {
            Some(ship) => {
                let transform = ship.transform();
                let evicted = ship.attach(floating.attachment);
                evicted
                    .into_iter()
                    .map(|mut a| {
                        a.transform = transform;
                        a
                    })
                    .collect::<Vec<_>>()
            }
            None => return,
        };
        debug!(ship = %ship_id, attachment = %attachment_id, "Attachment picked up");
        for attachment in evicted {
            self.release_attachment(attachment);
        }
    }

    fn discard_floating(&mut self, id: AttachmentId) {
        if let Some(floating) = self.registry.remove_floating(id) {
            self.physics.remove_body(BodyHandle::Attachment(id));
            for handle in floating.timers {
                self.timers.cancel(handle);
            }
        }
    }

    /// Register a detached attachment as a floating body with its expiry
    /// (and, when thrown, grace) timers
    pub fn release_attachment(&mut self, mut attachment: Attachment) {
        attachment.location = None;
        let id = attachment.id;
        let mut timers: SmallVec<[_; 2]> = smallvec![self
            .timers
            .schedule(self.now_ms + FLOATING_TTL_MS, ArenaTimer::FloatingExpire(id))];
        if attachment.is_thrown {
            timers.push(
                self.timers
                    .schedule(self.now_ms + THROWN_GRACE_MS, ArenaTimer::ThrownGrace(id)),
            );
        }

        self.physics.insert_body(
            BodyHandle::Attachment(id),
            BodyDesc {
                location: attachment.transform.location,
                velocity: attachment.transform.velocity,
                rotation: attachment.transform.rotation,
                radius: ATTACHMENT_RADIUS,
            },
        );
        self.registry.add_floating(FloatingAttachment { attachment, timers });
    }

    /// Apply damage to a ship, crediting `attacker`. Destroys the ship on the
    /// lethal hit and returns true in that case only.
    pub fn damage_ship(&mut self, target: ShipId, amount: f32, attacker: Option<ShipId>) -> bool {
        let Some(ship) = self.registry.ship_mut(target) else {
            return false;
        };
        let before = ship.integrity;
        let destroyed = ship.apply_damage(amount);
        let dealt = before - ship.integrity;

        if let Some(attacker) = attacker.filter(|id| *id != target) {
            if let Some(attacker) = self.registry.ship_mut(attacker) {
                attacker.stats.damage_dealt += dealt;
                if destroyed {
                    attacker.stats.kills += 1;
                }
            }
        }

        if destroyed {
            self.destroy_ship(target, DeathCause::Destroyed);
        }
        destroyed
    }

    /// Remove a ship from the arena and eject its loot. Idempotent: a ship
    /// already gone produces nothing.
    pub fn destroy_ship(&mut self, ship_id: ShipId, cause: DeathCause) -> bool {
        let Some(mut ship) = self.registry.remove_ship(ship_id) else {
            return false;
        };
        let handle = BodyHandle::Ship(ship_id);
        let location = self.physics.location(handle).unwrap_or(ship.location);
        self.physics.remove_body(handle);
        ship.active = false;

        debug!(ship = %ship_id, owner = %ship.owner, ?cause, "Ship destroyed");
        self.events.push(CombatEvent::Explosion {
            location,
            size: ExplosionSize::Large,
        });
        self.events.push(CombatEvent::ShipDestroyed {
            ship_id,
            owner: ship.owner.clone(),
            location,
            rotation: ship.rotation,
            cause,
        });
        self.eject_loot(location, ship.fuel, ship.ammo);
        true
    }

    /// Split remaining fuel and ammo into capped containers and roll for the
    /// coolant and repairs bonuses
    pub fn eject_loot(&mut self, location: Vec2, fuel: f32, ammo: f32) -> Vec<SupplyId> {
        let mut loot: Vec<(SupplyKind, f32)> = Vec::new();
        loot.extend(split_amount(fuel, MAX_FUEL).into_iter().map(|a| (SupplyKind::Fuel, a)));
        loot.extend(split_amount(ammo, MAX_AMMO).into_iter().map(|a| (SupplyKind::Ammo, a)));
        for kind in [SupplyKind::Coolant, SupplyKind::Repairs] {
            if self.rng.gen_bool(0.5) {
                if let Some(amount) = kind.fixed_amount() {
                    loot.push((kind, amount));
                }
            }
        }

        loot.into_iter()
            .map(|(kind, amount)| self.spawn_supply(kind, amount, location))
            .collect()
    }

    fn spawn_supply(&mut self, kind: SupplyKind, amount: f32, location: Vec2) -> SupplyId {
        let heading = self.rng.gen_range(0.0..360.0);
        let speed = self.rng.gen_range(0.0..=SCATTER_SPEED);
        let velocity = Vec2::from_heading(heading) * speed;

        let mut supply = Supply::new(
            kind,
            amount,
            location,
            velocity,
            self.now_ms,
            FLICKER_AFTER_MS + REMOVE_AFTER_MS,
        );
        let id = supply.id;
        supply.timers = Some(SupplyTimers {
            flicker: self
                .timers
                .schedule(self.now_ms + FLICKER_AFTER_MS, ArenaTimer::SupplyFlicker(id)),
            remove: self.timers.schedule(supply.expires_at_ms, ArenaTimer::SupplyRemove(id)),
        });

        self.physics.insert_body(
            BodyHandle::Supply(id),
            BodyDesc {
                location,
                velocity,
                rotation: 0.0,
                radius: SUPPLY_RADIUS,
            },
        );
        self.registry.add_supply(supply)
    }
}

/// Split `total` into containers of at most `cap`; remainders smaller than
/// the minimum container are dropped
pub fn split_amount(total: f32, cap: f32) -> Vec<f32> {
    let mut amounts = Vec::new();
    if !total.is_finite() || cap <= 0.0 {
        return amounts;
    }
    let mut remaining = total;
    while remaining >= MIN_AMOUNT {
        let amount = remaining.min(cap);
        amounts.push(amount);
        remaining -= amount;
    }
    amounts
}
