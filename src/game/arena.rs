//! One arena simulation instance
//!
//! Owns the entity registry, timers, broadcast scheduler, physics service and
//! rng of a single room. `tick` runs the whole frame: timers, ship updates,
//! physics, collision resolution, then tiered snapshots built after every
//! mutation of the frame.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::game::attachment::{AttachmentId, SlotLocation, TriggerOutput};
use crate::game::combat::{ArenaTimer, CombatEvent, CombatResolver, DeathCause, SupplyRemoval};
use crate::game::constants::bullet::{LIFETIME_MS, MUZZLE_OFFSET, RADIUS as BULLET_RADIUS};
use crate::game::constants::ship::RADIUS as SHIP_RADIUS;
use crate::game::map::MapHandle;
use crate::game::physics::{BodyDesc, BodyHandle, KinematicWorld, PhysicsService};
use crate::game::registry::EntityRegistry;
use crate::game::scheduler::{TierThresholds, UpdateScheduler};
use crate::game::state::{Bullet, Ship, ShipId, SupplyId};
use crate::game::timers::TimerQueue;
use crate::lobby::identity::IdentityKey;
use crate::net::protocol::{
    AttachmentSnapshot, ServerMessage, ShipSnapshot, StatsSnapshot, SupplySnapshot,
};
use crate::util::vec2::{normalize_degrees, Vec2};

/// What a tick or command asks the outside world to do
#[derive(Debug, Clone, PartialEq)]
pub enum ArenaOutput {
    /// Send to every connection in the room
    Broadcast(ServerMessage),
    /// A ship left the registry; identity bindings must follow
    ShipDestroyed {
        ship_id: ShipId,
        owner: IdentityKey,
        cause: DeathCause,
    },
    /// The ultra-low tier fired: run the consistency sweep for this room
    StatsTier,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArenaError {
    #[error("Unknown ship {0}")]
    UnknownShip(ShipId),
    #[error("No attachment at {0:?}")]
    EmptySlot(SlotLocation),
    #[error("Angle must be a finite number of degrees")]
    InvalidAngle,
}

/// Counters drained by the gateway into metrics after each tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaCounters {
    pub ships_destroyed: u64,
    pub shots_fired: u64,
    pub supplies_collected: u64,
    pub supplies_expired: u64,
}

pub struct Arena {
    registry: EntityRegistry,
    map: MapHandle,
    timers: TimerQueue<ArenaTimer>,
    scheduler: UpdateScheduler,
    physics: Box<dyn PhysicsService>,
    rng: StdRng,
    clock_ms: u64,
    tick: u64,
    counters: ArenaCounters,
}

impl Arena {
    pub fn new(map: MapHandle, thresholds: TierThresholds) -> Self {
        Self::with_physics(map, thresholds, Box::new(KinematicWorld::new(map)))
    }

    pub fn with_physics(
        map: MapHandle,
        thresholds: TierThresholds,
        physics: Box<dyn PhysicsService>,
    ) -> Self {
        Self {
            registry: EntityRegistry::new(),
            map,
            timers: TimerQueue::new(),
            scheduler: UpdateScheduler::new(thresholds),
            physics,
            rng: StdRng::seed_from_u64(map.seed),
            clock_ms: 0,
            tick: 0,
            counters: ArenaCounters::default(),
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn map_config(&self) -> MapHandle {
        self.map
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn ship(&self, id: ShipId) -> Option<&Ship> {
        self.registry.ship(id)
    }

    pub fn has_ship(&self, id: ShipId) -> bool {
        self.registry.has_ship(id)
    }

    pub fn take_counters(&mut self) -> ArenaCounters {
        std::mem::take(&mut self.counters)
    }

    fn resolver<'a>(&'a mut self, events: &'a mut Vec<CombatEvent>) -> CombatResolver<'a> {
        CombatResolver {
            registry: &mut self.registry,
            physics: self.physics.as_mut(),
            timers: &mut self.timers,
            rng: &mut self.rng,
            now_ms: self.clock_ms,
            events,
        }
    }

    // === Commands ===

    /// Spawn a fresh ship with the default loadout at a random point
    pub fn spawn_ship(&mut self, owner: IdentityKey) -> ShipId {
        let location = self.map.spawn_point(&mut self.rng);
        let ship = Ship::with_default_loadout(owner, location);
        let id = ship.id;
        self.physics.insert_body(
            BodyHandle::Ship(id),
            BodyDesc {
                location,
                velocity: Vec2::ZERO,
                rotation: ship.rotation,
                radius: SHIP_RADIUS,
            },
        );
        self.registry.add_ship(ship);
        id
    }

    /// Remove a ship through the regular death path. A ship already gone
    /// yields no output.
    pub fn kill_ship(&mut self, id: ShipId, cause: DeathCause) -> Vec<ArenaOutput> {
        let mut events = Vec::new();
        self.resolver(&mut events).destroy_ship(id, cause);
        self.outputs_from_events(events)
    }

    fn ship_mut(&mut self, id: ShipId) -> Result<&mut Ship, ArenaError> {
        self.registry
            .ship_mut(id)
            .filter(|ship| ship.active)
            .ok_or(ArenaError::UnknownShip(id))
    }

    pub fn set_engine(&mut self, id: ShipId, enabled: bool) -> Result<ServerMessage, ArenaError> {
        self.ship_mut(id)?.engine_on = enabled;
        Ok(ServerMessage::EngineToggled { ship_id: id, enabled })
    }

    pub fn set_weapons(&mut self, id: ShipId, enabled: bool) -> Result<ServerMessage, ArenaError> {
        self.ship_mut(id)?.weapons_firing = enabled;
        Ok(ServerMessage::WeaponToggled { ship_id: id, enabled })
    }

    pub fn set_angle(&mut self, id: ShipId, degrees: f32) -> Result<(), ArenaError> {
        if !degrees.is_finite() {
            return Err(ArenaError::InvalidAngle);
        }
        let rotation = normalize_degrees(degrees);
        self.ship_mut(id)?.rotation = rotation;
        self.physics.set_rotation(BodyHandle::Ship(id), rotation);
        Ok(())
    }

    /// Debounced slot rotation; `Ok(false)` means the call was ignored
    pub fn rotate_attachments(&mut self, id: ShipId, clockwise: bool) -> Result<bool, ArenaError> {
        let now = self.clock_ms;
        let ship = self.ship_mut(id)?;
        Ok(if clockwise {
            ship.slots.rotate_clockwise(now)
        } else {
            ship.slots.rotate_anticlockwise(now)
        })
    }

    pub fn detach_attachment(
        &mut self,
        id: ShipId,
        location: SlotLocation,
    ) -> Result<AttachmentId, ArenaError> {
        self.release_from_slot(id, location, false)
    }

    pub fn throw_attachment(
        &mut self,
        id: ShipId,
        location: SlotLocation,
    ) -> Result<AttachmentId, ArenaError> {
        self.release_from_slot(id, location, true)
    }

    fn release_from_slot(
        &mut self,
        id: ShipId,
        location: SlotLocation,
        throw: bool,
    ) -> Result<AttachmentId, ArenaError> {
        let ship = self.ship_mut(id)?;
        let transform = ship.transform();
        let attachment = if throw {
            ship.slots.throw_at(location, transform)
        } else {
            ship.slots.remove_at(location, transform)
        }
        .ok_or(ArenaError::EmptySlot(location))?;

        let attachment_id = attachment.id;
        let mut events = Vec::new();
        self.resolver(&mut events).release_attachment(attachment);
        Ok(attachment_id)
    }

    // === Tick ===

    /// Run one frame of `dt_ms`
    pub fn tick(&mut self, dt_ms: u64) -> Vec<ArenaOutput> {
        self.clock_ms += dt_ms;
        self.tick += 1;
        let mut events = Vec::new();

        // 1. Deferred actions
        for timer in self.timers.poll(self.clock_ms) {
            self.resolver(&mut events).on_timer(timer);
        }

        // 2. High tier: ship systems
        self.update_ships(dt_ms, &mut events);
        for bullet in self.registry.expired_bullets(self.clock_ms) {
            self.registry.remove_bullet(bullet);
            self.physics.remove_body(BodyHandle::Bullet(bullet));
        }

        // 3. Physics and collisions
        self.physics.step(dt_ms);
        self.sync_transforms();
        for collision in self.physics.drain_collisions() {
            self.resolver(&mut events).resolve(collision);
        }

        // 4. Tiered snapshots, after every mutation of this frame
        let mut outputs = self.outputs_from_events(events);
        let fired = self.scheduler.advance(dt_ms);
        if fired.ships {
            outputs.push(ArenaOutput::Broadcast(self.players_snapshot()));
        }
        if fired.supplies {
            outputs.push(ArenaOutput::Broadcast(self.supplies_snapshot()));
        }
        if fired.stats {
            outputs.push(ArenaOutput::Broadcast(self.stats_snapshot()));
            outputs.push(ArenaOutput::StatsTier);
        }
        outputs
    }

    fn update_ships(&mut self, dt_ms: u64, events: &mut Vec<CombatEvent>) {
        let dt = dt_ms as f32 / 1000.0;
        let mut bullets = Vec::new();
        let mut overheated = Vec::new();

        for id in self.registry.ship_ids() {
            let Some(ship) = self.registry.ship_mut(id) else {
                continue;
            };
            if !ship.active {
                continue;
            }

            for attachment in ship.slots.iter_mut() {
                attachment.update(dt_ms);
            }

            for location in SlotLocation::ALL {
                let context = ship.context(dt_ms);
                let Some(attachment) = ship.slots.get_mut(location) else {
                    continue;
                };
                let wants = if attachment.kind.is_thruster() {
                    ship.engine_on
                } else {
                    ship.weapons_firing
                };
                if !wants {
                    continue;
                }

                match attachment.trigger(&context) {
                    Some(TriggerOutput::Thrust {
                        acceleration,
                        fuel,
                        heat,
                    }) => {
                        ship.velocity += acceleration * dt;
                        ship.add_fuel(-fuel);
                        ship.add_heat(heat);
                    }
                    Some(TriggerOutput::Shot {
                        heading,
                        damage,
                        bullet_speed,
                        heat,
                        ammo,
                    }) => {
                        ship.add_ammo(-ammo);
                        ship.add_heat(heat);
                        ship.stats.shots_fired += 1;
                        bullets.push(Bullet::new(
                            ship.id,
                            damage,
                            ship.muzzle(heading, MUZZLE_OFFSET),
                            ship.velocity + Vec2::from_heading(heading) * bullet_speed,
                            self.clock_ms + LIFETIME_MS,
                        ));
                    }
                    None => {}
                }
            }

            self.physics.apply_velocity(BodyHandle::Ship(id), ship.velocity);
            if ship.update_thermal(dt_ms) {
                overheated.push(id);
            }
        }

        self.counters.shots_fired += bullets.len() as u64;
        for bullet in bullets {
            self.physics.insert_body(
                BodyHandle::Bullet(bullet.id),
                BodyDesc {
                    location: bullet.location,
                    velocity: bullet.velocity,
                    rotation: 0.0,
                    radius: BULLET_RADIUS,
                },
            );
            self.registry.add_bullet(bullet);
        }

        for id in overheated {
            self.resolver(events).destroy_ship(id, DeathCause::Destroyed);
        }
    }

    /// Copy physics transforms back into the registry
    fn sync_transforms(&mut self) {
        let physics = self.physics.as_ref();
        for ship in self.registry.ships_mut() {
            let handle = BodyHandle::Ship(ship.id);
            if let Some(location) = physics.location(handle) {
                ship.location = location;
            }
            if let Some(velocity) = physics.velocity(handle) {
                ship.velocity = velocity;
            }
        }
        for bullet in self.registry.bullets_mut() {
            if let Some(location) = physics.location(BodyHandle::Bullet(bullet.id)) {
                bullet.location = location;
            }
        }
        for supply in self.registry.supplies_mut() {
            let handle = BodyHandle::Supply(supply.id);
            if let Some(location) = physics.location(handle) {
                supply.location = location;
            }
            if let Some(velocity) = physics.velocity(handle) {
                supply.velocity = velocity;
            }
        }
        for attachment in self.registry.floating_mut() {
            let handle = BodyHandle::Attachment(attachment.id);
            if let Some(location) = physics.location(handle) {
                attachment.transform.location = location;
            }
            if let Some(velocity) = physics.velocity(handle) {
                attachment.transform.velocity = velocity;
            }
        }
    }

    /// Turn resolver events into outbound messages. Supply notices raised in
    /// the same frame are batched into one message each.
    fn outputs_from_events(&mut self, events: Vec<CombatEvent>) -> Vec<ArenaOutput> {
        let mut outputs = Vec::new();
        let mut flickering: Vec<SupplyId> = Vec::new();
        let mut removed: Vec<SupplyId> = Vec::new();

        for event in events {
            match event {
                CombatEvent::Explosion { location, size } => {
                    outputs.push(ArenaOutput::Broadcast(ServerMessage::Explosion { location, size }));
                }
                CombatEvent::ShipDestroyed {
                    ship_id,
                    owner,
                    location,
                    rotation,
                    cause,
                } => {
                    self.counters.ships_destroyed += 1;
                    outputs.push(ArenaOutput::Broadcast(ServerMessage::ShipDestroyed {
                        ship_id,
                        name: owner.name.clone(),
                        location,
                        rotation,
                    }));
                    outputs.push(ArenaOutput::ShipDestroyed {
                        ship_id,
                        owner,
                        cause,
                    });
                }
                CombatEvent::SupplyFlickering(id) => flickering.push(id),
                CombatEvent::SupplyRemoved { id, reason } => {
                    match reason {
                        SupplyRemoval::Collected => self.counters.supplies_collected += 1,
                        SupplyRemoval::Expired => self.counters.supplies_expired += 1,
                    }
                    removed.push(id);
                }
            }
        }

        if !flickering.is_empty() {
            outputs.push(ArenaOutput::Broadcast(ServerMessage::FlickerSupplies {
                ids: flickering,
            }));
        }
        if !removed.is_empty() {
            outputs.push(ArenaOutput::Broadcast(ServerMessage::RemoveSupplies { ids: removed }));
        }
        outputs
    }

    // === Snapshots ===

    pub fn players_snapshot(&self) -> ServerMessage {
        ServerMessage::UpdatePlayers(
            self.registry
                .ships()
                .into_iter()
                .filter(|ship| ship.active)
                .map(ShipSnapshot::from_ship)
                .collect(),
        )
    }

    pub fn supplies_snapshot(&self) -> ServerMessage {
        ServerMessage::UpdateSupplies {
            supplies: self
                .registry
                .supplies()
                .into_iter()
                .map(SupplySnapshot::from_supply)
                .collect(),
            attachments: self
                .registry
                .floating()
                .into_iter()
                .map(AttachmentSnapshot::from_attachment)
                .collect(),
        }
    }

    pub fn stats_snapshot(&self) -> ServerMessage {
        ServerMessage::UpdateStats(
            self.registry
                .ships()
                .into_iter()
                .map(StatsSnapshot::from_ship)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::attachment::AttachmentKind;
    use crate::game::constants::attachment::ROTATION_DELAY_MS;
    use crate::game::constants::ship::MAX_FUEL;
    use crate::game::constants::supply::{FLICKER_AFTER_MS, REMOVE_AFTER_MS};

    const DT: u64 = 16;

    fn arena() -> Arena {
        Arena::new(MapHandle::new(9, 2000.0, 2000.0), TierThresholds::default())
    }

    fn owner(name: &str) -> IdentityKey {
        IdentityKey::new(format!("fp-{name}"), name)
    }

    fn broadcasts(outputs: &[ArenaOutput]) -> Vec<&ServerMessage> {
        outputs
            .iter()
            .filter_map(|o| match o {
                ArenaOutput::Broadcast(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_spawn_ship_inside_map() {
        let mut arena = arena();
        let id = arena.spawn_ship(owner("a"));
        let ship = arena.ship(id).expect("spawned");
        assert!(arena.map_config().contains(ship.location, SHIP_RADIUS));
        assert_eq!(ship.slots.len(), 3);
    }

    #[test]
    fn test_engine_consumes_fuel_and_moves() {
        let mut arena = arena();
        let id = arena.spawn_ship(owner("a"));
        let start = arena.ship(id).map(|s| s.location).expect("ship");

        arena.set_engine(id, true).expect("ship exists");
        for _ in 0..30 {
            arena.tick(DT);
        }

        let ship = arena.ship(id).expect("ship");
        assert!(ship.fuel < MAX_FUEL);
        // Facing 0 degrees means moving towards -y
        assert!(ship.location.y < start.y);
    }

    #[test]
    fn test_weapons_fire_bullets() {
        let mut arena = arena();
        let id = arena.spawn_ship(owner("a"));
        arena.set_weapons(id, true).expect("ship exists");

        arena.tick(DT);

        assert_eq!(arena.registry().bullet_count(), 2);
        assert_eq!(arena.ship(id).map(|s| s.stats.shots_fired), Some(2));
        assert_eq!(arena.take_counters().shots_fired, 2);
    }

    #[test]
    fn test_bullets_expire() {
        let mut arena = arena();
        let id = arena.spawn_ship(owner("a"));
        arena.set_weapons(id, true).expect("ship exists");
        arena.tick(DT);
        arena.set_weapons(id, false).expect("ship exists");

        for _ in 0..(LIFETIME_MS / DT + 2) {
            arena.tick(DT);
        }
        assert_eq!(arena.registry().bullet_count(), 0);
    }

    #[test]
    fn test_tiers_produce_snapshots() {
        let mut arena = arena();
        arena.spawn_ship(owner("a"));

        let mut players = 0;
        let mut supplies = 0;
        let mut stats = 0;
        for _ in 0..63 {
            for msg in broadcasts(&arena.tick(DT)) {
                match msg {
                    ServerMessage::UpdatePlayers(ships) => {
                        assert_eq!(ships.len(), 1);
                        players += 1;
                    }
                    ServerMessage::UpdateSupplies { .. } => supplies += 1,
                    ServerMessage::UpdateStats(_) => stats += 1,
                    _ => {}
                }
            }
        }
        assert_eq!(players, 21);
        assert_eq!(supplies, 12);
        assert_eq!(stats, 1);
    }

    #[test]
    fn test_kill_ship_ejects_loot_and_leaves_roster() {
        let mut arena = arena();
        let id = arena.spawn_ship(owner("victim"));

        let outputs = arena.kill_ship(id, DeathCause::Reported);
        let deaths = outputs
            .iter()
            .filter(|o| matches!(o, ArenaOutput::ShipDestroyed { .. }))
            .count();
        assert_eq!(deaths, 1);
        assert!(arena.kill_ship(id, DeathCause::Reported).is_empty());
        assert!(arena.registry().supply_count() >= 8);

        match arena.players_snapshot() {
            ServerMessage::UpdatePlayers(ships) => assert!(ships.is_empty()),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_loot_is_gone_within_lifetime() {
        let mut arena = arena();
        let id = arena.spawn_ship(owner("victim"));
        arena.kill_ship(id, DeathCause::Reported);
        assert!(arena.registry().supply_count() > 0);

        let mut flickered = false;
        let mut removed = false;
        let ticks = (FLICKER_AFTER_MS + REMOVE_AFTER_MS) / DT + 1;
        for _ in 0..ticks {
            for msg in broadcasts(&arena.tick(DT)) {
                match msg {
                    ServerMessage::FlickerSupplies { .. } => flickered = true,
                    ServerMessage::RemoveSupplies { .. } => removed = true,
                    _ => {}
                }
            }
        }

        assert!(flickered && removed);
        assert_eq!(arena.registry().supply_count(), 0);
        assert_eq!(arena.pending_timers(), 0);
        assert!(arena.take_counters().supplies_expired > 0);
    }

    #[test]
    fn test_commands_on_unknown_ship() {
        let mut arena = arena();
        let ghost = uuid::Uuid::new_v4();
        assert_eq!(arena.set_engine(ghost, true), Err(ArenaError::UnknownShip(ghost)));
        assert_eq!(arena.set_angle(ghost, 10.0), Err(ArenaError::UnknownShip(ghost)));
        assert!(arena.rotate_attachments(ghost, true).is_err());
        assert!(arena.detach_attachment(ghost, SlotLocation::Front).is_err());
    }

    #[test]
    fn test_set_angle_normalizes() {
        let mut arena = arena();
        let id = arena.spawn_ship(owner("a"));

        arena.set_angle(id, -90.0).expect("ship exists");
        assert_eq!(arena.ship(id).map(|s| s.rotation), Some(270.0));
        assert_eq!(arena.set_angle(id, f32::NAN), Err(ArenaError::InvalidAngle));
    }

    #[test]
    fn test_detach_and_throw() {
        let mut arena = arena();
        let id = arena.spawn_ship(owner("a"));

        assert_eq!(
            arena.detach_attachment(id, SlotLocation::Left),
            Err(ArenaError::EmptySlot(SlotLocation::Left))
        );

        let detached = arena.detach_attachment(id, SlotLocation::Front).expect("cannon");
        let thrown = arena.throw_attachment(id, SlotLocation::FrontRight).expect("gun");
        assert_eq!(arena.registry().floating_count(), 2);
        assert_eq!(arena.ship(id).map(|s| s.slots.len()), Some(1));
        assert_eq!(
            arena.registry().floating_attachment(thrown).map(|a| a.is_thrown),
            Some(true)
        );
        assert_eq!(
            arena.registry().floating_attachment(detached).map(|a| a.kind),
            Some(AttachmentKind::Cannon)
        );

        // Thrown attachment flies away from the ship
        for _ in 0..10 {
            arena.tick(DT);
        }
        let ship_location = arena.ship(id).map(|s| s.location).expect("ship");
        let thrown_location = arena
            .registry()
            .floating_attachment(thrown)
            .map(|a| a.transform.location)
            .expect("still floating");
        assert!(ship_location.distance_to(thrown_location) > 30.0);
    }

    #[test]
    fn test_rotation_uses_arena_clock() {
        let mut arena = arena();
        let id = arena.spawn_ship(owner("a"));

        assert_eq!(arena.rotate_attachments(id, true), Ok(true));
        assert_eq!(arena.rotate_attachments(id, true), Ok(false));

        for _ in 0..(ROTATION_DELAY_MS / DT + 1) {
            arena.tick(DT);
        }
        assert_eq!(arena.rotate_attachments(id, false), Ok(true));
    }

    /// Put a ship at rest at `location`, facing up
    fn place(arena: &mut Arena, id: ShipId, location: Vec2) {
        let ship = arena.registry.ship_mut(id).expect("ship");
        ship.location = location;
        ship.velocity = Vec2::ZERO;
        ship.rotation = 0.0;
        arena.physics.remove_body(BodyHandle::Ship(id));
        arena.physics.insert_body(
            BodyHandle::Ship(id),
            BodyDesc {
                location,
                velocity: Vec2::ZERO,
                rotation: 0.0,
                radius: SHIP_RADIUS,
            },
        );
    }

    #[test]
    fn test_cannon_shot_damages_ship_ahead() {
        use crate::game::constants::attachment::cannon::DAMAGE as CANNON_DAMAGE;
        use crate::game::constants::ship::MAX_INTEGRITY;

        let mut arena = arena();
        let shooter = arena.spawn_ship(owner("a"));
        let target = arena.spawn_ship(owner("b"));
        place(&mut arena, shooter, Vec2::new(1000.0, 1000.0));
        // Straight up the cannon's line of fire
        place(&mut arena, target, Vec2::new(1000.0, 880.0));

        arena.set_weapons(shooter, true).expect("ship exists");
        let mut outputs = Vec::new();
        for _ in 0..20 {
            outputs.extend(arena.tick(DT));
        }

        let hit = arena.ship(target).expect("target survives one shot");
        assert!((hit.integrity - (MAX_INTEGRITY - CANNON_DAMAGE)).abs() < 1e-3);

        let stats = arena.ship(shooter).map(|s| s.stats).expect("shooter");
        assert_eq!(stats.shots_landed, 1);
        assert!((stats.damage_dealt - CANNON_DAMAGE).abs() < 1e-3);
        assert!(broadcasts(&outputs)
            .iter()
            .any(|m| matches!(m, ServerMessage::Explosion { .. })));
    }
}
