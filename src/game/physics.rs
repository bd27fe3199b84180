//! Rigid-body service boundary
//!
//! The arena never integrates motion itself. It talks to a [`PhysicsService`]
//! through a narrow interface and reacts to the collision events it drains.
//! [`KinematicWorld`] is the in-process implementation: Euler integration
//! with drag, map bounds and contact-begin overlap detection.

use hashbrown::{HashMap, HashSet};

use crate::game::attachment::AttachmentId;
use crate::game::constants::sim::{DRAG, MAX_VELOCITY};
use crate::game::map::MapHandle;
use crate::game::spatial::{SpatialEntry, SpatialGrid};
use crate::game::state::{BulletId, ShipId, SupplyId};
use crate::util::vec2::Vec2;

/// Identifies a body registered with the physics service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BodyHandle {
    Ship(ShipId),
    Bullet(BulletId),
    Supply(SupplyId),
    Attachment(AttachmentId),
}

/// Initial state of a body
#[derive(Debug, Clone, Copy)]
pub struct BodyDesc {
    pub location: Vec2,
    pub velocity: Vec2,
    pub rotation: f32,
    pub radius: f32,
}

/// Collision events reported to the combat resolver
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collision {
    BulletShip { bullet: BulletId, ship: ShipId },
    BulletMap { bullet: BulletId },
    ShipSupply { ship: ShipId, supply: SupplyId },
    ShipShip { a: ShipId, b: ShipId, relative_speed: f32 },
    ShipAttachment { ship: ShipId, attachment: AttachmentId },
}

/// Narrow interface to the rigid-body simulation
pub trait PhysicsService: Send {
    fn insert_body(&mut self, handle: BodyHandle, body: BodyDesc);

    /// Returns false if the body was not registered
    fn remove_body(&mut self, handle: BodyHandle) -> bool;

    /// Replace a body's velocity
    fn apply_velocity(&mut self, handle: BodyHandle, velocity: Vec2) -> bool;

    fn location(&self, handle: BodyHandle) -> Option<Vec2>;

    fn velocity(&self, handle: BodyHandle) -> Option<Vec2>;

    fn rotation(&self, handle: BodyHandle) -> Option<f32>;

    fn set_rotation(&mut self, handle: BodyHandle, degrees: f32) -> bool;

    /// Advance the simulation by `dt_ms`
    fn step(&mut self, dt_ms: u64);

    /// Collision events produced since the last drain
    fn drain_collisions(&mut self) -> Vec<Collision>;

    fn body_count(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Body {
    location: Vec2,
    velocity: Vec2,
    rotation: f32,
    radius: f32,
}

/// Minimal kinematic stand-in for a rigid-body engine
#[derive(Debug)]
pub struct KinematicWorld {
    map: MapHandle,
    bodies: HashMap<BodyHandle, Body>,
    /// Pairs currently overlapping, ordered (lo, hi)
    contacts: HashSet<(BodyHandle, BodyHandle)>,
    grid: SpatialGrid,
    events: Vec<Collision>,
}

impl KinematicWorld {
    pub fn new(map: MapHandle) -> Self {
        Self {
            map,
            bodies: HashMap::new(),
            contacts: HashSet::new(),
            grid: SpatialGrid::default(),
            events: Vec::new(),
        }
    }

    fn ordered(a: BodyHandle, b: BodyHandle) -> (BodyHandle, BodyHandle) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    fn overlaps(a: &Body, b: &Body) -> bool {
        let reach = a.radius + b.radius;
        a.location.distance_sq_to(b.location) <= reach * reach
    }

    /// Classify a pair into a collision event, if the pair is one the
    /// resolver cares about
    fn classify(&self, a: BodyHandle, b: BodyHandle) -> Option<Collision> {
        use BodyHandle::*;
        match (a, b) {
            (Bullet(bullet), Ship(ship)) | (Ship(ship), Bullet(bullet)) => {
                Some(Collision::BulletShip { bullet, ship })
            }
            (Ship(ship), Supply(supply)) | (Supply(supply), Ship(ship)) => {
                Some(Collision::ShipSupply { ship, supply })
            }
            (Ship(ship), Attachment(attachment)) | (Attachment(attachment), Ship(ship)) => {
                Some(Collision::ShipAttachment { ship, attachment })
            }
            (Ship(first), Ship(second)) => {
                let va = self.bodies.get(&a)?.velocity;
                let vb = self.bodies.get(&b)?.velocity;
                Some(Collision::ShipShip {
                    a: first,
                    b: second,
                    relative_speed: (va - vb).length(),
                })
            }
            _ => None,
        }
    }

    fn rebuild_grid(&mut self) {
        self.grid.clear();
        for (handle, body) in &self.bodies {
            self.grid.insert(SpatialEntry {
                handle: *handle,
                position: body.location,
                radius: body.radius,
            });
        }
    }
}

impl PhysicsService for KinematicWorld {
    fn insert_body(&mut self, handle: BodyHandle, body: BodyDesc) {
        let body = Body {
            location: body.location,
            velocity: body.velocity.clamp_length(MAX_VELOCITY),
            rotation: body.rotation,
            radius: body.radius,
        };

        // Bodies already touching at insertion are not a new contact
        for (other_handle, other) in &self.bodies {
            if *other_handle != handle && Self::overlaps(&body, other) {
                self.contacts.insert(Self::ordered(handle, *other_handle));
            }
        }
        self.bodies.insert(handle, body);
    }

    fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.contacts.retain(|(a, b)| *a != handle && *b != handle);
        self.bodies.remove(&handle).is_some()
    }

    fn apply_velocity(&mut self, handle: BodyHandle, velocity: Vec2) -> bool {
        match self.bodies.get_mut(&handle) {
            Some(body) if velocity.is_finite() => {
                body.velocity = velocity.clamp_length(MAX_VELOCITY);
                true
            }
            _ => false,
        }
    }

    fn location(&self, handle: BodyHandle) -> Option<Vec2> {
        self.bodies.get(&handle).map(|b| b.location)
    }

    fn velocity(&self, handle: BodyHandle) -> Option<Vec2> {
        self.bodies.get(&handle).map(|b| b.velocity)
    }

    fn rotation(&self, handle: BodyHandle) -> Option<f32> {
        self.bodies.get(&handle).map(|b| b.rotation)
    }

    fn set_rotation(&mut self, handle: BodyHandle, degrees: f32) -> bool {
        match self.bodies.get_mut(&handle) {
            Some(body) => {
                body.rotation = degrees;
                true
            }
            None => false,
        }
    }

    fn step(&mut self, dt_ms: u64) {
        let dt = dt_ms as f32 / 1000.0;
        let drag_factor = (1.0 - DRAG * dt).max(0.0);
        let map = self.map;
        let mut left_map = Vec::new();

        for (handle, body) in self.bodies.iter_mut() {
            // Bullets fly straight; everything else slows down
            if !matches!(handle, BodyHandle::Bullet(_)) {
                body.velocity *= drag_factor;
            }
            body.velocity = body.velocity.clamp_length(MAX_VELOCITY);
            body.location += body.velocity * dt;

            if !map.contains(body.location, body.radius) {
                match handle {
                    BodyHandle::Bullet(id) => left_map.push(*id),
                    _ => {
                        let (hit_x, hit_y) = map.clamp(&mut body.location, body.radius);
                        if hit_x {
                            body.velocity.x = 0.0;
                        }
                        if hit_y {
                            body.velocity.y = 0.0;
                        }
                    }
                }
            }
        }

        for bullet in left_map {
            self.events.push(Collision::BulletMap { bullet });
        }

        self.rebuild_grid();

        let mut touching = HashSet::with_capacity(self.contacts.len());
        let bodies = &self.bodies;
        self.grid.for_each_potential_pair(|a, b| {
            if a.handle == b.handle {
                return;
            }
            if let (Some(body_a), Some(body_b)) = (bodies.get(&a.handle), bodies.get(&b.handle)) {
                if Self::overlaps(body_a, body_b) {
                    touching.insert(Self::ordered(a.handle, b.handle));
                }
            }
        });

        let mut began: Vec<(BodyHandle, BodyHandle)> = touching
            .iter()
            .filter(|pair| !self.contacts.contains(*pair))
            .copied()
            .collect();
        // Deterministic event order within a step
        began.sort_unstable();

        for (a, b) in began {
            if let Some(event) = self.classify(a, b) {
                self.events.push(event);
            }
        }
        self.contacts = touching;
    }

    fn drain_collisions(&mut self) -> Vec<Collision> {
        std::mem::take(&mut self.events)
    }

    fn body_count(&self) -> usize {
        self.bodies.len()
    }
}
