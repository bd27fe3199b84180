use rand::Rng;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::game::map::MapHandle;
use crate::game::scheduler::TierThresholds;
use crate::lobby::identity::IdentityKey;
use crate::lobby::room::{Room, RoomError, RoomId, RoomInfo};

/// Parameters for rooms created on demand
#[derive(Debug, Clone, Copy)]
pub struct RoomSettings {
    /// Soft limit; crossing it is logged, never refused
    pub max_rooms: usize,
    pub capacity: usize,
    pub map_width: f32,
    pub map_height: f32,
    pub thresholds: TierThresholds,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for RoomSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_rooms: config.max_rooms,
            capacity: config.room_capacity,
            map_width: config.map_width,
            map_height: config.map_height,
            thresholds: TierThresholds::from(config),
        }
    }
}

/// Outcome of a room assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub room_id: RoomId,
    pub name: String,
    pub members: usize,
    pub capacity: usize,
    /// The room was created for this request
    pub created: bool,
}

/// Owns every arena, in creation order
pub struct ArenaManager {
    rooms: Vec<Room>,
    settings: RoomSettings,
    rooms_created: usize,
}

impl ArenaManager {
    pub fn new(settings: RoomSettings) -> Self {
        Self {
            rooms: Vec::new(),
            settings,
            rooms_created: 0,
        }
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    fn create_room(&mut self) -> usize {
        if self.rooms.len() >= self.settings.max_rooms {
            warn!(
                "Room count {} is at the configured limit of {}, opening another",
                self.rooms.len(),
                self.settings.max_rooms
            );
        }

        self.rooms_created += 1;
        let map = MapHandle::new(
            rand::thread_rng().gen(),
            self.settings.map_width,
            self.settings.map_height,
        );
        let room = Room::new(
            format!("Arena {}", self.rooms_created),
            self.settings.capacity,
            map,
            self.settings.thresholds,
        );
        info!("Created room {} ({})", room.name, room.id);
        self.rooms.push(room);
        self.rooms.len() - 1
    }

    /// More rooms are open than `max_rooms` allows for
    pub fn over_limit(&self) -> bool {
        self.rooms.len() > self.settings.max_rooms
    }

    /// Place an identity in a room. An identity already bound to a live room
    /// goes back to it; otherwise the first room with spare capacity wins and
    /// a new room is created when all are full, even past `max_rooms`.
    pub fn assign(
        &mut self,
        key: &IdentityKey,
        identity_room: Option<RoomId>,
    ) -> Result<Assignment, ManagerError> {
        let bound = identity_room.and_then(|id| self.index_of(id));
        let existing = self.rooms.iter().position(|r| r.has_member(key));

        let (index, created) = match bound.or(existing) {
            Some(index) => (index, false),
            None => match self.rooms.iter().position(|r| !r.is_full()) {
                Some(index) => (index, false),
                None => (self.create_room(), true),
            },
        };

        let room = &mut self.rooms[index];
        room.try_admit(key)?;
        Ok(Assignment {
            room_id: room.id,
            name: room.name.clone(),
            members: room.member_count(),
            capacity: room.capacity,
            created,
        })
    }

    fn index_of(&self, room_id: RoomId) -> Option<usize> {
        self.rooms.iter().position(|r| r.id == room_id)
    }

    pub fn get(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    pub fn get_mut(&mut self, room_id: RoomId) -> Option<&mut Room> {
        self.rooms.iter_mut().find(|r| r.id == room_id)
    }

    /// Drop an identity's membership
    pub fn release(&mut self, key: &IdentityKey, room_id: RoomId) -> bool {
        self.get_mut(room_id).is_some_and(|room| room.release(key))
    }

    /// Tear down rooms with no members and no ships
    pub fn remove_empty_rooms(&mut self) -> Vec<RoomId> {
        let mut removed = Vec::new();
        self.rooms.retain(|room| {
            if room.is_idle() {
                info!("Removing idle room {} ({})", room.name, room.id);
                removed.push(room.id);
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Mutable slice for ticking arenas in parallel
    pub fn rooms_mut(&mut self) -> &mut [Room] {
        &mut self.rooms
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn list(&self) -> Vec<RoomInfo> {
        self.rooms.iter().map(Room::info).collect()
    }

    pub fn shutdown_all_rooms(&mut self) -> usize {
        let count = self.rooms.len();
        self.rooms.clear();
        count
    }
}

impl Default for ArenaManager {
    fn default() -> Self {
        Self::new(RoomSettings::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagerError {
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room error: {0}")]
    RoomError(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn manager(max_rooms: usize, capacity: usize) -> ArenaManager {
        ArenaManager::new(RoomSettings {
            max_rooms,
            capacity,
            map_width: 1000.0,
            map_height: 1000.0,
            thresholds: TierThresholds::default(),
        })
    }

    fn member(n: u32) -> IdentityKey {
        IdentityKey::new(format!("fp-{n}"), format!("P{n}"))
    }

    #[test]
    fn test_first_assignment_creates_room() {
        let mut manager = manager(10, 4);

        let assignment = manager.assign(&member(1), None).expect("assigned");
        assert!(assignment.created);
        assert_eq!(assignment.name, "Arena 1");
        assert_eq!(manager.room_count(), 1);
    }

    #[test]
    fn test_fifth_member_opens_new_room() {
        let mut manager = manager(10, 4);

        let first = manager.assign(&member(1), None).expect("assigned").room_id;
        for n in 2..=4 {
            assert_eq!(manager.assign(&member(n), None).map(|a| a.room_id), Ok(first));
        }

        let fifth = manager.assign(&member(5), None).expect("assigned");
        assert_ne!(fifth.room_id, first);
        assert!(fifth.created);
        assert_eq!(fifth.name, "Arena 2");
        assert_eq!(manager.room_count(), 2);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut manager = manager(100, 3);
        for n in 0..50 {
            manager.assign(&member(n), None).expect("assigned");
        }
        assert!(manager.list().iter().all(|r| r.members <= r.capacity));
        assert_eq!(manager.room_count(), 17);
    }

    #[test]
    fn test_join_twice_same_room() {
        let mut manager = manager(10, 4);

        let a = manager.assign(&member(1), None).expect("assigned");
        let b = manager.assign(&member(1), None).expect("assigned");
        assert_eq!(a.room_id, b.room_id);
        assert_eq!(b.members, 1);
    }

    #[test]
    fn test_bound_room_bypasses_scan() {
        let mut manager = manager(10, 1);
        let first = manager.assign(&member(1), None).expect("assigned").room_id;
        manager.assign(&member(2), None).expect("assigned");

        // Full room still takes back its own member
        let again = manager.assign(&member(1), Some(first)).expect("assigned");
        assert_eq!(again.room_id, first);
    }

    #[test]
    fn test_stale_bound_room_falls_back_to_scan() {
        let mut manager = manager(10, 4);
        let assignment = manager.assign(&member(1), Some(Uuid::new_v4())).expect("assigned");
        assert!(assignment.created);
    }

    #[test]
    fn test_max_rooms_is_a_soft_limit() {
        let mut manager = manager(1, 4);
        for n in 1..=4 {
            manager.assign(&member(n), None).expect("assigned");
        }
        assert!(!manager.over_limit());

        let fifth = manager.assign(&member(5), None).expect("fifth member still gets a room");
        assert!(fifth.created);
        assert_eq!(fifth.name, "Arena 2");
        assert_eq!(manager.room_count(), 2);
        assert!(manager.over_limit());
        assert!(manager.list().iter().all(|r| r.members <= r.capacity));
    }

    #[test]
    fn test_remove_empty_rooms() {
        let mut manager = manager(10, 4);
        let room_id = manager.assign(&member(1), None).expect("assigned").room_id;

        assert!(manager.remove_empty_rooms().is_empty());
        assert!(manager.release(&member(1), room_id));
        assert_eq!(manager.remove_empty_rooms(), vec![room_id]);
        assert!(manager.get(room_id).is_none());
    }
}
