use std::time::Instant;

use hashbrown::HashSet;
use uuid::Uuid;

use crate::game::arena::Arena;
use crate::game::map::MapHandle;
use crate::game::scheduler::TierThresholds;
use crate::lobby::identity::IdentityKey;

pub type RoomId = Uuid;

/// A capacity-bounded arena and the identities admitted to it
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: usize,
    pub created_at: Instant,
    members: HashSet<IdentityKey>,
    pub arena: Arena,
}

impl Room {
    pub fn new(name: String, capacity: usize, map: MapHandle, thresholds: TierThresholds) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            capacity,
            created_at: Instant::now(),
            members: HashSet::new(),
            arena: Arena::new(map, thresholds),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn has_member(&self, key: &IdentityKey) -> bool {
        self.members.contains(key)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    /// No members and no ships left; safe to tear down
    pub fn is_idle(&self) -> bool {
        self.members.is_empty() && self.arena.registry().ship_count() == 0
    }

    /// Admit an identity. Returns `Ok(false)` if it was already a member.
    pub fn try_admit(&mut self, key: &IdentityKey) -> Result<bool, RoomError> {
        if self.members.contains(key) {
            return Ok(false);
        }
        if self.is_full() {
            return Err(RoomError::RoomFull);
        }
        self.members.insert(key.clone());
        Ok(true)
    }

    pub fn release(&mut self, key: &IdentityKey) -> bool {
        self.members.remove(key)
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            name: self.name.clone(),
            members: self.member_count(),
            capacity: self.capacity,
            ships: self.arena.registry().ship_count(),
        }
    }

    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// Room information for listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub id: RoomId,
    pub name: String,
    pub members: usize,
    pub capacity: usize,
    pub ships: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,
}
