//! Per-arena entity registry
//!
//! Owned by its [`Arena`](crate::game::arena::Arena), so it can never outlive
//! it. Removal is idempotent: removing an absent id returns `None` and changes
//! nothing, which is what lets duplicated or late events resolve safely.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::game::attachment::{Attachment, AttachmentId};
use crate::game::state::{Bullet, BulletId, Ship, ShipId, Supply, SupplyId};
use crate::game::timers::TimerHandle;

/// An attachment drifting free, with its pending grace/expiry timers
#[derive(Debug, Clone)]
pub struct FloatingAttachment {
    pub attachment: Attachment,
    pub timers: SmallVec<[TimerHandle; 2]>,
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    ships: HashMap<ShipId, Ship>,
    supplies: HashMap<SupplyId, Supply>,
    bullets: HashMap<BulletId, Bullet>,
    floating: HashMap<AttachmentId, FloatingAttachment>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // === Ships ===

    pub fn add_ship(&mut self, ship: Ship) -> ShipId {
        let id = ship.id;
        self.ships.insert(id, ship);
        id
    }

    pub fn remove_ship(&mut self, id: ShipId) -> Option<Ship> {
        self.ships.remove(&id)
    }

    pub fn ship(&self, id: ShipId) -> Option<&Ship> {
        self.ships.get(&id)
    }

    pub fn ship_mut(&mut self, id: ShipId) -> Option<&mut Ship> {
        self.ships.get_mut(&id)
    }

    pub fn has_ship(&self, id: ShipId) -> bool {
        self.ships.contains_key(&id)
    }

    /// Ships ordered by id, for stable snapshots
    pub fn ships(&self) -> Vec<&Ship> {
        let mut ships: Vec<&Ship> = self.ships.values().collect();
        ships.sort_unstable_by_key(|s| s.id);
        ships
    }

    pub fn ships_mut(&mut self) -> impl Iterator<Item = &mut Ship> {
        self.ships.values_mut()
    }

    pub fn ship_ids(&self) -> Vec<ShipId> {
        let mut ids: Vec<ShipId> = self.ships.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn ship_count(&self) -> usize {
        self.ships.len()
    }

    // === Supplies ===

    pub fn add_supply(&mut self, supply: Supply) -> SupplyId {
        let id = supply.id;
        self.supplies.insert(id, supply);
        id
    }

    pub fn remove_supply(&mut self, id: SupplyId) -> Option<Supply> {
        self.supplies.remove(&id)
    }

    pub fn supply(&self, id: SupplyId) -> Option<&Supply> {
        self.supplies.get(&id)
    }

    pub fn supply_mut(&mut self, id: SupplyId) -> Option<&mut Supply> {
        self.supplies.get_mut(&id)
    }

    pub fn supplies(&self) -> Vec<&Supply> {
        let mut supplies: Vec<&Supply> = self.supplies.values().collect();
        supplies.sort_unstable_by_key(|s| s.id);
        supplies
    }

    pub fn supplies_mut(&mut self) -> impl Iterator<Item = &mut Supply> {
        self.supplies.values_mut()
    }

    pub fn supply_count(&self) -> usize {
        self.supplies.len()
    }

    // === Bullets ===

    pub fn add_bullet(&mut self, bullet: Bullet) -> BulletId {
        let id = bullet.id;
        self.bullets.insert(id, bullet);
        id
    }

    pub fn remove_bullet(&mut self, id: BulletId) -> Option<Bullet> {
        self.bullets.remove(&id)
    }

    pub fn bullet(&self, id: BulletId) -> Option<&Bullet> {
        self.bullets.get(&id)
    }

    pub fn bullet_mut(&mut self, id: BulletId) -> Option<&mut Bullet> {
        self.bullets.get_mut(&id)
    }

    pub fn bullets(&self) -> impl Iterator<Item = &Bullet> {
        self.bullets.values()
    }

    pub fn bullets_mut(&mut self) -> impl Iterator<Item = &mut Bullet> {
        self.bullets.values_mut()
    }

    pub fn bullet_count(&self) -> usize {
        self.bullets.len()
    }

    /// Ids of bullets whose lifetime ended at or before `now_ms`
    pub fn expired_bullets(&self, now_ms: u64) -> Vec<BulletId> {
        self.bullets
            .values()
            .filter(|b| b.expires_at_ms <= now_ms)
            .map(|b| b.id)
            .collect()
    }

    // === Floating attachments ===

    pub fn add_floating(&mut self, floating: FloatingAttachment) -> AttachmentId {
        let id = floating.attachment.id;
        self.floating.insert(id, floating);
        id
    }

    pub fn remove_floating(&mut self, id: AttachmentId) -> Option<FloatingAttachment> {
        self.floating.remove(&id)
    }

    pub fn floating_attachment(&self, id: AttachmentId) -> Option<&Attachment> {
        self.floating.get(&id).map(|f| &f.attachment)
    }

    pub fn floating_attachment_mut(&mut self, id: AttachmentId) -> Option<&mut Attachment> {
        self.floating.get_mut(&id).map(|f| &mut f.attachment)
    }

    /// Floating attachments ordered by id
    pub fn floating(&self) -> Vec<&Attachment> {
        let mut floating: Vec<&Attachment> = self.floating.values().map(|f| &f.attachment).collect();
        floating.sort_unstable_by_key(|a| a.id);
        floating
    }

    pub fn floating_mut(&mut self) -> impl Iterator<Item = &mut Attachment> {
        self.floating.values_mut().map(|f| &mut f.attachment)
    }

    pub fn floating_count(&self) -> usize {
        self.floating.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
            && self.supplies.is_empty()
            && self.bullets.is_empty()
            && self.floating.is_empty()
    }
}
