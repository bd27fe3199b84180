//! Per-ship attachment ring
//!
//! Eight directional slots stored as a fixed array and addressed by
//! [`SlotLocation`] index. `back` is reserved for thrusters and never takes
//! part in rotation; the other seven positions form the rotating ring.

use smallvec::SmallVec;

use crate::game::attachment::{Attachment, SlotLocation, Transform};
use crate::game::constants::attachment::{ROTATION_DELAY_MS, SLOT_COUNT, THROW_FORCE};
use crate::util::vec2::Vec2;

/// Slots that rotate, in clockwise order starting at `front`
const RING: [SlotLocation; SLOT_COUNT - 1] = [
    SlotLocation::Front,
    SlotLocation::FrontRight,
    SlotLocation::Right,
    SlotLocation::BackRight,
    SlotLocation::BackLeft,
    SlotLocation::Left,
    SlotLocation::FrontLeft,
];

/// Attachments pushed out of their slot by an add
pub type Evicted = SmallVec<[Attachment; 1]>;

/// Rotation direction for [`AttachmentSlots::rotate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    AntiClockwise,
}

#[derive(Debug, Clone, Default)]
pub struct AttachmentSlots {
    slots: [Option<Attachment>; SLOT_COUNT],
    last_rotation_ms: Option<u64>,
}

impl AttachmentSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: SlotLocation) -> Option<&Attachment> {
        self.slots[location.index()].as_ref()
    }

    pub fn get_mut(&mut self, location: SlotLocation) -> Option<&mut Attachment> {
        self.slots[location.index()].as_mut()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupied slots in index order
    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Attachment> {
        self.slots.iter_mut().flatten()
    }

    /// Place an attachment. Never rejects: a thruster replaces whatever sits
    /// in `back`, anything else takes the first free ring slot clockwise from
    /// `front`, or evicts `front` when the ring is full.
    pub fn add(&mut self, mut attachment: Attachment) -> Evicted {
        let target = if attachment.kind.is_thruster() {
            SlotLocation::Back
        } else {
            RING.iter()
                .copied()
                .find(|loc| self.slots[loc.index()].is_none())
                .unwrap_or(SlotLocation::Front)
        };

        let mut evicted = Evicted::new();
        if let Some(mut previous) = self.slots[target.index()].take() {
            previous.location = None;
            evicted.push(previous);
        }

        attachment.location = Some(target);
        attachment.is_thrown = false;
        self.slots[target.index()] = Some(attachment);
        evicted
    }

    /// Cyclic shift of the ring by one position. Calls inside the debounce
    /// window after the last successful rotation are ignored.
    pub fn rotate(&mut self, direction: Rotation, now_ms: u64) -> bool {
        if let Some(last) = self.last_rotation_ms {
            if now_ms < last + ROTATION_DELAY_MS {
                return false;
            }
        }
        self.last_rotation_ms = Some(now_ms);

        let mut ring: [Option<Attachment>; SLOT_COUNT - 1] = Default::default();
        for (i, loc) in RING.iter().enumerate() {
            ring[i] = self.slots[loc.index()].take();
        }

        match direction {
            Rotation::Clockwise => ring.rotate_right(1),
            Rotation::AntiClockwise => ring.rotate_left(1),
        }

        for (i, loc) in RING.iter().enumerate() {
            let mut occupant = ring[i].take();
            if let Some(attachment) = occupant.as_mut() {
                attachment.location = Some(*loc);
            }
            self.slots[loc.index()] = occupant;
        }
        true
    }

    pub fn rotate_clockwise(&mut self, now_ms: u64) -> bool {
        self.rotate(Rotation::Clockwise, now_ms)
    }

    pub fn rotate_anticlockwise(&mut self, now_ms: u64) -> bool {
        self.rotate(Rotation::AntiClockwise, now_ms)
    }

    /// Detach the attachment at `location`, handing it the ship's transform
    pub fn remove_at(&mut self, location: SlotLocation, ship: Transform) -> Option<Attachment> {
        let mut attachment = self.slots[location.index()].take()?;
        attachment.location = None;
        attachment.transform = ship;
        Some(attachment)
    }

    /// Detach and launch the attachment along its heading
    pub fn throw_at(&mut self, location: SlotLocation, ship: Transform) -> Option<Attachment> {
        let heading = self
            .get(location)
            .map(|attachment| attachment.heading(ship.rotation))?;
        let mut attachment = self.remove_at(location, ship)?;
        attachment.transform.velocity += Vec2::from_heading(heading) * THROW_FORCE;
        attachment.transform.rotation = heading;
        attachment.is_thrown = true;
        Some(attachment)
    }
}
