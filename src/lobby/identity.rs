//! Identity table
//!
//! Maps a client identity (fingerprint + display name) to its current
//! connection, room and ship. Identities outlive connections: when a
//! connection drops, an expiry timer is armed and a reconnect within the
//! grace period cancels it and keeps the bindings.

use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::game::constants::identity::{MAX_FINGERPRINT_LEN, MAX_NAME_LEN};
use crate::game::state::ShipId;
use crate::game::timers::{TimerHandle, TimerQueue};
use crate::lobby::room::RoomId;
use crate::util::vec2::Vec2;

/// Transport connection handle
pub type ConnectionId = u64;

/// Unique (fingerprint, display name) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityKey {
    pub fingerprint: String,
    pub name: String,
}

impl IdentityKey {
    pub fn new(fingerprint: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            name: name.into(),
        }
    }

    /// Validate a raw fingerprint and sanitize a raw display name
    pub fn parse(fingerprint: &str, name: &str) -> Result<Self, IdentityError> {
        let fingerprint = fingerprint.trim();
        let len = fingerprint.chars().count();
        if len == 0
            || len > MAX_FINGERPRINT_LEN
            || fingerprint.chars().any(|c| c.is_control() || c.is_whitespace())
        {
            return Err(IdentityError::InvalidFingerprint);
        }

        let name = sanitize_name(name);
        if name.is_empty() {
            return Err(IdentityError::InvalidName);
        }

        Ok(Self::new(fingerprint, name))
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.fingerprint)
    }
}

/// Trim, drop control characters and markup, collapse whitespace, cap length
pub fn sanitize_name(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | '&'))
        .collect();
    let collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_NAME_LEN).collect();
    truncated.trim_end().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Fingerprint must be 1 to 64 printable characters")]
    InvalidFingerprint,
    #[error("Name must contain at least one printable character")]
    InvalidName,
    #[error("Name '{0}' is already taken")]
    NameTaken(String),
    #[error("Unknown identity {0}")]
    Unknown(IdentityKey),
}

#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub key: IdentityKey,
    pub connection: Option<ConnectionId>,
    pub room: Option<RoomId>,
    pub ship: Option<ShipId>,
    expiry: Option<TimerHandle>,
}

impl IdentityRecord {
    fn new(key: IdentityKey, connection: ConnectionId) -> Self {
        Self {
            key,
            connection: Some(connection),
            room: None,
            ship: None,
            expiry: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn expiry_pending(&self) -> bool {
        self.expiry.is_some()
    }
}

/// Result of binding a connection to an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    /// Existing identity; `previous` is the connection it replaced, if any
    Reconnected { previous: Option<ConnectionId> },
}

/// An identity removed after its grace period ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredIdentity {
    pub key: IdentityKey,
    pub room: Option<RoomId>,
    pub ship: Option<ShipId>,
}

/// Ship destroyed while its owner was away
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tombstone {
    pub ship_id: ShipId,
    pub location: Vec2,
    pub rotation: f32,
}

#[derive(Debug, Clone)]
enum IdentityTimer {
    Expire(IdentityKey),
    DropTombstone(IdentityKey),
}

pub struct IdentityTable {
    records: HashMap<IdentityKey, IdentityRecord>,
    /// display name -> fingerprint of the live identity holding it
    names: HashMap<String, String>,
    connections: HashMap<ConnectionId, IdentityKey>,
    tombstones: HashMap<IdentityKey, (Tombstone, TimerHandle)>,
    timers: TimerQueue<IdentityTimer>,
    expiry_ms: u64,
}

impl IdentityTable {
    pub fn new(expiry_ms: u64) -> Self {
        Self {
            records: HashMap::new(),
            names: HashMap::new(),
            connections: HashMap::new(),
            tombstones: HashMap::new(),
            timers: TimerQueue::new(),
            expiry_ms,
        }
    }

    pub fn expiry_ms(&self) -> u64 {
        self.expiry_ms
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn connected_count(&self) -> usize {
        self.connections.len()
    }

    pub fn resolve(&self, fingerprint: &str, name: &str) -> Option<&IdentityRecord> {
        self.records
            .get(&IdentityKey::new(fingerprint, sanitize_name(name)))
    }

    pub fn get(&self, key: &IdentityKey) -> Option<&IdentityRecord> {
        self.records.get(key)
    }

    pub fn for_connection(&self, connection: ConnectionId) -> Option<&IdentityRecord> {
        self.connections
            .get(&connection)
            .and_then(|key| self.records.get(key))
    }

    /// Bind `connection` to `key`, creating the identity on first sight
    pub fn upsert(
        &mut self,
        key: &IdentityKey,
        connection: ConnectionId,
        now_ms: u64,
    ) -> Result<Upsert, IdentityError> {
        if !self.records.contains_key(key) {
            if let Some(holder) = self.names.get(&key.name) {
                if *holder != key.fingerprint {
                    return Err(IdentityError::NameTaken(key.name.clone()));
                }
            }
        }

        // A connection switching identities leaves the old one to expire
        if let Some(other) = self.connections.get(&connection).cloned() {
            if other != *key {
                self.detach(&other, connection, now_ms);
            }
        }

        let result = match self.records.get_mut(key) {
            Some(record) => {
                if let Some(handle) = record.expiry.take() {
                    self.timers.cancel(handle);
                }
                let previous = record.connection.replace(connection);
                if let Some(previous) = previous.filter(|p| *p != connection) {
                    self.connections.remove(&previous);
                }
                Upsert::Reconnected { previous }
            }
            None => {
                self.records
                    .insert(key.clone(), IdentityRecord::new(key.clone(), connection));
                self.names.insert(key.name.clone(), key.fingerprint.clone());
                Upsert::Created
            }
        };

        self.connections.insert(connection, key.clone());
        Ok(result)
    }

    /// Arm the expiry timer; a pending timer is left untouched
    pub fn schedule_expiry(&mut self, key: &IdentityKey, now_ms: u64) -> bool {
        let Some(record) = self.records.get_mut(key) else {
            return false;
        };
        if record.expiry.is_some() {
            return false;
        }
        let handle = self
            .timers
            .schedule(now_ms + self.expiry_ms, IdentityTimer::Expire(key.clone()));
        record.expiry = Some(handle);
        true
    }

    pub fn cancel_expiry(&mut self, key: &IdentityKey) -> bool {
        match self.records.get_mut(key).and_then(|r| r.expiry.take()) {
            Some(handle) => self.timers.cancel(handle),
            None => false,
        }
    }

    /// Handle a closed connection. Connections already replaced by a newer
    /// one are ignored.
    pub fn disconnect(&mut self, connection: ConnectionId, now_ms: u64) -> Option<IdentityKey> {
        let key = self.connections.get(&connection)?.clone();
        self.detach(&key, connection, now_ms);
        Some(key)
    }

    fn detach(&mut self, key: &IdentityKey, connection: ConnectionId, now_ms: u64) {
        self.connections.remove(&connection);
        let is_current = self
            .records
            .get(key)
            .is_some_and(|r| r.connection == Some(connection));
        if is_current {
            if let Some(record) = self.records.get_mut(key) {
                record.connection = None;
            }
            self.schedule_expiry(key, now_ms);
        }
    }

    /// Remove identities whose grace period ran out; also drops stale tombstones
    pub fn poll_expired(&mut self, now_ms: u64) -> Vec<ExpiredIdentity> {
        let mut expired = Vec::new();
        for timer in self.timers.poll(now_ms) {
            match timer {
                IdentityTimer::Expire(key) => {
                    let Some(record) = self.records.remove(&key) else {
                        continue;
                    };
                    if self.names.get(&key.name) == Some(&key.fingerprint) {
                        self.names.remove(&key.name);
                    }
                    expired.push(ExpiredIdentity {
                        key,
                        room: record.room,
                        ship: record.ship,
                    });
                }
                IdentityTimer::DropTombstone(key) => {
                    self.tombstones.remove(&key);
                }
            }
        }
        expired
    }

    /// Remember a ship destroyed on expiry for one more grace period
    pub fn add_tombstone(&mut self, key: IdentityKey, tombstone: Tombstone, now_ms: u64) {
        let handle = self.timers.schedule(
            now_ms + self.expiry_ms,
            IdentityTimer::DropTombstone(key.clone()),
        );
        if let Some((_, old)) = self.tombstones.insert(key, (tombstone, handle)) {
            self.timers.cancel(old);
        }
    }

    pub fn take_tombstone(&mut self, key: &IdentityKey) -> Option<Tombstone> {
        let (tombstone, handle) = self.tombstones.remove(key)?;
        self.timers.cancel(handle);
        Some(tombstone)
    }

    pub fn bind_room(&mut self, key: &IdentityKey, room: RoomId) -> Result<(), IdentityError> {
        self.record_mut(key)?.room = Some(room);
        Ok(())
    }

    pub fn bind_ship(&mut self, key: &IdentityKey, ship: ShipId) -> Result<(), IdentityError> {
        self.record_mut(key)?.ship = Some(ship);
        Ok(())
    }

    /// Clear the ship binding if it still points at `ship`
    pub fn clear_ship(&mut self, key: &IdentityKey, ship: ShipId) -> bool {
        match self.records.get_mut(key) {
            Some(record) if record.ship == Some(ship) => {
                record.ship = None;
                true
            }
            _ => false,
        }
    }

    /// Drop ship bindings in `room` whose ship no longer exists.
    /// Returns the number of repaired mappings.
    pub fn sweep(&mut self, room: RoomId, ship_exists: impl Fn(ShipId) -> bool) -> usize {
        let mut repaired = 0;
        for record in self.records.values_mut() {
            if record.room != Some(room) {
                continue;
            }
            if let Some(ship) = record.ship {
                if !ship_exists(ship) {
                    record.ship = None;
                    repaired += 1;
                }
            }
        }
        repaired
    }

    /// Identities bound to `room`
    pub fn members_of(&self, room: RoomId) -> impl Iterator<Item = &IdentityRecord> {
        self.records.values().filter(move |r| r.room == Some(room))
    }

    fn record_mut(&mut self, key: &IdentityKey) -> Result<&mut IdentityRecord, IdentityError> {
        self.records
            .get_mut(key)
            .ok_or_else(|| IdentityError::Unknown(key.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const EXPIRY: u64 = 30_000;

    fn key(fp: &str, name: &str) -> IdentityKey {
        IdentityKey::new(fp, name)
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  Alice  "), "Alice");
        assert_eq!(sanitize_name("<b>Bob</b>"), "bBob/b");
        assert_eq!(sanitize_name("a \t\n  b"), "a b");
        assert_eq!(sanitize_name("abcdefghijklmnopqrstuvwxyz"), "abcdefghijklmnop");
        assert_eq!(sanitize_name("\u{7}\u{1b}"), "");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(
            IdentityKey::parse("", "Alice"),
            Err(IdentityError::InvalidFingerprint)
        );
        assert_eq!(
            IdentityKey::parse(&"f".repeat(65), "Alice"),
            Err(IdentityError::InvalidFingerprint)
        );
        assert_eq!(
            IdentityKey::parse("fp 1", "Alice"),
            Err(IdentityError::InvalidFingerprint)
        );
        assert_eq!(IdentityKey::parse("fp", "  <>  "), Err(IdentityError::InvalidName));
        assert_eq!(IdentityKey::parse("fp", " Alice "), Ok(key("fp", "Alice")));
    }

    #[test]
    fn test_create_and_resolve() {
        let mut table = IdentityTable::new(EXPIRY);
        let alice = key("fp-a", "Alice");

        assert_eq!(table.upsert(&alice, 1, 0), Ok(Upsert::Created));
        let record = table.resolve("fp-a", " Alice").expect("created");
        assert_eq!(record.connection, Some(1));
        assert_eq!(table.for_connection(1).map(|r| &r.key), Some(&alice));
    }

    #[test]
    fn test_name_taken_by_live_identity() {
        let mut table = IdentityTable::new(EXPIRY);
        table.upsert(&key("fp-a", "Alice"), 1, 0).expect("first");

        assert_eq!(
            table.upsert(&key("fp-b", "Alice"), 2, 0),
            Err(IdentityError::NameTaken("Alice".into()))
        );

        // Still taken while inside the grace window
        table.disconnect(1, 0);
        assert!(table.upsert(&key("fp-b", "Alice"), 2, 100).is_err());

        // Free once expired
        assert_eq!(table.poll_expired(EXPIRY).len(), 1);
        assert_eq!(table.upsert(&key("fp-b", "Alice"), 2, EXPIRY), Ok(Upsert::Created));
    }

    #[test]
    fn test_reconnect_cancels_expiry_and_keeps_bindings() {
        let mut table = IdentityTable::new(EXPIRY);
        let alice = key("fp-a", "Alice");
        let room = Uuid::new_v4();
        let ship = Uuid::new_v4();

        table.upsert(&alice, 1, 0).expect("create");
        table.bind_room(&alice, room).expect("bound");
        table.bind_ship(&alice, ship).expect("bound");

        assert_eq!(table.disconnect(1, 1_000), Some(alice.clone()));
        assert!(table.get(&alice).is_some_and(|r| r.expiry_pending()));

        assert_eq!(
            table.upsert(&alice, 2, 5_000),
            Ok(Upsert::Reconnected { previous: None })
        );
        assert!(table.poll_expired(1_000 + EXPIRY).is_empty());

        let record = table.get(&alice).expect("kept");
        assert_eq!(record.room, Some(room));
        assert_eq!(record.ship, Some(ship));
        assert!(!record.expiry_pending());
    }

    #[test]
    fn test_cancel_expiry_is_idempotent() {
        let mut table = IdentityTable::new(EXPIRY);
        let alice = key("fp-a", "Alice");
        table.upsert(&alice, 1, 0).expect("create");
        table.disconnect(1, 0);

        assert!(table.cancel_expiry(&alice));
        assert!(!table.cancel_expiry(&alice));
        assert!(table.poll_expired(EXPIRY * 2).is_empty());
    }

    #[test]
    fn test_replaced_connection_does_not_expire() {
        let mut table = IdentityTable::new(EXPIRY);
        let alice = key("fp-a", "Alice");
        table.upsert(&alice, 1, 0).expect("create");

        assert_eq!(
            table.upsert(&alice, 2, 10),
            Ok(Upsert::Reconnected { previous: Some(1) })
        );
        assert_eq!(table.disconnect(1, 20), None);
        assert!(table.get(&alice).is_some_and(|r| !r.expiry_pending()));
        assert_eq!(table.connected_count(), 1);
    }

    #[test]
    fn test_expiry_reports_bindings() {
        let mut table = IdentityTable::new(EXPIRY);
        let alice = key("fp-a", "Alice");
        let room = Uuid::new_v4();
        let ship = Uuid::new_v4();
        table.upsert(&alice, 1, 0).expect("create");
        table.bind_room(&alice, room).expect("bound");
        table.bind_ship(&alice, ship).expect("bound");
        table.disconnect(1, 0);

        assert!(table.poll_expired(EXPIRY - 1).is_empty());
        let expired = table.poll_expired(EXPIRY);
        assert_eq!(
            expired,
            vec![ExpiredIdentity {
                key: alice.clone(),
                room: Some(room),
                ship: Some(ship),
            }]
        );
        assert!(table.get(&alice).is_none());
    }

    #[test]
    fn test_tombstone_lifetime() {
        let mut table = IdentityTable::new(EXPIRY);
        let alice = key("fp-a", "Alice");
        let tombstone = Tombstone {
            ship_id: Uuid::new_v4(),
            location: Vec2::new(10.0, 20.0),
            rotation: 90.0,
        };

        table.add_tombstone(alice.clone(), tombstone, 0);
        assert_eq!(table.take_tombstone(&alice), Some(tombstone));
        assert_eq!(table.take_tombstone(&alice), None);

        table.add_tombstone(alice.clone(), tombstone, 0);
        table.poll_expired(EXPIRY);
        assert_eq!(table.take_tombstone(&alice), None);
    }

    #[test]
    fn test_sweep_clears_stale_ship_bindings() {
        let mut table = IdentityTable::new(EXPIRY);
        let room = Uuid::new_v4();
        let live = Uuid::new_v4();
        let gone = Uuid::new_v4();

        for (conn, fp, name, ship) in [(1, "a", "A", live), (2, "b", "B", gone)] {
            let k = key(fp, name);
            table.upsert(&k, conn, 0).expect("create");
            table.bind_room(&k, room).expect("bound");
            table.bind_ship(&k, ship).expect("bound");
        }

        assert_eq!(table.sweep(room, |id| id == live), 1);
        assert_eq!(table.sweep(room, |id| id == live), 0);
        assert_eq!(table.get(&key("b", "B")).and_then(|r| r.ship), None);
        assert_eq!(table.get(&key("a", "A")).and_then(|r| r.ship), Some(live));
    }

    #[test]
    fn test_clear_ship_only_matching() {
        let mut table = IdentityTable::new(EXPIRY);
        let alice = key("fp-a", "Alice");
        let ship = Uuid::new_v4();
        table.upsert(&alice, 1, 0).expect("create");
        table.bind_ship(&alice, ship).expect("bound");

        assert!(!table.clear_ship(&alice, Uuid::new_v4()));
        assert!(table.clear_ship(&alice, ship));
        assert!(!table.clear_ship(&alice, ship));
    }
}
