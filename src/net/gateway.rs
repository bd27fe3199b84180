//! Protocol gateway
//!
//! Single owner of the identity table, the arena manager and the connection
//! hub. Every inbound event is handled here on the simulation task; a handler
//! error becomes a rejection for the offending connection and never aborts
//! the tick.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rayon::prelude::*;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::game::arena::{Arena, ArenaCounters, ArenaError, ArenaOutput};
use crate::game::combat::DeathCause;
use crate::game::state::ShipId;
use crate::lobby::identity::{
    ConnectionId, IdentityError, IdentityKey, IdentityTable, Tombstone, Upsert,
};
use crate::lobby::manager::{ArenaManager, ManagerError, RoomSettings};
use crate::lobby::room::RoomId;
use crate::metrics::Metrics;
use crate::net::connection::{ConnectionHub, Delivery, Frame};
use crate::net::protocol::{ClientMessage, IdentityPayload, ServerMessage};

/// Events produced by the transport for the simulation task
#[derive(Debug)]
pub enum Inbound {
    Connected {
        connection: ConnectionId,
        sender: Sender<Frame>,
    },
    Message {
        connection: ConnectionId,
        message: ClientMessage,
        bytes: usize,
    },
    /// A frame that did not decode: broken JSON or a bad payload
    Malformed {
        connection: ConnectionId,
        reason: String,
    },
    /// A well-formed frame with a message type this server does not handle
    Unknown {
        connection: ConnectionId,
        kind: String,
    },
    Disconnected {
        connection: ConnectionId,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error(transparent)]
    Arena(#[from] ArenaError),
    #[error("Identity {0} is not bound to this connection")]
    NotBound(IdentityKey),
    #[error("Join a room first")]
    NoRoom,
    #[error("Request a ship first")]
    NoShip,
    #[error("Room {0} no longer exists")]
    RoomGone(RoomId),
}

impl GatewayError {
    /// Rejection sent back to the offending connection
    pub fn reply(&self) -> ServerMessage {
        match self {
            GatewayError::Identity(_) => ServerMessage::invalid_user_data(self.to_string()),
            _ => ServerMessage::invalid_request(self.to_string()),
        }
    }
}

/// Identity bindings of an authorized request
struct Binding {
    key: IdentityKey,
    room: Option<RoomId>,
    ship: Option<ShipId>,
}

pub struct ProtocolGateway {
    identities: IdentityTable,
    rooms: ArenaManager,
    hub: ConnectionHub,
    metrics: Arc<Metrics>,
    clock_ms: u64,
}

impl ProtocolGateway {
    pub fn new(config: &ServerConfig, metrics: Arc<Metrics>) -> Self {
        Self::with_parts(
            IdentityTable::new(config.identity_expiry_ms),
            ArenaManager::new(RoomSettings::from(config)),
            metrics,
        )
    }

    pub fn with_parts(identities: IdentityTable, rooms: ArenaManager, metrics: Arc<Metrics>) -> Self {
        Self {
            identities,
            rooms,
            hub: ConnectionHub::new(),
            metrics,
            clock_ms: 0,
        }
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn identities(&self) -> &IdentityTable {
        &self.identities
    }

    pub fn rooms(&self) -> &ArenaManager {
        &self.rooms
    }

    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    pub fn handle(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Connected { connection, sender } => {
                debug!("Connection {} opened", connection);
                self.hub.register(connection, sender);
            }
            Inbound::Message {
                connection,
                message,
                bytes,
            } => {
                self.metrics.record_received(bytes);
                self.handle_message(connection, message);
            }
            Inbound::Malformed { connection, reason } => {
                debug!("Malformed message from connection {}: {}", connection, reason);
                self.reject(connection, ServerMessage::invalid_request(reason));
            }
            Inbound::Unknown { connection, kind } => {
                debug!("Ignoring unknown message type {:?} from connection {}", kind, connection);
            }
            Inbound::Disconnected { connection } => self.disconnect(connection),
        }
    }

    pub fn handle_message(&mut self, connection: ConnectionId, message: ClientMessage) {
        let kind = message.kind();
        debug!("{} from connection {}", kind, connection);
        if let Err(e) = self.dispatch(connection, message) {
            warn!("Rejected {} from connection {}: {}", kind, connection, e);
            self.reject(connection, e.reply());
        }
    }

    fn dispatch(&mut self, connection: ConnectionId, message: ClientMessage) -> Result<(), GatewayError> {
        match message {
            ClientMessage::SetIdentity(payload) => self.set_identity(connection, &payload),
            ClientMessage::JoinRoom(payload) => self.join_room(connection, &payload),
            ClientMessage::RequestShip(payload) => self.request_ship(connection, &payload),
            ClientMessage::RequestMap(payload) => {
                let binding = self.authorize(connection, &payload)?;
                let room = binding.room.ok_or(GatewayError::NoRoom)?;
                let map = self.arena_mut(room)?.map_config();
                self.send(connection, &ServerMessage::MapConfig(map));
                Ok(())
            }
            ClientMessage::EngineOn(payload) => {
                let (room, ship) = self.ship_of(connection, &payload.identity)?;
                let toggled = self.arena_mut(room)?.set_engine(ship, payload.enabled)?;
                self.publish(room, &toggled);
                Ok(())
            }
            ClientMessage::WeaponFiring(payload) => {
                let (room, ship) = self.ship_of(connection, &payload.identity)?;
                let toggled = self.arena_mut(room)?.set_weapons(ship, payload.enabled)?;
                self.publish(room, &toggled);
                Ok(())
            }
            ClientMessage::SetAngle(payload) => {
                let (room, ship) = self.ship_of(connection, &payload.identity)?;
                self.arena_mut(room)?.set_angle(ship, payload.degrees)?;
                Ok(())
            }
            ClientMessage::ShipDestroyed(payload) => self.report_death(connection, &payload),
            ClientMessage::RotateAttachments(payload) => {
                let (room, ship) = self.ship_of(connection, &payload.identity)?;
                if !self.arena_mut(room)?.rotate_attachments(ship, payload.clockwise)? {
                    debug!("Rotation of ship {} debounced", ship);
                }
                Ok(())
            }
            ClientMessage::DetachAttachment(payload) => {
                let (room, ship) = self.ship_of(connection, &payload.identity)?;
                self.arena_mut(room)?.detach_attachment(ship, payload.location)?;
                Ok(())
            }
            ClientMessage::ThrowAttachment(payload) => {
                let (room, ship) = self.ship_of(connection, &payload.identity)?;
                self.arena_mut(room)?.throw_attachment(ship, payload.location)?;
                Ok(())
            }
        }
    }

    // === Handlers ===

    fn set_identity(&mut self, connection: ConnectionId, payload: &IdentityPayload) -> Result<(), GatewayError> {
        let key = payload.key()?;
        match self.identities.upsert(&key, connection, self.clock_ms)? {
            Upsert::Created => info!("Identity {} created on connection {}", key, connection),
            Upsert::Reconnected { previous } => {
                info!("Identity {} bound to connection {}", key, connection);
                if let Some(previous) = previous.filter(|p| *p != connection) {
                    self.hub.unsubscribe(previous);
                }
            }
        }

        let (room, ship) = self
            .identities
            .get(&key)
            .map(|record| (record.room, record.ship))
            .unwrap_or_default();
        match room {
            Some(room) => {
                self.hub.subscribe(connection, room);
            }
            None => self.hub.unsubscribe(connection),
        }

        self.send(
            connection,
            &ServerMessage::IdentityAccepted {
                fingerprint: key.fingerprint.clone(),
                name: key.name.clone(),
                room_id: room,
                ship_id: ship,
            },
        );

        if let Some(tombstone) = self.identities.take_tombstone(&key) {
            self.send(
                connection,
                &ServerMessage::ShipDestroyed {
                    ship_id: tombstone.ship_id,
                    name: key.name.clone(),
                    location: tombstone.location,
                    rotation: tombstone.rotation,
                },
            );
        }
        Ok(())
    }

    fn join_room(&mut self, connection: ConnectionId, payload: &IdentityPayload) -> Result<(), GatewayError> {
        let binding = self.authorize(connection, payload)?;
        let assignment = self.rooms.assign(&binding.key, binding.room)?;
        if assignment.created && self.rooms.over_limit() {
            self.metrics.rooms_over_limit.fetch_add(1, Ordering::Relaxed);
        }

        if binding.room != Some(assignment.room_id) {
            // Old room is gone, and so is any ship bound in it
            if let Some(ship) = binding.ship {
                self.identities.clear_ship(&binding.key, ship);
            }
            info!("Identity {} joined {}", binding.key, assignment.name);
        }
        self.identities.bind_room(&binding.key, assignment.room_id)?;
        self.hub.subscribe(connection, assignment.room_id);

        self.send(
            connection,
            &ServerMessage::RoomJoined {
                room_id: assignment.room_id,
                name: assignment.name,
                members: assignment.members,
                capacity: assignment.capacity,
            },
        );
        Ok(())
    }

    fn request_ship(&mut self, connection: ConnectionId, payload: &IdentityPayload) -> Result<(), GatewayError> {
        let binding = self.authorize(connection, payload)?;
        let room = binding.room.ok_or(GatewayError::NoRoom)?;
        let arena = self.arena_mut(room)?;

        let ship_id = match binding.ship.filter(|id| arena.has_ship(*id)) {
            Some(id) => id,
            None => {
                let id = arena.spawn_ship(binding.key.clone());
                info!("Spawned ship {} for {}", id, binding.key);
                id
            }
        };
        self.identities.bind_ship(&binding.key, ship_id)?;

        self.send(connection, &ServerMessage::ShipAssigned { ship_id, room_id: room });
        Ok(())
    }

    /// Client-side death report. A ship already gone is not an error; reports
    /// are routinely duplicated.
    fn report_death(&mut self, connection: ConnectionId, payload: &IdentityPayload) -> Result<(), GatewayError> {
        let binding = self.authorize(connection, payload)?;
        let room = binding.room.ok_or(GatewayError::NoRoom)?;
        let Some(ship) = binding.ship else {
            debug!("Death report from {} without a ship", binding.key);
            return Ok(());
        };
        let outputs = self.arena_mut(room)?.kill_ship(ship, DeathCause::Reported);
        self.apply_outputs(room, outputs);
        Ok(())
    }

    fn disconnect(&mut self, connection: ConnectionId) {
        self.hub.unregister(connection);
        match self.identities.disconnect(connection, self.clock_ms) {
            Some(key) => info!(
                "Identity {} disconnected, expiring in {} ms",
                key,
                self.identities.expiry_ms()
            ),
            None => debug!("Connection {} closed", connection),
        }
    }

    // === Authorization ===

    /// The identity in the payload must be bound to the sending connection
    fn authorize(&self, connection: ConnectionId, payload: &IdentityPayload) -> Result<Binding, GatewayError> {
        let key = payload.key()?;
        match self.identities.get(&key) {
            Some(record) if record.connection == Some(connection) => Ok(Binding {
                room: record.room,
                ship: record.ship,
                key,
            }),
            _ => Err(GatewayError::NotBound(key)),
        }
    }

    fn ship_of(&mut self, connection: ConnectionId, payload: &IdentityPayload) -> Result<(RoomId, ShipId), GatewayError> {
        let binding = self.authorize(connection, payload)?;
        let room = binding.room.ok_or(GatewayError::NoRoom)?;
        let ship = binding.ship.ok_or(GatewayError::NoShip)?;
        if !self.arena_mut(room)?.has_ship(ship) {
            return Err(GatewayError::NoShip);
        }
        Ok((room, ship))
    }

    fn arena_mut(&mut self, room: RoomId) -> Result<&mut Arena, GatewayError> {
        self.rooms
            .get_mut(room)
            .map(|r| &mut r.arena)
            .ok_or(GatewayError::RoomGone(room))
    }

    // === Output ===

    fn send(&mut self, connection: ConnectionId, message: &ServerMessage) {
        let delivery = self.hub.send(connection, message);
        self.record(delivery);
    }

    fn publish(&mut self, room: RoomId, message: &ServerMessage) {
        let delivery = self.hub.publish(room, message);
        self.record(delivery);
    }

    fn record(&self, delivery: Delivery) {
        if delivery.frames > 0 {
            self.metrics.record_sent(delivery.frames, delivery.bytes);
        }
        if delivery.dropped > 0 {
            self.metrics
                .frames_dropped
                .fetch_add(delivery.dropped, Ordering::Relaxed);
        }
    }

    fn reject(&mut self, connection: ConnectionId, reply: ServerMessage) {
        self.metrics.invalid_requests.fetch_add(1, Ordering::Relaxed);
        self.send(connection, &reply);
    }

    fn apply_outputs(&mut self, room: RoomId, outputs: Vec<ArenaOutput>) {
        for output in outputs {
            match output {
                ArenaOutput::Broadcast(message) => self.publish(room, &message),
                ArenaOutput::ShipDestroyed {
                    ship_id,
                    owner,
                    cause,
                } => {
                    debug!("Ship {} of {} destroyed ({:?})", ship_id, owner, cause);
                    self.identities.clear_ship(&owner, ship_id);
                }
                ArenaOutput::StatsTier => {
                    self.sweep(room);
                }
            }
        }
    }

    // === Tick ===

    /// Advance every arena by `dt_ms`, then run the cross-arena housekeeping
    pub fn tick(&mut self, dt_ms: u64) {
        self.clock_ms += dt_ms;
        self.expire_identities();

        let results: Vec<(RoomId, Vec<ArenaOutput>, ArenaCounters)> = self
            .rooms
            .rooms_mut()
            .par_iter_mut()
            .map(|room| {
                let outputs = room.arena.tick(dt_ms);
                (room.id, outputs, room.arena.take_counters())
            })
            .collect();

        for (room, outputs, counters) in results {
            self.metrics.add_arena_counters(counters);
            self.apply_outputs(room, outputs);
        }

        for room in self.rooms.remove_empty_rooms() {
            self.hub.close_room(room);
        }
        self.update_gauges();
    }

    /// Drop identities whose grace period ran out. Their ships go through the
    /// regular death path and leave a tombstone for a late reconnect.
    fn expire_identities(&mut self) {
        for expired in self.identities.poll_expired(self.clock_ms) {
            self.metrics.identities_expired.fetch_add(1, Ordering::Relaxed);
            info!("Identity {} expired", expired.key);

            let Some(room) = expired.room else {
                continue;
            };
            if let Some(ship_id) = expired.ship {
                let mut outputs = Vec::new();
                if let Some(arena) = self.rooms.get_mut(room).map(|r| &mut r.arena) {
                    if let Some(ship) = arena.ship(ship_id) {
                        let tombstone = Tombstone {
                            ship_id,
                            location: ship.location,
                            rotation: ship.rotation,
                        };
                        self.identities
                            .add_tombstone(expired.key.clone(), tombstone, self.clock_ms);
                    }
                    outputs = arena.kill_ship(ship_id, DeathCause::Abandoned);
                }
                self.apply_outputs(room, outputs);
            }
            self.rooms.release(&expired.key, room);
        }
    }

    /// Consistency sweep: clear identity bindings to ships that are gone
    pub fn sweep(&mut self, room: RoomId) -> usize {
        let Some(arena) = self.rooms.get(room).map(|r| &r.arena) else {
            return 0;
        };
        let repaired = self.identities.sweep(room, |ship| arena.has_ship(ship));
        if repaired > 0 {
            debug!("Sweep repaired {} ship bindings in room {}", repaired, room);
            self.metrics
                .bindings_repaired
                .fetch_add(repaired as u64, Ordering::Relaxed);
        }
        repaired
    }

    fn update_gauges(&self) {
        let (mut ships, mut supplies, mut bullets, mut floating) = (0, 0, 0, 0);
        for room in self.rooms.rooms() {
            let registry = room.arena.registry();
            ships += registry.ship_count();
            supplies += registry.supply_count();
            bullets += registry.bullet_count();
            floating += registry.floating_count();
        }

        let m = &self.metrics;
        m.rooms.store(self.rooms.room_count() as u64, Ordering::Relaxed);
        m.ships.store(ships as u64, Ordering::Relaxed);
        m.supplies.store(supplies as u64, Ordering::Relaxed);
        m.bullets.store(bullets as u64, Ordering::Relaxed);
        m.floating_attachments.store(floating as u64, Ordering::Relaxed);
        m.identities.store(self.identities.len() as u64, Ordering::Relaxed);
        m.connections_active.store(self.hub.count() as u64, Ordering::Relaxed);
    }

    /// Drop all arenas; used on shutdown
    pub fn shutdown(&mut self) -> usize {
        self.rooms.shutdown_all_rooms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connection::outbound_channel;
    use crate::net::protocol::{decode, TogglePayload};
    use tokio::sync::mpsc::Receiver;

    struct Client {
        id: ConnectionId,
        rx: Receiver<Frame>,
        identity: IdentityPayload,
    }

    impl Client {
        fn drain(&mut self) -> Vec<ServerMessage> {
            let mut out = Vec::new();
            while let Ok(frame) = self.rx.try_recv() {
                out.push(decode(&frame).expect("server sends valid json"));
            }
            out
        }
    }

    fn gateway() -> ProtocolGateway {
        ProtocolGateway::new(&ServerConfig::default(), Arc::new(Metrics::new()))
    }

    fn connect(gateway: &mut ProtocolGateway, id: ConnectionId, name: &str) -> Client {
        let (sender, rx) = outbound_channel();
        gateway.handle(Inbound::Connected { connection: id, sender });
        Client {
            id,
            rx,
            identity: IdentityPayload::new(format!("fp-{name}"), name),
        }
    }

    fn send(gateway: &mut ProtocolGateway, client: &Client, message: ClientMessage) {
        gateway.handle_message(client.id, message);
    }

    #[test]
    fn test_set_identity_accepts() {
        let mut gateway = gateway();
        let mut client = connect(&mut gateway, 1, "Alice");

        send(&mut gateway, &client, ClientMessage::SetIdentity(client.identity.clone()));

        assert_eq!(
            client.drain(),
            vec![ServerMessage::IdentityAccepted {
                fingerprint: "fp-Alice".into(),
                name: "Alice".into(),
                room_id: None,
                ship_id: None,
            }]
        );
    }

    #[test]
    fn test_invalid_identity_is_user_data_error() {
        let mut gateway = gateway();
        let mut client = connect(&mut gateway, 1, "Alice");

        send(
            &mut gateway,
            &client,
            ClientMessage::SetIdentity(IdentityPayload::new("fp", "   ")),
        );
        assert!(matches!(
            client.drain().as_slice(),
            [ServerMessage::InvalidUserData { .. }]
        ));
    }

    #[test]
    fn test_requests_need_bound_identity() {
        let mut gateway = gateway();
        let mut client = connect(&mut gateway, 1, "Alice");

        send(&mut gateway, &client, ClientMessage::JoinRoom(client.identity.clone()));
        assert!(matches!(
            client.drain().as_slice(),
            [ServerMessage::InvalidRequest { .. }]
        ));
    }

    #[test]
    fn test_ship_commands_need_ship() {
        let mut gateway = gateway();
        let mut client = connect(&mut gateway, 1, "Alice");
        send(&mut gateway, &client, ClientMessage::SetIdentity(client.identity.clone()));
        send(&mut gateway, &client, ClientMessage::JoinRoom(client.identity.clone()));
        client.drain();

        send(
            &mut gateway,
            &client,
            ClientMessage::EngineOn(TogglePayload {
                identity: client.identity.clone(),
                enabled: true,
            }),
        );
        match client.drain().as_slice() {
            [ServerMessage::InvalidRequest { message }] => assert_eq!(message, "Request a ship first"),
            other => panic!("unexpected replies: {:?}", other),
        }
    }

    #[test]
    fn test_engine_toggle_broadcast_to_room() {
        let mut gateway = gateway();
        let mut alice = connect(&mut gateway, 1, "Alice");
        let mut bob = connect(&mut gateway, 2, "Bob");
        for client in [&alice, &bob] {
            send(&mut gateway, client, ClientMessage::SetIdentity(client.identity.clone()));
            send(&mut gateway, client, ClientMessage::JoinRoom(client.identity.clone()));
        }
        send(&mut gateway, &alice, ClientMessage::RequestShip(alice.identity.clone()));
        alice.drain();
        bob.drain();

        send(
            &mut gateway,
            &alice,
            ClientMessage::EngineOn(TogglePayload {
                identity: alice.identity.clone(),
                enabled: true,
            }),
        );

        for client in [&mut alice, &mut bob] {
            assert!(matches!(
                client.drain().as_slice(),
                [ServerMessage::EngineToggled { enabled: true, .. }]
            ));
        }
    }

    #[test]
    fn test_sweep_repairs_stale_binding() {
        let mut gateway = gateway();
        let client = connect(&mut gateway, 1, "Alice");
        send(&mut gateway, &client, ClientMessage::SetIdentity(client.identity.clone()));
        send(&mut gateway, &client, ClientMessage::JoinRoom(client.identity.clone()));
        send(&mut gateway, &client, ClientMessage::RequestShip(client.identity.clone()));

        let key = IdentityKey::new("fp-Alice", "Alice");
        let (room, ship) = gateway
            .identities()
            .get(&key)
            .map(|r| (r.room, r.ship))
            .expect("bound");
        let (room, ship) = (room.expect("room"), ship.expect("ship"));

        // Remove the ship behind the identity table's back
        gateway
            .arena_mut(room)
            .expect("room exists")
            .kill_ship(ship, DeathCause::Destroyed);

        assert_eq!(gateway.sweep(room), 1);
        assert_eq!(gateway.sweep(room), 0);
        assert_eq!(gateway.identities().get(&key).and_then(|r| r.ship), None);
    }

    #[test]
    fn test_malformed_frame_rejected() {
        let mut gateway = gateway();
        let mut client = connect(&mut gateway, 1, "Alice");

        gateway.handle(Inbound::Malformed {
            connection: client.id,
            reason: "missing field `fingerprint`".into(),
        });
        assert!(matches!(
            client.drain().as_slice(),
            [ServerMessage::InvalidRequest { .. }]
        ));
        assert_eq!(gateway.metrics.invalid_requests.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unknown_message_type_ignored() {
        let mut gateway = gateway();
        let mut client = connect(&mut gateway, 1, "Alice");

        gateway.handle(Inbound::Unknown {
            connection: client.id,
            kind: "teleport".into(),
        });
        assert!(client.drain().is_empty());
        assert_eq!(gateway.metrics.invalid_requests.load(Ordering::Relaxed), 0);

        // The connection keeps working afterwards
        send(&mut gateway, &client, ClientMessage::SetIdentity(client.identity.clone()));
        assert!(matches!(
            client.drain().as_slice(),
            [ServerMessage::IdentityAccepted { .. }]
        ));
    }

    #[test]
    fn test_slow_reader_frames_dropped_and_counted() {
        use crate::game::constants::net::OUTBOUND_QUEUE_CAPACITY;

        let mut gateway = gateway();
        let mut client = connect(&mut gateway, 1, "Alice");
        send(&mut gateway, &client, ClientMessage::SetIdentity(client.identity.clone()));
        send(&mut gateway, &client, ClientMessage::JoinRoom(client.identity.clone()));
        client.drain();

        for _ in 0..OUTBOUND_QUEUE_CAPACITY + 10 {
            send(&mut gateway, &client, ClientMessage::RequestMap(client.identity.clone()));
        }

        assert_eq!(client.drain().len(), OUTBOUND_QUEUE_CAPACITY);
        assert_eq!(gateway.metrics.frames_dropped.load(Ordering::Relaxed), 10);
        assert_eq!(gateway.hub().count(), 1);
    }

    #[test]
    fn test_rooms_past_limit_are_counted() {
        let config = ServerConfig {
            max_rooms: 1,
            ..ServerConfig::default()
        };
        let mut gateway = ProtocolGateway::new(&config, Arc::new(Metrics::new()));

        let mut rooms = Vec::new();
        for i in 0..5 {
            let mut client = connect(&mut gateway, i, &format!("Pilot{i}"));
            send(&mut gateway, &client, ClientMessage::SetIdentity(client.identity.clone()));
            send(&mut gateway, &client, ClientMessage::JoinRoom(client.identity.clone()));
            let joined = client.drain().into_iter().find_map(|m| match m {
                ServerMessage::RoomJoined { room_id, .. } => Some(room_id),
                _ => None,
            });
            rooms.push(joined.expect("every member gets a room"));
        }

        assert_ne!(rooms[4], rooms[0]);
        assert_eq!(gateway.rooms().room_count(), 2);
        assert_eq!(gateway.metrics.rooms_over_limit.load(Ordering::Relaxed), 1);
        assert_eq!(gateway.metrics.invalid_requests.load(Ordering::Relaxed), 0);
    }
}
