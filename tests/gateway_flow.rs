//! End-to-end flows through the protocol gateway, driven the way the
//! simulation task drives it: inbound events, then fixed ticks.

use std::sync::Arc;

use tokio::sync::mpsc::Receiver;

use salvage_arena_server::config::ServerConfig;
use salvage_arena_server::game::state::ShipId;
use salvage_arena_server::lobby::room::RoomId;
use salvage_arena_server::metrics::Metrics;
use salvage_arena_server::net::connection::{outbound_channel, Frame};
use salvage_arena_server::net::gateway::{Inbound, ProtocolGateway};
use salvage_arena_server::net::protocol::{decode, ClientMessage, IdentityPayload, ServerMessage};

const TICK_MS: u64 = 16;

struct Client {
    connection: u64,
    rx: Receiver<Frame>,
    identity: IdentityPayload,
}

impl Client {
    fn connect(gateway: &mut ProtocolGateway, connection: u64, fingerprint: &str, name: &str) -> Self {
        let (sender, rx) = outbound_channel();
        gateway.handle(Inbound::Connected { connection, sender });
        Self {
            connection,
            rx,
            identity: IdentityPayload::new(fingerprint, name),
        }
    }

    fn send(&self, gateway: &mut ProtocolGateway, message: ClientMessage) {
        gateway.handle(Inbound::Message {
            connection: self.connection,
            message,
            bytes: 64,
        });
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            messages.push(decode(&frame).expect("server frames decode"));
        }
        messages
    }

    /// set-identity, join-room and request-ship; returns the bindings
    fn enter(&mut self, gateway: &mut ProtocolGateway) -> (RoomId, ShipId) {
        self.send(gateway, ClientMessage::SetIdentity(self.identity.clone()));
        self.send(gateway, ClientMessage::JoinRoom(self.identity.clone()));
        self.send(gateway, ClientMessage::RequestShip(self.identity.clone()));

        let mut room = None;
        let mut ship = None;
        for message in self.drain() {
            match message {
                ServerMessage::RoomJoined { room_id, .. } => room = Some(room_id),
                ServerMessage::ShipAssigned { ship_id, .. } => ship = Some(ship_id),
                ServerMessage::InvalidRequest { message } | ServerMessage::InvalidUserData { message } => {
                    panic!("unexpected rejection: {message}")
                }
                _ => {}
            }
        }
        (room.expect("room joined"), ship.expect("ship assigned"))
    }
}

fn gateway_with(config: ServerConfig) -> ProtocolGateway {
    ProtocolGateway::new(&config, Arc::new(Metrics::new()))
}

fn run_ticks(gateway: &mut ProtocolGateway, ticks: usize) {
    for _ in 0..ticks {
        gateway.tick(TICK_MS);
    }
}

#[test]
fn session_reaches_snapshots() {
    let mut gateway = gateway_with(ServerConfig::default());
    let mut alice = Client::connect(&mut gateway, 1, "fp-alice", "Alice");

    alice.send(&mut gateway, ClientMessage::SetIdentity(alice.identity.clone()));
    match alice.drain().as_slice() {
        [ServerMessage::IdentityAccepted { name, room_id: None, ship_id: None, .. }] => {
            assert_eq!(name, "Alice")
        }
        other => panic!("unexpected replies: {other:?}"),
    }

    alice.send(&mut gateway, ClientMessage::JoinRoom(alice.identity.clone()));
    alice.send(&mut gateway, ClientMessage::RequestShip(alice.identity.clone()));
    alice.send(&mut gateway, ClientMessage::RequestMap(alice.identity.clone()));
    let replies = alice.drain();
    assert!(matches!(
        replies.as_slice(),
        [
            ServerMessage::RoomJoined { members: 1, capacity: 4, .. },
            ServerMessage::ShipAssigned { .. },
            ServerMessage::MapConfig(_),
        ]
    ));
    let ship = match replies[1] {
        ServerMessage::ShipAssigned { ship_id, .. } => ship_id,
        _ => unreachable!(),
    };

    run_ticks(&mut gateway, 63);
    let snapshots = alice.drain();
    let rosters: Vec<&Vec<_>> = snapshots
        .iter()
        .filter_map(|m| match m {
            ServerMessage::UpdatePlayers(ships) => Some(ships),
            _ => None,
        })
        .collect();
    assert!(!rosters.is_empty());
    assert!(rosters.iter().all(|ships| ships.iter().any(|s| s.id == ship)));
    assert!(snapshots
        .iter()
        .any(|m| matches!(m, ServerMessage::UpdateStats(_))));
}

#[test]
fn joining_twice_keeps_the_room() {
    let mut gateway = gateway_with(ServerConfig::default());
    let mut alice = Client::connect(&mut gateway, 1, "fp-alice", "Alice");
    let (room, _) = alice.enter(&mut gateway);

    alice.send(&mut gateway, ClientMessage::JoinRoom(alice.identity.clone()));
    match alice.drain().as_slice() {
        [ServerMessage::RoomJoined { room_id, members: 1, .. }] => assert_eq!(*room_id, room),
        other => panic!("unexpected replies: {other:?}"),
    }
    assert_eq!(gateway.rooms().room_count(), 1);
}

#[test]
fn fifth_member_opens_second_room() {
    let mut gateway = gateway_with(ServerConfig::default());
    let mut rooms = Vec::new();
    for i in 0..5 {
        let mut client = Client::connect(&mut gateway, i + 1, &format!("fp-{i}"), &format!("Pilot {i}"));
        rooms.push(client.enter(&mut gateway).0);
    }

    assert!(rooms[..4].iter().all(|r| *r == rooms[0]));
    assert_ne!(rooms[4], rooms[0]);
    let names: Vec<String> = gateway.rooms().list().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Arena 1".to_string(), "Arena 2".to_string()]);
}

#[test]
fn reported_death_is_broadcast_once() {
    let mut gateway = gateway_with(ServerConfig::default());
    let mut alice = Client::connect(&mut gateway, 1, "fp-alice", "Alice");
    let mut bob = Client::connect(&mut gateway, 2, "fp-bob", "Bob");
    let (_, alice_ship) = alice.enter(&mut gateway);
    bob.enter(&mut gateway);
    bob.drain();

    alice.send(&mut gateway, ClientMessage::ShipDestroyed(alice.identity.clone()));
    // A duplicate report is ignored without a rejection
    alice.send(&mut gateway, ClientMessage::ShipDestroyed(alice.identity.clone()));

    for client in [&mut alice, &mut bob] {
        let messages = client.drain();
        let deaths: Vec<ShipId> = messages
            .iter()
            .filter_map(|m| match m {
                ServerMessage::ShipDestroyed { ship_id, .. } => Some(*ship_id),
                _ => None,
            })
            .collect();
        assert_eq!(deaths, vec![alice_ship]);
        assert!(!messages
            .iter()
            .any(|m| matches!(m, ServerMessage::InvalidRequest { .. })));
    }

    // Loot from the wreck shows up in the next supply snapshot
    run_ticks(&mut gateway, 5);
    assert!(bob.drain().iter().any(|m| matches!(
        m,
        ServerMessage::UpdateSupplies { supplies, .. } if !supplies.is_empty()
    )));

    alice.send(&mut gateway, ClientMessage::RequestShip(alice.identity.clone()));
    match alice.drain().as_slice() {
        [ServerMessage::ShipAssigned { ship_id, .. }] => assert_ne!(*ship_id, alice_ship),
        other => panic!("unexpected replies: {other:?}"),
    }
}

#[test]
fn reconnect_within_grace_keeps_ship() {
    let mut gateway = gateway_with(ServerConfig::default());
    let mut alice = Client::connect(&mut gateway, 1, "fp-alice", "Alice");
    let (room, ship) = alice.enter(&mut gateway);

    gateway.handle(Inbound::Disconnected { connection: 1 });
    run_ticks(&mut gateway, 600);

    let mut again = Client::connect(&mut gateway, 2, "fp-alice", "Alice");
    again.send(&mut gateway, ClientMessage::SetIdentity(again.identity.clone()));
    match again.drain().as_slice() {
        [ServerMessage::IdentityAccepted { room_id, ship_id, .. }] => {
            assert_eq!(*room_id, Some(room));
            assert_eq!(*ship_id, Some(ship));
        }
        other => panic!("unexpected replies: {other:?}"),
    }

    again.send(&mut gateway, ClientMessage::RequestShip(again.identity.clone()));
    assert!(matches!(
        again.drain().as_slice(),
        [ServerMessage::ShipAssigned { ship_id, .. }] if *ship_id == ship
    ));
}

#[test]
fn expiry_leaves_tombstone_for_late_reconnect() {
    let config = ServerConfig {
        identity_expiry_ms: 1_000,
        ..ServerConfig::default()
    };
    let mut gateway = gateway_with(config);
    let mut alice = Client::connect(&mut gateway, 1, "fp-alice", "Alice");
    let (_, ship) = alice.enter(&mut gateway);

    gateway.handle(Inbound::Disconnected { connection: 1 });
    run_ticks(&mut gateway, 70);

    assert!(gateway.identities().is_empty());
    // The only member left and its ship is gone, so the room is torn down
    assert_eq!(gateway.rooms().room_count(), 0);

    let mut again = Client::connect(&mut gateway, 2, "fp-alice", "Alice");
    again.send(&mut gateway, ClientMessage::SetIdentity(again.identity.clone()));
    match again.drain().as_slice() {
        [ServerMessage::IdentityAccepted { room_id: None, ship_id: None, .. }, ServerMessage::ShipDestroyed { ship_id, name, .. }] =>
        {
            assert_eq!(*ship_id, ship);
            assert_eq!(name, "Alice");
        }
        other => panic!("unexpected replies: {other:?}"),
    }

    let (_, fresh) = again.enter(&mut gateway);
    assert_ne!(fresh, ship);
}

#[test]
fn invalid_input_is_rejected_per_connection() {
    let mut gateway = gateway_with(ServerConfig::default());
    let mut alice = Client::connect(&mut gateway, 1, "fp-alice", "Alice");
    let mut mallory = Client::connect(&mut gateway, 2, "fp-mallory", "Mallory");
    alice.enter(&mut gateway);

    gateway.handle(Inbound::Malformed {
        connection: 2,
        reason: "missing field `fingerprint`".into(),
    });
    assert!(matches!(
        mallory.drain().as_slice(),
        [ServerMessage::InvalidRequest { .. }]
    ));

    // Same name under another fingerprint
    mallory.send(
        &mut gateway,
        ClientMessage::SetIdentity(IdentityPayload::new("fp-mallory", "Alice")),
    );
    assert!(matches!(
        mallory.drain().as_slice(),
        [ServerMessage::InvalidUserData { .. }]
    ));

    // Acting as someone else's identity
    mallory.send(&mut gateway, ClientMessage::RequestShip(alice.identity.clone()));
    assert!(matches!(
        mallory.drain().as_slice(),
        [ServerMessage::InvalidRequest { .. }]
    ));
    assert!(alice.drain().is_empty());
}

#[test]
fn unknown_message_type_is_ignored() {
    let mut gateway = gateway_with(ServerConfig::default());
    let mut alice = Client::connect(&mut gateway, 1, "fp-alice", "Alice");
    alice.enter(&mut gateway);

    gateway.handle(Inbound::Unknown {
        connection: 1,
        kind: "teleport".into(),
    });
    assert!(alice.drain().is_empty());

    // Later traffic on the same connection is unaffected
    alice.send(&mut gateway, ClientMessage::RequestMap(alice.identity.clone()));
    assert!(matches!(alice.drain().as_slice(), [ServerMessage::MapConfig(_)]));
}

#[test]
fn rooms_keep_opening_past_max_rooms() {
    let config = ServerConfig {
        max_rooms: 1,
        ..ServerConfig::default()
    };
    let mut gateway = gateway_with(config);
    let mut rooms = Vec::new();
    for i in 0..9 {
        let mut client = Client::connect(&mut gateway, i + 1, &format!("fp-{i}"), &format!("Pilot {i}"));
        rooms.push(client.enter(&mut gateway).0);
    }

    assert_eq!(gateway.rooms().room_count(), 3);
    assert_ne!(rooms[4], rooms[0]);
    assert_ne!(rooms[8], rooms[4]);
    assert!(gateway.rooms().list().iter().all(|r| r.members <= r.capacity));
}
