//! Wire protocol
//!
//! JSON messages of the form `{"type": "...", "data": {...}}`. Every client
//! message carries the sender's identity so the gateway can check it against
//! the identity bound to the connection.

use serde::{Deserialize, Serialize};

use crate::game::attachment::{Attachment, AttachmentId, AttachmentKind, SlotLocation};
use crate::game::combat::ExplosionSize;
use crate::game::map::MapHandle;
use crate::game::state::{Ship, ShipId, Supply, SupplyId, SupplyKind};
use crate::lobby::identity::{IdentityError, IdentityKey};
use crate::lobby::room::RoomId;
use crate::util::vec2::Vec2;

/// Identity fields present on every client message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPayload {
    pub fingerprint: String,
    pub name: String,
}

impl IdentityPayload {
    pub fn new(fingerprint: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TogglePayload {
    #[serde(flatten)]
    pub identity: IdentityPayload,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnglePayload {
    #[serde(flatten)]
    pub identity: IdentityPayload,
    pub degrees: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotatePayload {
    #[serde(flatten)]
    pub identity: IdentityPayload,
    pub clockwise: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotPayload {
    #[serde(flatten)]
    pub identity: IdentityPayload,
    pub location: SlotLocation,
}

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Handshake: resolve or create the identity
    SetIdentity(IdentityPayload),
    /// Ask for a room
    JoinRoom(IdentityPayload),
    /// Spawn a ship, or fetch the one already bound
    RequestShip(IdentityPayload),
    RequestMap(IdentityPayload),
    EngineOn(TogglePayload),
    WeaponFiring(TogglePayload),
    SetAngle(AnglePayload),
    /// Client-side death report for its own ship
    ShipDestroyed(IdentityPayload),
    RotateAttachments(RotatePayload),
    DetachAttachment(SlotPayload),
    ThrowAttachment(SlotPayload),
}

impl ClientMessage {
    pub fn identity(&self) -> &IdentityPayload {
        match self {
            ClientMessage::SetIdentity(identity)
            | ClientMessage::JoinRoom(identity)
            | ClientMessage::RequestShip(identity)
            | ClientMessage::RequestMap(identity)
            | ClientMessage::ShipDestroyed(identity) => identity,
            ClientMessage::EngineOn(p) | ClientMessage::WeaponFiring(p) => &p.identity,
            ClientMessage::SetAngle(p) => &p.identity,
            ClientMessage::RotateAttachments(p) => &p.identity,
            ClientMessage::DetachAttachment(p) | ClientMessage::ThrowAttachment(p) => &p.identity,
        }
    }

    /// Wire name of the message, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::SetIdentity(_) => "set-identity",
            ClientMessage::JoinRoom(_) => "join-room",
            ClientMessage::RequestShip(_) => "request-ship",
            ClientMessage::RequestMap(_) => "request-map",
            ClientMessage::EngineOn(_) => "engine-on",
            ClientMessage::WeaponFiring(_) => "weapon-firing",
            ClientMessage::SetAngle(_) => "set-angle",
            ClientMessage::ShipDestroyed(_) => "ship-destroyed",
            ClientMessage::RotateAttachments(_) => "rotate-attachments",
            ClientMessage::DetachAttachment(_) => "detach-attachment",
            ClientMessage::ThrowAttachment(_) => "throw-attachment",
        }
    }
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    IdentityAccepted {
        fingerprint: String,
        name: String,
        /// Room the identity is still bound to after a reconnect
        room_id: Option<RoomId>,
        ship_id: Option<ShipId>,
    },
    RoomJoined {
        room_id: RoomId,
        name: String,
        members: usize,
        capacity: usize,
    },
    ShipAssigned {
        ship_id: ShipId,
        room_id: RoomId,
    },
    MapConfig(MapHandle),
    EngineToggled {
        ship_id: ShipId,
        enabled: bool,
    },
    WeaponToggled {
        ship_id: ShipId,
        enabled: bool,
    },
    /// Medium tier: full ship roster
    UpdatePlayers(Vec<ShipSnapshot>),
    /// Low tier: loot and floating attachments
    UpdateSupplies {
        supplies: Vec<SupplySnapshot>,
        attachments: Vec<AttachmentSnapshot>,
    },
    /// Ultra-low tier: per-ship statistics
    UpdateStats(Vec<StatsSnapshot>),
    ShipDestroyed {
        ship_id: ShipId,
        name: String,
        location: Vec2,
        rotation: f32,
    },
    FlickerSupplies {
        ids: Vec<SupplyId>,
    },
    RemoveSupplies {
        ids: Vec<SupplyId>,
    },
    Explosion {
        location: Vec2,
        size: ExplosionSize,
    },
    InvalidUserData {
        message: String,
    },
    InvalidRequest {
        message: String,
    },
}

impl ServerMessage {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        ServerMessage::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn invalid_user_data(message: impl Into<String>) -> Self {
        ServerMessage::InvalidUserData {
            message: message.into(),
        }
    }
}

/// Attachment state, either mounted on a ship or floating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentSnapshot {
    pub id: AttachmentId,
    pub kind: AttachmentKind,
    pub integrity: f32,
    pub location: Option<SlotLocation>,
    pub is_thrown: bool,
    /// World position; only meaningful while floating
    pub position: Vec2,
    pub rotation: f32,
}

impl AttachmentSnapshot {
    pub fn from_attachment(attachment: &Attachment) -> Self {
        Self {
            id: attachment.id,
            kind: attachment.kind,
            integrity: attachment.integrity,
            location: attachment.location,
            is_thrown: attachment.is_thrown,
            position: attachment.transform.location,
            rotation: attachment.transform.rotation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipSnapshot {
    pub id: ShipId,
    pub name: String,
    pub location: Vec2,
    pub rotation: f32,
    pub velocity: Vec2,
    pub integrity: f32,
    pub fuel: f32,
    pub ammo: f32,
    pub temperature: f32,
    pub engine_on: bool,
    pub weapons_firing: bool,
    pub attachments: Vec<AttachmentSnapshot>,
}

impl ShipSnapshot {
    pub fn from_ship(ship: &Ship) -> Self {
        Self {
            id: ship.id,
            name: ship.owner.name.clone(),
            location: ship.location,
            rotation: ship.rotation,
            velocity: ship.velocity,
            integrity: ship.integrity,
            fuel: ship.fuel,
            ammo: ship.ammo,
            temperature: ship.temperature,
            engine_on: ship.engine_on,
            weapons_firing: ship.weapons_firing,
            attachments: ship
                .slots
                .iter()
                .map(|a| AttachmentSnapshot {
                    position: ship.location,
                    rotation: a.heading(ship.rotation),
                    ..AttachmentSnapshot::from_attachment(a)
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplySnapshot {
    pub id: SupplyId,
    pub kind: SupplyKind,
    pub amount: f32,
    pub location: Vec2,
    pub flickering: bool,
}

impl SupplySnapshot {
    pub fn from_supply(supply: &Supply) -> Self {
        Self {
            id: supply.id,
            kind: supply.kind,
            amount: supply.amount,
            location: supply.location,
            flickering: supply.flickering,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub ship_id: ShipId,
    pub name: String,
    pub kills: u32,
    pub shots_fired: u32,
    pub shots_landed: u32,
    pub damage_dealt: f32,
}

impl StatsSnapshot {
    pub fn from_ship(ship: &Ship) -> Self {
        Self {
            ship_id: ship.id,
            name: ship.owner.name.clone(),
            kills: ship.stats.kills,
            shots_fired: ship.stats.shots_fired,
            shots_landed: ship.stats.shots_landed,
            damage_dealt: ship.stats.damage_dealt,
        }
    }
}

impl IdentityPayload {
    /// Validated, sanitized identity key
    pub fn key(&self) -> Result<IdentityKey, IdentityError> {
        IdentityKey::parse(&self.fingerprint, &self.name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Malformed message: {0}")]
    Decode(String),
}

/// Encode a message as JSON bytes
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(message).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decode a JSON message of a known shape
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(data).map_err(|e| ProtocolError::Decode(e.to_string()))
}

/// Wire names of every client message
pub const CLIENT_MESSAGE_KINDS: [&str; 11] = [
    "set-identity",
    "join-room",
    "request-ship",
    "request-map",
    "engine-on",
    "weapon-firing",
    "set-angle",
    "ship-destroyed",
    "rotate-attachments",
    "detach-attachment",
    "throw-attachment",
];

/// Only the tag; the payload is left for the second pass
#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

/// A decoded client frame
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Message(ClientMessage),
    /// Well-formed envelope carrying a tag this server does not know
    Unknown(String),
}

/// Decode a client frame. Unknown tags are reported separately from
/// malformed JSON and malformed payloads of known messages.
pub fn decode_client(data: &[u8]) -> Result<Incoming, ProtocolError> {
    let envelope: Envelope = decode(data)?;
    if !CLIENT_MESSAGE_KINDS.contains(&envelope.kind.as_str()) {
        return Ok(Incoming::Unknown(envelope.kind));
    }
    decode(data).map(Incoming::Message)
}
