//! Connection hub
//!
//! Per-connection outbound queues plus per-room subscriptions. The hub is the
//! only thing the gateway talks to when it wants bytes on the wire; the
//! transport owns the other end of every queue.
//!
//! Queues are bounded. A connection that stops reading loses frames rather
//! than growing server memory; snapshots are periodic, so the next one
//! replaces whatever was dropped.

use std::sync::Arc;
use std::time::Instant;

use hashbrown::{HashMap, HashSet};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender};
use tracing::{debug, warn};

use crate::game::constants::net::OUTBOUND_QUEUE_CAPACITY;
use crate::lobby::identity::ConnectionId;
use crate::lobby::room::RoomId;
use crate::net::protocol::{encode, ServerMessage};

/// Encoded payload, shared between every subscriber of a broadcast
pub type Frame = Arc<[u8]>;

pub fn outbound_channel() -> (Sender<Frame>, Receiver<Frame>) {
    tokio::sync::mpsc::channel(OUTBOUND_QUEUE_CAPACITY)
}

#[derive(Debug)]
struct Connection {
    sender: Sender<Frame>,
    room: Option<RoomId>,
    created_at: Instant,
    frames_sent: u64,
    frames_dropped: u64,
    /// Drops since the queue last accepted a frame
    stalled: u64,
}

enum Push {
    Sent,
    Dropped,
    Gone,
}

/// Delivery totals of one send or publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub frames: u64,
    pub bytes: u64,
    /// Frames discarded because the receiver's queue was full
    pub dropped: u64,
}

impl Delivery {
    fn record(&mut self, push: Push, bytes: usize) {
        match push {
            Push::Sent => {
                self.frames += 1;
                self.bytes += bytes as u64;
            }
            Push::Dropped => self.dropped += 1,
            Push::Gone => {}
        }
    }
}

#[derive(Debug, Default)]
pub struct ConnectionHub {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: ConnectionId, sender: Sender<Frame>) {
        let previous = self.connections.insert(
            id,
            Connection {
                sender,
                room: None,
                created_at: Instant::now(),
                frames_sent: 0,
                frames_dropped: 0,
                stalled: 0,
            },
        );
        if previous.is_some() {
            warn!("Connection {} registered twice", id);
        }
    }

    pub fn unregister(&mut self, id: ConnectionId) -> bool {
        self.unsubscribe(id);
        match self.connections.remove(&id) {
            Some(conn) => {
                debug!(
                    "Connection {} closed after {:?}, {} frames sent, {} dropped",
                    id,
                    conn.created_at.elapsed(),
                    conn.frames_sent,
                    conn.frames_dropped
                );
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Subscribe a connection to a room, leaving any previous room
    pub fn subscribe(&mut self, id: ConnectionId, room: RoomId) -> bool {
        let previous = match self.connections.get_mut(&id) {
            Some(conn) => conn.room.replace(room),
            None => return false,
        };
        if let Some(previous) = previous.filter(|p| *p != room) {
            self.leave_room_set(id, previous);
        }
        self.rooms.entry(room).or_default().insert(id);
        true
    }

    pub fn unsubscribe(&mut self, id: ConnectionId) {
        if let Some(room) = self.connections.get_mut(&id).and_then(|c| c.room.take()) {
            self.leave_room_set(id, room);
        }
    }

    fn leave_room_set(&mut self, id: ConnectionId, room: RoomId) {
        if let Some(members) = self.rooms.get_mut(&room) {
            members.remove(&id);
            if members.is_empty() {
                self.rooms.remove(&room);
            }
        }
    }

    pub fn subscribers(&self, room: RoomId) -> usize {
        self.rooms.get(&room).map_or(0, HashSet::len)
    }

    /// Drop every subscription to a room that no longer exists
    pub fn close_room(&mut self, room: RoomId) {
        if let Some(members) = self.rooms.remove(&room) {
            for id in members {
                if let Some(conn) = self.connections.get_mut(&id) {
                    conn.room = None;
                }
            }
        }
    }

    fn push(&mut self, id: ConnectionId, frame: &Frame) -> Push {
        let Some(conn) = self.connections.get_mut(&id) else {
            return Push::Gone;
        };
        match conn.sender.try_send(frame.clone()) {
            Ok(()) => {
                if conn.stalled > 0 {
                    debug!("Connection {} resumed after {} dropped frames", id, conn.stalled);
                    conn.stalled = 0;
                }
                conn.frames_sent += 1;
                Push::Sent
            }
            Err(TrySendError::Full(_)) => {
                if conn.stalled == 0 {
                    warn!("Outbound queue of connection {} is full, dropping frames", id);
                }
                conn.stalled += 1;
                conn.frames_dropped += 1;
                Push::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Outbound queue of connection {} is closed", id);
                Push::Gone
            }
        }
    }

    /// Send one message to one connection
    pub fn send(&mut self, id: ConnectionId, message: &ServerMessage) -> Delivery {
        let mut delivery = Delivery::default();
        let frame: Frame = match encode(message) {
            Ok(bytes) => bytes.into(),
            Err(e) => {
                warn!("Failed to encode message for {}: {}", id, e);
                return delivery;
            }
        };
        let push = self.push(id, &frame);
        delivery.record(push, frame.len());
        delivery
    }

    /// Encode once, send to every subscriber of `room`
    pub fn publish(&mut self, room: RoomId, message: &ServerMessage) -> Delivery {
        let mut delivery = Delivery::default();
        let Some(members) = self.rooms.get(&room) else {
            return delivery;
        };
        let members: Vec<ConnectionId> = members.iter().copied().collect();

        let frame: Frame = match encode(message) {
            Ok(bytes) => bytes.into(),
            Err(e) => {
                warn!("Failed to encode broadcast for room {}: {}", room, e);
                return delivery;
            }
        };
        for id in members {
            let push = self.push(id, &frame);
            delivery.record(push, frame.len());
        }
        delivery
    }
}
