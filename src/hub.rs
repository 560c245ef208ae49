// Map event hub: one broadcast room per map id, fanned out to joined sockets.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::metrics;
use crate::protocol::{ClientMessage, ProtocolError, ServerEvent};

/// Per-room buffer. Slow sockets past this many frames see a lag warning.
const ROOM_CAPACITY: usize = 64;

/// Frames queued for one socket before its forwarders wait on it.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Rooms a single socket may be joined to at once.
pub const MAX_JOINED_ROOMS: usize = 16;

/// Outbound queue for one socket, sized for `Membership`.
pub fn outbound_channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

struct Room {
    tx: broadcast::Sender<String>,
    members: usize,
}

/// Broadcast rooms keyed by map id. A room opens on its first `subscribe`
/// and closes when its last member calls `release`.
pub struct MapHub {
    rooms: Mutex<HashMap<String, Room>>,
}

impl MapHub {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a map's room, creating it if needed. Pair every call with
    /// `release`.
    pub fn subscribe(&self, map_id: &str) -> broadcast::Receiver<String> {
        let mut rooms = self.rooms.lock().unwrap();
        let room = rooms.entry(map_id.to_string()).or_insert_with(|| {
            tracing::debug!(map_id, "Opening room");
            Room {
                tx: broadcast::channel(ROOM_CAPACITY).0,
                members: 0,
            }
        });
        room.members += 1;
        let rx = room.tx.subscribe();
        metrics::ACTIVE_ROOMS.set(rooms.len() as i64);
        rx
    }

    /// Give back one subscription. The room is closed with its last member.
    pub fn release(&self, map_id: &str) {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(room) = rooms.get_mut(map_id) {
            room.members = room.members.saturating_sub(1);
            if room.members == 0 {
                rooms.remove(map_id);
                tracing::debug!(map_id, "Closing room");
            }
        }
        metrics::ACTIVE_ROOMS.set(rooms.len() as i64);
    }

    /// Send an event to every socket joined to its map. Returns the number of
    /// receivers reached; a room nobody joined is a no-op.
    pub fn publish(&self, event: &ServerEvent) -> Result<usize, ProtocolError> {
        let json = event.to_json()?;
        let rooms = self.rooms.lock().unwrap();
        let reached = match rooms.get(event.map_id()) {
            Some(room) => room.tx.send(json).unwrap_or(0),
            None => 0,
        };
        metrics::EVENTS_PUBLISHED_TOTAL
            .with_label_values(&[event.name()])
            .inc();
        tracing::debug!(
            map_id = event.map_id(),
            event = event.name(),
            reached,
            "Published map event"
        );
        Ok(reached)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().unwrap().len()
    }
}

impl Default for MapHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One client's room memberships. Each joined room gets a forwarding task
/// that copies room frames into the client's bounded outbound queue. A full
/// queue holds the forwarder back, and the room buffer then drops the oldest
/// frames for that client.
pub struct Membership {
    hub: Arc<MapHub>,
    out: mpsc::Sender<String>,
    joined: HashMap<String, JoinHandle<()>>,
}

impl Membership {
    pub fn new(hub: Arc<MapHub>, out: mpsc::Sender<String>) -> Self {
        Self {
            hub,
            out,
            joined: HashMap::new(),
        }
    }

    /// Apply a join or leave. Joining twice and leaving an unjoined map are
    /// both no-ops, as is a join past `MAX_JOINED_ROOMS`. Must run inside a
    /// tokio runtime.
    pub fn apply(&mut self, msg: &ClientMessage) {
        match msg {
            ClientMessage::JoinMap { map_id } => self.join(map_id),
            ClientMessage::LeaveMap { map_id } => self.leave(map_id),
        }
    }

    fn join(&mut self, map_id: &str) {
        if self.joined.contains_key(map_id) {
            return;
        }
        if self.joined.len() >= MAX_JOINED_ROOMS {
            tracing::warn!(map_id, "Join refused, already in {MAX_JOINED_ROOMS} rooms");
            return;
        }
        // Subscribe before spawning so frames published right after the
        // join are not missed.
        let mut rx = self.hub.subscribe(map_id);
        let out = self.out.clone();
        let room = map_id.to_string();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(frame) => {
                        if out.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(map_id = %room, "Client lagged, skipped {n} map events");
                    }
                }
            }
        });
        self.joined.insert(map_id.to_string(), handle);
        tracing::info!(map_id, "Joined map room");
    }

    fn leave(&mut self, map_id: &str) {
        if let Some(handle) = self.joined.remove(map_id) {
            handle.abort();
            self.hub.release(map_id);
            tracing::info!(map_id, "Left map room");
        }
    }

    pub fn is_joined(&self, map_id: &str) -> bool {
        self.joined.contains_key(map_id)
    }

    pub fn joined_count(&self) -> usize {
        self.joined.len()
    }

    /// Leave every room.
    pub fn leave_all(&mut self) {
        for (map_id, handle) in self.joined.drain() {
            handle.abort();
            self.hub.release(&map_id);
        }
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.leave_all();
    }
}
