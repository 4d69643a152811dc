//! NotificationHub: room-based push to connected sessions
//!
//! ```text
//! OrderSynchronizer / emit endpoint
//!       │ publish(room, event, payload)
//!       ▼
//! NotificationHub
//!   ├── sessions: session_id → bounded mpsc sender
//!   └── rooms:    room → session ids
//!         │ try_send (full or closed queues drop the message)
//!         ▼
//!   WS handler per session (forwards to the socket)
//! ```
//!
//! Delivery is at-most-once. Nothing here is persisted; a reconnecting
//! session joins its rooms again.

use dashmap::{DashMap, DashSet};
use serde::Serialize;
use serde_json::Value;
use shared::notify::{Room, ServerMessage};
use shared::util::now_millis;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub type SessionId = u64;

/// Push side of the notification channel
pub trait Notifier: Send + Sync {
    /// Send to every session in `room`; returns how many accepted the message
    fn publish(&self, room: &Room, event: &str, payload: &Value) -> usize;

    /// Send to every connected session
    fn publish_broadcast(&self, event: &str, payload: &Value) -> usize;
}

struct Session {
    tx: mpsc::Sender<ServerMessage>,
    rooms: HashSet<Room>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubHealth {
    pub healthy: bool,
    pub connections: usize,
    pub rooms: BTreeMap<String, usize>,
    pub timestamp: i64,
}

pub struct NotificationHub {
    sessions: DashMap<SessionId, Session>,
    rooms: DashMap<Room, DashSet<SessionId>>,
    next_id: AtomicU64,
    /// Per-session outbound queue capacity
    buffer: usize,
}

impl NotificationHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            rooms: DashMap::new(),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// New session with its outbound queue
    pub fn register(&self) -> (SessionId, mpsc::Receiver<ServerMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        self.sessions.insert(
            id,
            Session {
                tx,
                rooms: HashSet::new(),
            },
        );
        tracing::debug!(session_id = id, "Notification session registered");
        (id, rx)
    }

    /// Drop a session and its room memberships
    pub fn unregister(&self, session_id: SessionId) {
        let Some((_, session)) = self.sessions.remove(&session_id) else {
            return;
        };
        for room in &session.rooms {
            self.remove_member(room, session_id);
        }
        tracing::debug!(session_id, rooms = session.rooms.len(), "Notification session closed");
    }

    /// Returns false when the session is unknown
    pub fn join(&self, session_id: SessionId, room: Room) -> bool {
        {
            let Some(mut session) = self.sessions.get_mut(&session_id) else {
                return false;
            };
            session.rooms.insert(room.clone());
        }
        self.rooms.entry(room).or_default().insert(session_id);
        true
    }

    pub fn leave(&self, session_id: SessionId, room: &Room) -> bool {
        let was_member = self
            .sessions
            .get_mut(&session_id)
            .is_some_and(|mut s| s.rooms.remove(room));
        self.remove_member(room, session_id);
        was_member
    }

    fn remove_member(&self, room: &Room, session_id: SessionId) {
        if let Some(members) = self.rooms.get(room) {
            members.remove(&session_id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }

    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn room_size(&self, room: &Room) -> usize {
        self.rooms.get(room).map_or(0, |m| m.len())
    }

    pub fn health(&self) -> HubHealth {
        HubHealth {
            healthy: true,
            connections: self.connection_count(),
            rooms: self
                .rooms
                .iter()
                .map(|entry| (entry.key().to_string(), entry.value().len()))
                .collect(),
            timestamp: now_millis(),
        }
    }

    /// Queue a message for one session
    pub fn send_to(&self, session_id: SessionId, message: ServerMessage) -> bool {
        let Some(session) = self.sessions.get(&session_id) else {
            return false;
        };
        match session.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(msg)) => {
                tracing::warn!(session_id, event = %msg.event, "Session queue full, message dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    fn deliver(&self, targets: Vec<SessionId>, event: &str, payload: &Value) -> usize {
        targets
            .into_iter()
            .filter(|id| self.send_to(*id, ServerMessage::new(event, payload.clone())))
            .count()
    }
}

impl Notifier for NotificationHub {
    fn publish(&self, room: &Room, event: &str, payload: &Value) -> usize {
        // Collect first so no room shard is held while sending
        let targets: Vec<SessionId> = match self.rooms.get(room) {
            Some(members) => members.iter().map(|id| *id).collect(),
            None => return 0,
        };
        let delivered = self.deliver(targets, event, payload);
        tracing::debug!(room = %room, event, delivered, "Published");
        delivered
    }

    fn publish_broadcast(&self, event: &str, payload: &Value) -> usize {
        let targets: Vec<SessionId> = self.sessions.iter().map(|s| *s.key()).collect();
        self.deliver(targets, event, payload)
    }
}
