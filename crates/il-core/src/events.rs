//! Component event notifications.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring-buffer of recent events, so that a client attaching late (or a test
//! running without a subscriber) can still inspect what a component emitted.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::command::CommandKind;
use crate::error::ErrorCode;
use crate::ids::{BufferId, ComponentUuid};
use crate::types::{IlState, PortDirection};

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 256;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A command finished. `state` is set for `StateSet`, `port` for port
    /// commands.
    CmdComplete {
        command: CommandKind,
        state: Option<IlState>,
        port: Option<u32>,
    },
    /// An asynchronous error, including the forced fatal error.
    Error { code: ErrorCode, message: String },
    /// A buffer was handed back to the client (`EmptyBufferDone` on input
    /// ports, `FillBufferDone` on output ports).
    BufferDone {
        port: u32,
        direction: PortDirection,
        buffer: BufferId,
    },
    /// A marked buffer reached the component that was asked to report it.
    MarkReached { port: u32, mark: u64 },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event attributed to one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Emitting component.
    pub component: ComponentUuid,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event with a fresh UUID and the current timestamp.
    pub fn new(component: ComponentUuid, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            component,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_EVENTS`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    /// Subscribe to the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event to all current subscribers and store it in the
    /// ring buffer.
    pub fn publish(&self, component: ComponentUuid, payload: EventPayload) {
        let event = Event::new(component, payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }

    /// Every retained event emitted by `component`, oldest first.
    pub fn history_for(&self, component: ComponentUuid) -> Vec<EventPayload> {
        let recent = self.recent.read();
        recent
            .iter()
            .rev()
            .filter(|e| e.component == component)
            .map(|e| e.payload.clone())
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
