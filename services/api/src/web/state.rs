//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the realtime change feed.

use crate::config::Config;
use academeet_core::ports::DatabaseService;
use academeet_core::projection::{ChangeOp, SlotEvent};
use academeet_core::domain::Slot;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the slot change feed. A subscriber that falls further behind
/// than this observes a `Lagged` error and must re-snapshot.
const EVENT_CHANNEL_CAPACITY: usize = 256;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    /// Fan-out channel for slot table changes. Handlers publish after every
    /// successful mutation; WebSocket connections subscribe.
    pub slot_events: broadcast::Sender<SlotEvent>,
}

impl AppState {
    pub fn new(db: Arc<dyn DatabaseService>, config: Arc<Config>) -> Self {
        let (slot_events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            config,
            slot_events,
        }
    }

    /// Publishes one row change to every connected viewer. A send error only
    /// means nobody is subscribed right now, which is fine.
    pub fn publish(&self, op: ChangeOp, slot: Slot) {
        let _ = self.slot_events.send(SlotEvent::new(op, slot));
    }

    /// Publishes a batch of changes with the same operation, e.g. the slot
    /// rows created by a window create/edit.
    pub fn publish_all(&self, op: ChangeOp, slots: impl IntoIterator<Item = Slot>) {
        for slot in slots {
            self.publish(op, slot);
        }
    }
}
