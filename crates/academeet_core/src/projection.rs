//! crates/academeet_core/src/projection.rs
//!
//! The change-feed contract for the slot table and the fold that turns a
//! stream of row changes into the client-visible board of slots. The merge
//! policy is last-writer-wins per slot id, with inserts de-duplicated
//! against rows that are already known (which also makes the harmless race
//! between taking a snapshot and receiving buffered events a non-issue).

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::Slot;

/// The kind of row change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One change to one row of the slot table, broadcast to every viewer.
#[derive(Debug, Clone)]
pub struct SlotEvent {
    pub op: ChangeOp,
    pub slot: Slot,
}

impl SlotEvent {
    pub fn new(op: ChangeOp, slot: Slot) -> Self {
        Self { op, slot }
    }
}

/// A materialized view of the slot table, maintained by folding change
/// events over an initial snapshot.
#[derive(Debug, Default)]
pub struct SlotBoard {
    slots: HashMap<Uuid, Slot>,
}

impl SlotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Vec<Slot>) -> Self {
        Self {
            slots: snapshot.into_iter().map(|s| (s.id, s)).collect(),
        }
    }

    /// Folds one event into the board.
    pub fn apply(&mut self, event: &SlotEvent) {
        match event.op {
            ChangeOp::Insert => {
                // Inserts for rows we already hold are duplicates of the
                // snapshot; the snapshot copy wins.
                self.slots
                    .entry(event.slot.id)
                    .or_insert_with(|| event.slot.clone());
            }
            ChangeOp::Update => {
                self.slots.insert(event.slot.id, event.slot.clone());
            }
            ChangeOp::Delete => {
                self.slots.remove(&event.slot.id);
            }
        }
    }

    pub fn get(&self, slot_id: Uuid) -> Option<&Slot> {
        self.slots.get(&slot_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All rows currently on the board, ordered by start time (ties broken
    /// by id so the order is stable).
    pub fn slots(&self) -> Vec<&Slot> {
        let mut rows: Vec<&Slot> = self.slots.values().collect();
        rows.sort_by_key(|s| (s.start_time, s.id));
        rows
    }
}
