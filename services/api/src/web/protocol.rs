//! services/api/src/web/protocol.rs
//!
//! Wire representations of the domain types, plus the WebSocket message
//! protocol for the realtime slot feed. Domain types stay serde-free; these
//! DTOs are the only shapes that cross the network.

use academeet_core::domain::{Slot, SlotOffer};
use academeet_core::projection::{ChangeOp, SlotEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Row DTOs
//=========================================================================================

/// One slot row as clients see it.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct SlotDto {
    pub id: Uuid,
    pub window_id: Uuid,
    pub professor_id: Uuid,
    pub student_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub agenda: Option<String>,
}

impl From<&Slot> for SlotDto {
    fn from(slot: &Slot) -> Self {
        Self {
            id: slot.id,
            window_id: slot.window_id,
            professor_id: slot.professor_id,
            student_id: slot.student_id,
            start_time: slot.start_time,
            end_time: slot.end_time,
            status: slot.status.to_string(),
            agenda: slot.agenda.clone(),
        }
    }
}

/// A bookable slot joined with the context a student browsing the catalogue
/// needs: the window topic and the professor's name.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct SlotOfferDto {
    #[serde(flatten)]
    pub slot: SlotDto,
    pub topic: String,
    pub professor_name: String,
}

impl From<&SlotOffer> for SlotOfferDto {
    fn from(offer: &SlotOffer) -> Self {
        Self {
            slot: SlotDto::from(&offer.slot),
            topic: offer.topic.clone(),
            professor_name: offer.professor_name.clone(),
        }
    }
}

fn op_name(op: ChangeOp) -> &'static str {
    match op {
        ChangeOp::Insert => "insert",
        ChangeOp::Update => "update",
        ChangeOp::Delete => "delete",
    }
}

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribes to a table's change feed. This must be the first message
    /// sent on the connection; only the `slots` table is served.
    Subscribe { table: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the subscription. Followed immediately by a `Snapshot`.
    Subscribed { table: String },

    /// The full current state of the slot table. Also re-sent if the client
    /// fell too far behind the change feed.
    Snapshot { slots: Vec<SlotDto> },

    /// One row change: `operation` is `insert`, `update` or `delete`.
    Change { operation: String, row: SlotDto },

    /// Reports a fatal error to the client, which should display an error message.
    Error { message: String },
}

impl ServerMessage {
    pub fn change(event: &SlotEvent) -> Self {
        ServerMessage::Change {
            operation: op_name(event.op).to_string(),
            row: SlotDto::from(&event.slot),
        }
    }
}
