//! services/api/src/web/slots.rs
//!
//! Handlers for the slot lifecycle: browsing open slots, booking, agenda
//! updates, the two cancellation paths, and cleanup of past slots. The
//! contested open->booked transition is a single conditional update in the
//! storage port; everything here is precondition checks and fan-out.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use academeet_core::booking::{ensure_not_started, validate_agenda};
use academeet_core::cancellation;
use academeet_core::domain::Caller;
use academeet_core::projection::ChangeOp;

use crate::web::protocol::{SlotDto, SlotOfferDto};
use crate::web::state::AppState;
use crate::web::{port_error_response, require_professor, require_student};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct BookRequest {
    /// What the consultation is for; at least 10 characters.
    pub agenda: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AgendaRequest {
    pub agenda: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CancelRequest {
    /// Why the professor is cancelling; stored in the audit annotation.
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CleanupRequest {
    pub slot_ids: Vec<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct CleanupResponse {
    pub deleted: usize,
}

/// One cancelled booking, with the reason recovered from the stored
/// annotation, as shown on the student's notification surface.
#[derive(Serialize, ToSchema)]
pub struct NotificationDto {
    pub slot_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub professor_name: String,
    pub topic: String,
    pub reason: String,
    pub original_agenda: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /slots/open - Bookable slots from now on, with topic and professor
#[utoipa::path(
    get,
    path = "/slots/open",
    responses(
        (status = 200, description = "Open future slots", body = [SlotOfferDto])
    )
)]
pub async fn list_open_slots_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let offers = state
        .db
        .list_open_slots(Utc::now())
        .await
        .map_err(port_error_response)?;

    let body: Vec<SlotOfferDto> = offers.iter().map(SlotOfferDto::from).collect();
    Ok(Json(body))
}

/// POST /slots/{id}/book - Reserve an open slot
#[utoipa::path(
    post,
    path = "/slots/{id}/book",
    params(("id" = Uuid, Path, description = "Slot id")),
    request_body = BookRequest,
    responses(
        (status = 200, description = "Slot booked", body = SlotDto),
        (status = 400, description = "Agenda too short"),
        (status = 403, description = "Caller is not a student"),
        (status = 404, description = "Slot not found"),
        (status = 409, description = "Slot already passed or no longer available"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn book_slot_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(slot_id): Path<Uuid>,
    Json(req): Json<BookRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_student(&caller)?;

    // Preconditions in order: agenda floor, then the slot must still lie in
    // the future. Both are rejected before any write.
    validate_agenda(&req.agenda).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let slot = state
        .db
        .get_slot(slot_id)
        .await
        .map_err(port_error_response)?;
    ensure_not_started(&slot, Utc::now()).map_err(|e| (StatusCode::CONFLICT, e.to_string()))?;

    // The conditional update is the sole arbiter of the race: whoever's
    // UPDATE matches the open row wins, everyone else sees a 409.
    let booked = state
        .db
        .book_slot(slot_id, caller.user_id, req.agenda.trim())
        .await
        .map_err(port_error_response)?;

    state.publish(ChangeOp::Update, booked.clone());
    Ok(Json(SlotDto::from(&booked)))
}

/// PUT /slots/{id}/agenda - Rewrite the agenda of the caller's booking
#[utoipa::path(
    put,
    path = "/slots/{id}/agenda",
    params(("id" = Uuid, Path, description = "Slot id")),
    request_body = AgendaRequest,
    responses(
        (status = 200, description = "Agenda updated", body = SlotDto),
        (status = 400, description = "Agenda too short"),
        (status = 403, description = "No active booking for this slot"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn update_agenda_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(slot_id): Path<Uuid>,
    Json(req): Json<AgendaRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_student(&caller)?;

    // The floor applies on update too, not only at booking time.
    validate_agenda(&req.agenda).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let updated = state
        .db
        .update_agenda(slot_id, caller.user_id, req.agenda.trim())
        .await
        .map_err(port_error_response)?;

    state.publish(ChangeOp::Update, updated.clone());
    Ok(Json(SlotDto::from(&updated)))
}

/// POST /slots/{id}/release - Student self-cancel: the slot reopens
#[utoipa::path(
    post,
    path = "/slots/{id}/release",
    params(("id" = Uuid, Path, description = "Slot id")),
    responses(
        (status = 200, description = "Slot released back to open", body = SlotDto),
        (status = 403, description = "No active booking for this slot"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn release_slot_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(slot_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_student(&caller)?;

    // Full release: the slot is immediately rebookable and carries no trace
    // of the previous booking.
    let released = state
        .db
        .release_slot(slot_id, caller.user_id)
        .await
        .map_err(port_error_response)?;

    state.publish(ChangeOp::Update, released.clone());
    Ok(Json(SlotDto::from(&released)))
}

/// POST /slots/{id}/cancel - Professor cancel, keeping an audit trail
#[utoipa::path(
    post,
    path = "/slots/{id}/cancel",
    params(("id" = Uuid, Path, description = "Slot id")),
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Slot cancelled", body = SlotDto),
        (status = 400, description = "Reason must not be empty"),
        (status = 403, description = "Not the owning professor"),
        (status = 404, description = "Slot not found"),
        (status = 409, description = "Slot is not currently booked"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn cancel_slot_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(slot_id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_professor(&caller)?;

    let reason = req.reason.trim();
    if reason.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Cancellation reason must not be empty".to_string(),
        ));
    }

    let slot = state
        .db
        .get_slot(slot_id)
        .await
        .map_err(port_error_response)?;
    if slot.professor_id != caller.user_id {
        return Err((StatusCode::FORBIDDEN, "Forbidden".to_string()));
    }

    // The reason and the student's original agenda are folded into one
    // annotated string; the notification surface parses them back out.
    // The student reference is retained so they can be notified.
    let annotated = cancellation::annotate(reason, slot.agenda.as_deref());
    let cancelled = state
        .db
        .cancel_slot(slot_id, &annotated)
        .await
        .map_err(port_error_response)?;

    state.publish(ChangeOp::Update, cancelled.clone());
    Ok(Json(SlotDto::from(&cancelled)))
}

/// DELETE /slots/{id} - Hard-delete one slot whose time has passed
#[utoipa::path(
    delete,
    path = "/slots/{id}",
    params(("id" = Uuid, Path, description = "Slot id")),
    responses(
        (status = 204, description = "Slot deleted"),
        (status = 403, description = "Not the owning professor"),
        (status = 404, description = "Slot not found"),
        (status = 409, description = "Slot has not ended yet")
    )
)]
pub async fn delete_slot_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(slot_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_professor(&caller)?;

    let now = Utc::now();
    let slot = state
        .db
        .get_slot(slot_id)
        .await
        .map_err(port_error_response)?;
    if slot.professor_id != caller.user_id {
        return Err((StatusCode::FORBIDDEN, "Forbidden".to_string()));
    }
    if slot.end_time >= now {
        return Err((
            StatusCode::CONFLICT,
            "Slot has not ended yet".to_string(),
        ));
    }

    // The delete re-checks ownership and the end-time predicate in the same
    // statement, so the decision above cannot go stale.
    let deleted = state
        .db
        .delete_slot(slot_id, caller.user_id, now)
        .await
        .map_err(port_error_response)?;

    state.publish(ChangeOp::Delete, deleted);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /slots/cleanup - Bulk-delete past slots
#[utoipa::path(
    post,
    path = "/slots/cleanup",
    request_body = CleanupRequest,
    responses(
        (status = 200, description = "Matching past slots deleted", body = CleanupResponse),
        (status = 403, description = "Caller is not a professor"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn cleanup_slots_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<CleanupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_professor(&caller)?;

    // Rows that are not the caller's or have not ended are skipped rather
    // than failing the whole batch.
    let deleted = state
        .db
        .delete_slots(&req.slot_ids, caller.user_id, Utc::now())
        .await
        .map_err(port_error_response)?;

    let count = deleted.len();
    state.publish_all(ChangeOp::Delete, deleted);
    Ok(Json(CleanupResponse { deleted: count }))
}

/// GET /bookings - The calling student's booked slots
#[utoipa::path(
    get,
    path = "/bookings",
    responses(
        (status = 200, description = "The student's bookings", body = [SlotOfferDto]),
        (status = 403, description = "Caller is not a student")
    )
)]
pub async fn list_bookings_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_student(&caller)?;

    let offers = state
        .db
        .list_bookings_for_student(caller.user_id)
        .await
        .map_err(port_error_response)?;

    let body: Vec<SlotOfferDto> = offers.iter().map(SlotOfferDto::from).collect();
    Ok(Json(body))
}

/// GET /notifications - Cancelled bookings of the calling student
#[utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 200, description = "Cancellations affecting the student", body = [NotificationDto]),
        (status = 403, description = "Caller is not a student")
    )
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_student(&caller)?;

    let cancelled = state
        .db
        .list_cancellations_for_student(caller.user_id)
        .await
        .map_err(port_error_response)?;

    let body: Vec<NotificationDto> = cancelled
        .iter()
        .map(|offer| {
            // Agendas that were never annotated still surface, with the raw
            // text standing in for the reason.
            let note = offer
                .slot
                .agenda
                .as_deref()
                .and_then(cancellation::parse);
            let (reason, original_agenda) = match note {
                Some(note) => (note.reason, note.original_agenda),
                None => (
                    offer.slot.agenda.clone().unwrap_or_default(),
                    None,
                ),
            };
            NotificationDto {
                slot_id: offer.slot.id,
                start_time: offer.slot.start_time,
                end_time: offer.slot.end_time,
                professor_name: offer.professor_name.clone(),
                topic: offer.topic.clone(),
                reason,
                original_agenda,
            }
        })
        .collect();

    Ok(Json(body))
}
