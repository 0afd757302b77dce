//! services/api/src/web/windows.rs
//!
//! Handlers for a professor's consultation windows: create, list, edit,
//! delete, and listing the slots under one window. Validation (including
//! slot generation) always runs before any row is written, so a rejected
//! request changes nothing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use academeet_core::cancellation;
use academeet_core::domain::{Caller, ConsultationWindow, NewWindow, Slot, SlotStatus};
use academeet_core::projection::ChangeOp;
use academeet_core::schedule::validate_window;

use crate::web::protocol::SlotDto;
use crate::web::state::AppState;
use crate::web::{port_error_response, require_professor};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct WindowRequest {
    /// Calendar date, `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Wall-clock start, `HH:MM` or `HH:MM:SS`.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Per-slot duration in minutes, 10 to 60.
    pub slot_minutes: u32,
    pub topic: String,
}

#[derive(Serialize, ToSchema)]
pub struct WindowResponse {
    pub window_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: u32,
    pub topic: String,
    pub slots_created: usize,
}

impl WindowResponse {
    fn new(window: &ConsultationWindow, slots_created: usize) -> Self {
        Self {
            window_id: window.id,
            date: window.date,
            start_time: window.start_time,
            end_time: window.end_time,
            slot_minutes: window.slot_minutes,
            topic: window.topic.clone(),
            slots_created,
        }
    }
}

fn to_new_window(req: &WindowRequest, professor_id: Uuid) -> NewWindow {
    NewWindow {
        professor_id,
        date: req.date,
        start_time: req.start_time,
        end_time: req.end_time,
        slot_minutes: req.slot_minutes,
        topic: req.topic.trim().to_string(),
    }
}

/// Loads a window and verifies the caller owns it. Ownership misses are
/// reported with the same 403 regardless of whether the window exists for
/// somebody else.
async fn owned_window(
    state: &AppState,
    caller: &Caller,
    window_id: Uuid,
) -> Result<ConsultationWindow, (StatusCode, String)> {
    let window = state
        .db
        .get_window(window_id)
        .await
        .map_err(port_error_response)?;
    if window.professor_id != caller.user_id {
        return Err((StatusCode::FORBIDDEN, "Forbidden".to_string()));
    }
    Ok(window)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /windows - Declare an availability window and generate its slots
#[utoipa::path(
    post,
    path = "/windows",
    request_body = WindowRequest,
    responses(
        (status = 201, description = "Window created with its slots", body = WindowResponse),
        (status = 400, description = "Invalid window definition"),
        (status = 403, description = "Caller is not a professor"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_window_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(req): Json<WindowRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_professor(&caller)?;

    // Compute-before-commit: the generated intervals are the proof the
    // window is valid, and nothing has been written yet if this fails.
    let new_window = to_new_window(&req, caller.user_id);
    let intervals = validate_window(&new_window, Utc::now())
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let (window, slots) = state
        .db
        .create_window(new_window, &intervals)
        .await
        .map_err(port_error_response)?;

    let slots_created = slots.len();
    state.publish_all(ChangeOp::Insert, slots);

    Ok((
        StatusCode::CREATED,
        Json(WindowResponse::new(&window, slots_created)),
    ))
}

/// GET /windows - The calling professor's windows, most recent date first
#[utoipa::path(
    get,
    path = "/windows",
    responses(
        (status = 200, description = "The professor's windows", body = [WindowResponse]),
        (status = 403, description = "Caller is not a professor")
    )
)]
pub async fn list_windows_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_professor(&caller)?;

    let windows = state
        .db
        .list_windows(caller.user_id)
        .await
        .map_err(port_error_response)?;

    let body: Vec<WindowResponse> = windows
        .iter()
        .map(|w| WindowResponse::new(w, 0))
        .collect();
    Ok(Json(body))
}

/// PUT /windows/{id} - Replace a window's definition and regenerate its slots
#[utoipa::path(
    put,
    path = "/windows/{id}",
    params(("id" = Uuid, Path, description = "Window id")),
    request_body = WindowRequest,
    responses(
        (status = 200, description = "Window replaced", body = WindowResponse),
        (status = 400, description = "Invalid window definition"),
        (status = 403, description = "Not the owning professor"),
        (status = 404, description = "Window not found"),
        (status = 409, description = "Window has booked appointments"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn edit_window_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(window_id): Path<Uuid>,
    Json(req): Json<WindowRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_professor(&caller)?;
    owned_window(&state, &caller, window_id).await?;

    // Guard first: any booked slot under the window blocks the edit before
    // anything is validated or touched.
    let existing = state
        .db
        .list_slots_for_window(window_id)
        .await
        .map_err(port_error_response)?;
    if existing.iter().any(|s| s.status == SlotStatus::Booked) {
        return Err((
            StatusCode::CONFLICT,
            "Cannot edit window: it has booked appointments".to_string(),
        ));
    }

    // Then validate the new bounds, so a bad edit never deletes open slots.
    let new_window = to_new_window(&req, caller.user_id);
    let intervals = validate_window(&new_window, Utc::now())
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    // The port re-checks the guard inside the replace transaction with the
    // rows locked, which closes the gap between the check above and here.
    let (window, slots) = state
        .db
        .replace_window(window_id, new_window, &intervals)
        .await
        .map_err(port_error_response)?;

    state.publish_all(ChangeOp::Delete, existing);
    let slots_created = slots.len();
    state.publish_all(ChangeOp::Insert, slots);

    Ok(Json(WindowResponse::new(&window, slots_created)))
}

/// DELETE /windows/{id} - Remove a window and every slot under it
#[utoipa::path(
    delete,
    path = "/windows/{id}",
    params(("id" = Uuid, Path, description = "Window id")),
    responses(
        (status = 204, description = "Window and slots removed"),
        (status = 403, description = "Not the owning professor"),
        (status = 404, description = "Window not found")
    )
)]
pub async fn delete_window_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(window_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_professor(&caller)?;
    owned_window(&state, &caller, window_id).await?;

    let removed = state
        .db
        .delete_window(window_id)
        .await
        .map_err(port_error_response)?;

    // Booked slots caught in the cascade are announced as cancellations so
    // the affected students still get a notification; the rest are plain
    // deletes.
    for slot in removed {
        if slot.status == SlotStatus::Booked {
            let annotated =
                cancellation::annotate(cancellation::WINDOW_REMOVED_REASON, slot.agenda.as_deref());
            let cancelled = Slot {
                status: SlotStatus::Cancelled,
                agenda: Some(annotated),
                ..slot
            };
            state.publish(ChangeOp::Update, cancelled);
        } else {
            state.publish(ChangeOp::Delete, slot);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET /windows/{id}/slots - The slots under one window, sorted by start
#[utoipa::path(
    get,
    path = "/windows/{id}/slots",
    params(("id" = Uuid, Path, description = "Window id")),
    responses(
        (status = 200, description = "The window's slots", body = [SlotDto]),
        (status = 403, description = "Not the owning professor"),
        (status = 404, description = "Window not found")
    )
)]
pub async fn list_window_slots_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(window_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_professor(&caller)?;
    owned_window(&state, &caller, window_id).await?;

    let slots = state
        .db
        .list_slots_for_window(window_id)
        .await
        .map_err(port_error_response)?;

    let body: Vec<SlotDto> = slots.iter().map(SlotDto::from).collect();
    Ok(Json(body))
}
