//! services/api/src/web/mod.rs
//!
//! The web layer: REST handlers, auth middleware, the WebSocket feed, and
//! the master OpenAPI definition. The shared error mapping below is the one
//! place port errors become HTTP responses.

pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod slots;
pub mod state;
pub mod windows;
pub mod ws_handler;

use axum::http::StatusCode;
use tracing::error;
use utoipa::OpenApi;

use academeet_core::domain::{Caller, Role};
use academeet_core::ports::PortError;

pub use middleware::require_auth;
pub use ws_handler::ws_handler;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        windows::create_window_handler,
        windows::list_windows_handler,
        windows::edit_window_handler,
        windows::delete_window_handler,
        windows::list_window_slots_handler,
        slots::list_open_slots_handler,
        slots::book_slot_handler,
        slots::update_agenda_handler,
        slots::release_slot_handler,
        slots::cancel_slot_handler,
        slots::delete_slot_handler,
        slots::cleanup_slots_handler,
        slots::list_bookings_handler,
        slots::list_notifications_handler,
    ),
    components(schemas(
        auth::SignupRequest,
        auth::LoginRequest,
        auth::AuthResponse,
        windows::WindowRequest,
        windows::WindowResponse,
        slots::BookRequest,
        slots::AgendaRequest,
        slots::CancelRequest,
        slots::CleanupRequest,
        slots::CleanupResponse,
        slots::NotificationDto,
        protocol::SlotDto,
        protocol::SlotOfferDto,
    )),
    tags(
        (name = "Academeet API", description = "Faculty consultation booking endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Error Mapping
//=========================================================================================

/// Maps a port error to the HTTP response the error taxonomy prescribes:
/// precondition misses become 409s with their specific reason, ownership
/// misses become generic 403s, and store failures become generic 500s with
/// the detail kept in the log.
pub(crate) fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        PortError::AlreadyExists(_)
        | PortError::SlotUnavailable
        | PortError::SlotNotBooked
        | PortError::WindowHasBookings => (StatusCode::CONFLICT, e.to_string()),
        PortError::NotBookingOwner => (StatusCode::FORBIDDEN, e.to_string()),
        PortError::Unauthorized => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
        PortError::Unexpected(detail) => {
            error!("Storage operation failed: {}", detail);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            )
        }
    }
}

/// Professor-only routes answer 403 to students.
pub(crate) fn require_professor(caller: &Caller) -> Result<(), (StatusCode, String)> {
    match caller.role {
        Role::Professor => Ok(()),
        Role::Student => Err((
            StatusCode::FORBIDDEN,
            "Only professors may perform this action".to_string(),
        )),
    }
}

pub(crate) fn require_student(caller: &Caller) -> Result<(), (StatusCode, String)> {
    match caller.role {
        Role::Student => Ok(()),
        Role::Professor => Err((
            StatusCode::FORBIDDEN,
            "Only students may perform this action".to_string(),
        )),
    }
}
