//! crates/academeet_core/src/ports.rs
//!
//! Defines the service contract (trait) for the application's storage.
//! This trait forms the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete database behind it. The comments
//! on the conditional operations are part of the contract: implementations
//! must make those checks atomic with the mutation itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ConsultationWindow, NewUser, NewWindow, Slot, SlotInterval, SlotOffer, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the underlying store while
/// still naming the precondition misses the booking state machine cares
/// about, so callers can map each one to a precise response.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Already registered: {0}")]
    AlreadyExists(String),

    /// The conditional reservation matched zero rows: another student won
    /// the race, or the slot was never open.
    #[error("Slot is no longer available")]
    SlotUnavailable,

    /// A professor cancellation found the slot not currently booked.
    #[error("Slot is not currently booked")]
    SlotNotBooked,

    /// A student mutation found no active booking owned by that student.
    /// Deliberately generic: it does not reveal whether the slot exists or
    /// who else may hold it.
    #[error("No active booking for this slot")]
    NotBookingOwner,

    /// The window replace guard found booked slots under the window.
    #[error("Cannot edit window: it has booked appointments")]
    WindowHasBookings,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Port (Trait)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Account Management ---
    async fn create_user(&self, new_user: NewUser) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves an unexpired session id to the user who owns it.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<User>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Consultation Windows ---

    /// Persists a window and its generated slots in one transaction, so a
    /// failed slot insert can never leave an orphaned window behind.
    async fn create_window(
        &self,
        window: NewWindow,
        slots: &[SlotInterval],
    ) -> PortResult<(ConsultationWindow, Vec<Slot>)>;

    async fn get_window(&self, window_id: Uuid) -> PortResult<ConsultationWindow>;

    async fn list_windows(&self, professor_id: Uuid) -> PortResult<Vec<ConsultationWindow>>;

    /// Replaces a window's fields and regenerates its slots in one
    /// transaction. The transaction re-checks, with the slot rows locked,
    /// that none of them is booked; `WindowHasBookings` means nothing was
    /// changed. Slot identities are not preserved across a replace.
    async fn replace_window(
        &self,
        window_id: Uuid,
        window: NewWindow,
        slots: &[SlotInterval],
    ) -> PortResult<(ConsultationWindow, Vec<Slot>)>;

    /// Hard-deletes a window and every slot under it (booked ones included)
    /// in one transaction, returning the slots as they were at deletion so
    /// the caller can fan out the matching change events.
    async fn delete_window(&self, window_id: Uuid) -> PortResult<Vec<Slot>>;

    // --- Slots ---
    async fn get_slot(&self, slot_id: Uuid) -> PortResult<Slot>;

    async fn list_slots_for_window(&self, window_id: Uuid) -> PortResult<Vec<Slot>>;

    /// Every slot row, for realtime snapshots.
    async fn list_all_slots(&self) -> PortResult<Vec<Slot>>;

    async fn list_open_slots(&self, from: DateTime<Utc>) -> PortResult<Vec<SlotOffer>>;

    async fn list_bookings_for_student(&self, student_id: Uuid) -> PortResult<Vec<SlotOffer>>;

    async fn list_cancellations_for_student(&self, student_id: Uuid)
        -> PortResult<Vec<SlotOffer>>;

    /// The atomic reservation: one conditional update predicated on
    /// `status = open`. Zero matched rows is `SlotUnavailable`. This is the
    /// sole concurrency control for the open→booked transition.
    async fn book_slot(&self, slot_id: Uuid, student_id: Uuid, agenda: &str) -> PortResult<Slot>;

    /// Student self-cancellation: back to open, student and agenda cleared,
    /// predicated on the booking belonging to `student_id`. Zero matched
    /// rows is `NotBookingOwner`.
    async fn release_slot(&self, slot_id: Uuid, student_id: Uuid) -> PortResult<Slot>;

    /// Rewrites the agenda of a booking owned by `student_id`, same
    /// predicate as `release_slot`.
    async fn update_agenda(
        &self,
        slot_id: Uuid,
        student_id: Uuid,
        agenda: &str,
    ) -> PortResult<Slot>;

    /// Professor cancellation: booked→cancelled with the annotated agenda,
    /// retaining `student_id` for the notification surface. Predicated on
    /// `status = booked`; zero matched rows is `SlotNotBooked`.
    async fn cancel_slot(&self, slot_id: Uuid, annotated_agenda: &str) -> PortResult<Slot>;

    /// Hard delete of one slot, predicated on ownership and on the slot
    /// having ended before `now`. Returns the deleted row.
    async fn delete_slot(
        &self,
        slot_id: Uuid,
        professor_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Slot>;

    /// Bulk hard delete. Deletes the subset of `slot_ids` owned by the
    /// professor and already ended; rows that do not match the predicate
    /// are skipped, and the deleted rows are returned.
    async fn delete_slots(
        &self,
        slot_ids: &[Uuid],
        professor_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<Slot>>;
}
