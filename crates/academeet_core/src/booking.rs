//! crates/academeet_core/src/booking.rs
//!
//! The preconditions a booking request must clear before the storage layer
//! attempts the conditional reservation. The reservation itself (at most one
//! winner per open slot) lives in the `DatabaseService` port; these checks
//! are the pure part that can be rejected without touching storage.

use chrono::{DateTime, Utc};

use crate::domain::Slot;

/// Minimum agenda length, counted in characters.
pub const MIN_AGENDA_CHARS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("agenda must be at least {MIN_AGENDA_CHARS} characters")]
    AgendaTooShort,

    #[error("slot has already passed")]
    AlreadyPassed,
}

/// A student must say what the consultation is for; single-word agendas
/// are rejected before any write happens.
pub fn validate_agenda(agenda: &str) -> Result<(), BookingError> {
    if agenda.trim().chars().count() < MIN_AGENDA_CHARS {
        return Err(BookingError::AgendaTooShort);
    }
    Ok(())
}

/// Slots whose scheduled start is not strictly in the future can no longer
/// be booked.
pub fn ensure_not_started(slot: &Slot, now: DateTime<Utc>) -> Result<(), BookingError> {
    if slot.start_time <= now {
        return Err(BookingError::AlreadyPassed);
    }
    Ok(())
}
