//! crates/academeet_core/src/cancellation.rs
//!
//! Professor-initiated cancellations keep an audit trail inside the slot's
//! agenda field: the reason and the student's original agenda are folded
//! into one annotated string, and the notification surface parses them back
//! out. The textual convention here is the contract both sides share.

/// Marker that opens every professor-cancellation annotation.
pub const CANCELLED_MARKER: &str = "[CANCELLED BY PROFESSOR]";
const REASON_LABEL: &str = "Reason:";
const ORIGINAL_LABEL: &str = "[Original]:";

/// Reason used when a whole window is removed while slots in it were booked.
pub const WINDOW_REMOVED_REASON: &str = "Consultation window removed";

/// The parsed form of an annotated agenda.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationNote {
    pub reason: String,
    pub original_agenda: Option<String>,
}

/// Builds the agenda text stored on a cancelled slot:
/// `[CANCELLED BY PROFESSOR] Reason: <reason> [Original]: <agenda>`.
pub fn annotate(reason: &str, original_agenda: Option<&str>) -> String {
    match original_agenda {
        Some(original) => format!(
            "{} {} {} {} {}",
            CANCELLED_MARKER,
            REASON_LABEL,
            reason.trim(),
            ORIGINAL_LABEL,
            original
        ),
        None => format!("{} {} {}", CANCELLED_MARKER, REASON_LABEL, reason.trim()),
    }
}

/// Recovers the reason and original agenda from an annotated string.
/// Returns `None` for agendas that were never annotated by `annotate`.
pub fn parse(agenda: &str) -> Option<CancellationNote> {
    let rest = agenda.strip_prefix(CANCELLED_MARKER)?.trim_start();
    let rest = rest.strip_prefix(REASON_LABEL)?.trim_start();

    match rest.split_once(ORIGINAL_LABEL) {
        Some((reason, original)) => Some(CancellationNote {
            reason: reason.trim().to_string(),
            original_agenda: Some(original.trim().to_string()),
        }),
        None => Some(CancellationNote {
            reason: rest.trim().to_string(),
            original_agenda: None,
        }),
    }
}
