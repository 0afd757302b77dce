//! crates/academeet_core/src/schedule.rs
//!
//! Slot generation and window validation. This is the scheduling core:
//! a pure function that slices an availability window into fixed-duration
//! bookable intervals, and the validation that must pass before a window
//! (or an edit of one) is allowed to touch storage.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::domain::{NewWindow, SlotInterval};

/// Smallest allowed per-slot duration, in minutes.
pub const MIN_SLOT_MINUTES: u32 = 10;
/// Largest allowed per-slot duration, in minutes.
pub const MAX_SLOT_MINUTES: u32 = 60;

//=========================================================================================
// Errors
//=========================================================================================

/// Why a window definition was rejected. All of these are detected before
/// any row is written, so a failed create/edit changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("end time must be after start time")]
    EndNotAfterStart,

    #[error("slot duration must be between {MIN_SLOT_MINUTES} and {MAX_SLOT_MINUTES} minutes")]
    DurationOutOfRange,

    #[error("topic must not be empty")]
    EmptyTopic,

    #[error("window must not start in the past")]
    StartInPast,

    #[error("time range too short for a single slot")]
    RangeTooShort,
}

//=========================================================================================
// Slot generation
//=========================================================================================

/// Combines a window's calendar date and wall-clock bounds into the absolute
/// interval the generator works on. All times are UTC.
pub fn window_span(
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        date.and_time(start_time).and_utc(),
        date.and_time(end_time).and_utc(),
    )
}

/// Slices `[start, end)` into consecutive slots of exactly `slot_minutes`.
///
/// The cursor walks forward from `start`; a slot is emitted only while it
/// fits entirely inside the window, so a slot ending exactly at `end` is
/// included and any shorter remainder at the tail is dropped. A window
/// shorter than one duration unit yields no slots at all; callers must treat
/// that as the "time range too short" error rather than a silent no-op.
///
/// Pure and idempotent: identical inputs always produce identical output.
pub fn generate_slots(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    slot_minutes: u32,
) -> Vec<SlotInterval> {
    let step = Duration::minutes(i64::from(slot_minutes));
    let mut slots = Vec::new();
    if step <= Duration::zero() {
        return slots;
    }

    let mut cursor = start;
    while cursor + step <= end {
        slots.push(SlotInterval {
            start: cursor,
            end: cursor + step,
        });
        cursor += step;
    }
    slots
}

//=========================================================================================
// Window validation (compute-before-commit)
//=========================================================================================

/// Validates a window definition and returns the slots it would generate.
///
/// Checks run in a fixed order: time ordering, duration bounds, topic,
/// not-in-the-past, and finally that at least one slot fits. Nothing is
/// persisted here; callers only write the window and slot rows after this
/// returns `Ok`, which is what keeps a bad edit from destroying existing
/// slots and a bad create from leaving an orphaned window behind.
pub fn validate_window(
    window: &NewWindow,
    now: DateTime<Utc>,
) -> Result<Vec<SlotInterval>, ScheduleError> {
    if window.end_time <= window.start_time {
        return Err(ScheduleError::EndNotAfterStart);
    }
    if window.slot_minutes < MIN_SLOT_MINUTES || window.slot_minutes > MAX_SLOT_MINUTES {
        return Err(ScheduleError::DurationOutOfRange);
    }
    if window.topic.trim().is_empty() {
        return Err(ScheduleError::EmptyTopic);
    }

    let (start, end) = window_span(window.date, window.start_time, window.end_time);
    if start < now {
        return Err(ScheduleError::StartInPast);
    }

    let slots = generate_slots(start, end, window.slot_minutes);
    if slots.is_empty() {
        return Err(ScheduleError::RangeTooShort);
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 11).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn window(start: NaiveTime, end: NaiveTime, minutes: u32, topic: &str) -> NewWindow {
        NewWindow {
            professor_id: Uuid::new_v4(),
            date: date(),
            start_time: start,
            end_time: end,
            slot_minutes: minutes,
            topic: topic.to_string(),
        }
    }

    fn long_before() -> DateTime<Utc> {
        date()
            .pred_opt()
            .unwrap()
            .and_time(time(12, 0))
            .and_utc()
    }

    #[test]
    fn one_hour_at_twenty_minutes_gives_three_slots() {
        let (start, end) = window_span(date(), time(9, 0), time(10, 0));
        let slots = generate_slots(start, end, 20);

        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].start, start);
        assert_eq!(slots[2].end, end);
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for slot in &slots {
            assert_eq!(slot.end - slot.start, Duration::minutes(20));
        }
    }

    #[test]
    fn slots_are_sorted_and_never_extend_past_the_window() {
        let (start, end) = window_span(date(), time(8, 30), time(11, 45));
        let slots = generate_slots(start, end, 45);

        assert!(!slots.is_empty());
        for pair in slots.windows(2) {
            assert!(pair[0].start < pair[1].start);
            assert!(pair[0].end <= pair[1].start);
        }
        assert_eq!(slots.first().unwrap().start, start);
        assert!(slots.last().unwrap().end <= end);
    }

    #[test]
    fn trailing_remainder_is_dropped_not_shortened() {
        let (start, end) = window_span(date(), time(9, 0), time(9, 50));
        let slots = generate_slots(start, end, 20);

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].end, start + Duration::minutes(40));
    }

    #[test]
    fn window_shorter_than_one_slot_yields_nothing() {
        let (start, end) = window_span(date(), time(9, 0), time(9, 5));
        assert!(generate_slots(start, end, 15).is_empty());
    }

    #[test]
    fn exact_fit_emits_the_final_slot() {
        let (start, end) = window_span(date(), time(9, 0), time(9, 30));
        let slots = generate_slots(start, end, 30);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].end, end);
    }

    #[test]
    fn non_positive_duration_cannot_loop() {
        let (start, end) = window_span(date(), time(9, 0), time(10, 0));
        assert!(generate_slots(start, end, 0).is_empty());
    }

    #[test]
    fn generation_is_idempotent() {
        let (start, end) = window_span(date(), time(9, 0), time(12, 0));
        assert_eq!(generate_slots(start, end, 25), generate_slots(start, end, 25));
    }

    #[test]
    fn validate_accepts_a_well_formed_window() {
        let slots = validate_window(&window(time(9, 0), time(10, 0), 20, "Thesis"), long_before())
            .expect("valid window");
        assert_eq!(slots.len(), 3);
    }

    #[test]
    fn validate_rejects_inverted_or_equal_bounds() {
        let err = validate_window(&window(time(10, 0), time(9, 0), 20, "Thesis"), long_before());
        assert_eq!(err, Err(ScheduleError::EndNotAfterStart));

        let err = validate_window(&window(time(9, 0), time(9, 0), 20, "Thesis"), long_before());
        assert_eq!(err, Err(ScheduleError::EndNotAfterStart));
    }

    #[test]
    fn validate_enforces_duration_bounds_inclusively() {
        for minutes in [MIN_SLOT_MINUTES, MAX_SLOT_MINUTES] {
            assert!(
                validate_window(&window(time(9, 0), time(11, 0), minutes, "Office"), long_before())
                    .is_ok()
            );
        }
        for minutes in [MIN_SLOT_MINUTES - 1, MAX_SLOT_MINUTES + 1] {
            assert_eq!(
                validate_window(&window(time(9, 0), time(11, 0), minutes, "Office"), long_before()),
                Err(ScheduleError::DurationOutOfRange)
            );
        }
    }

    #[test]
    fn validate_rejects_blank_topic() {
        let err = validate_window(&window(time(9, 0), time(10, 0), 20, "   "), long_before());
        assert_eq!(err, Err(ScheduleError::EmptyTopic));
    }

    #[test]
    fn validate_rejects_windows_that_already_started() {
        let w = window(time(9, 0), time(10, 0), 20, "Office hours");
        let just_after_start = date().and_time(time(9, 1)).and_utc();
        assert_eq!(
            validate_window(&w, just_after_start),
            Err(ScheduleError::StartInPast)
        );

        // Starting exactly now is still allowed.
        let exactly_at_start = date().and_time(time(9, 0)).and_utc();
        assert!(validate_window(&w, exactly_at_start).is_ok());
    }

    #[test]
    fn validate_reports_too_short_ranges_as_an_error() {
        let err = validate_window(&window(time(9, 0), time(9, 5), 15, "Quick check"), long_before());
        assert_eq!(err, Err(ScheduleError::RangeTooShort));
    }
}
