//! Pure scheduling policy.
//!
//! No store access here: the coordinator fetches a participant's booked
//! slots from the relationship store and asks this module whether a
//! candidate window is legal. Evaluated independently for each of the two
//! participants; either conflicting rejects the request.

use chrono::{Duration, NaiveDateTime};

use medilink_core::schedule::{BookedSlot, TimeSlot};

/// Wire format for consultation start times, interpreted in the server's
/// fixed local time zone.
pub const START_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Parse a requested start time. `None` for anything outside the format.
pub fn parse_start(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, START_FORMAT).ok()
}

/// The effective `[start, start + duration)` window of a consultation.
pub fn effective_window(start: NaiveDateTime, duration_minutes: i64) -> TimeSlot {
    TimeSlot::new(start, start + Duration::minutes(duration_minutes))
}

/// First booked slot overlapping the candidate window, if any.
pub fn find_conflict<'a>(
    booked: &'a [BookedSlot],
    candidate: &TimeSlot,
) -> Option<&'a BookedSlot> {
    booked.iter().find(|b| b.slot.overlaps(candidate))
}
