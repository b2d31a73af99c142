//! Half-open time slots used for consultation scheduling.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::types::EntityId;

/// A `[start, end)` interval in server-local time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSlot {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Half-open overlap: back-to-back slots sharing a boundary instant do
    /// not conflict.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// A participant's existing booking as reported by the relationship store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedSlot {
    pub consultation_id: EntityId,
    pub slot: TimeSlot,
}
