//! Consultation status state machine.
//!
//! The status set is closed. `completed` is the only terminal state: once a
//! consultation is completed no further transition is accepted, including
//! re-entering `completed`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    Requested,
    Scheduled,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

impl ConsultationStatus {
    pub const ALL: [ConsultationStatus; 6] = [
        ConsultationStatus::Requested,
        ConsultationStatus::Scheduled,
        ConsultationStatus::Accepted,
        ConsultationStatus::Rejected,
        ConsultationStatus::Cancelled,
        ConsultationStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Requested => "requested",
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::Accepted => "accepted",
            ConsultationStatus::Rejected => "rejected",
            ConsultationStatus::Cancelled => "cancelled",
            ConsultationStatus::Completed => "completed",
        }
    }

    /// Parse the wire/CLI form. Returns `None` for anything outside the set.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|st| st.as_str() == s)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ConsultationStatus::Completed)
    }

    /// Legal transitions:
    /// - `requested` may move to `accepted` or `rejected`
    /// - any non-terminal state may move to `cancelled` or `completed`
    /// - nothing leaves `completed`
    pub fn can_transition_to(&self, next: ConsultationStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, ConsultationStatus::Cancelled) | (_, ConsultationStatus::Completed) => true,
            (ConsultationStatus::Requested, ConsultationStatus::Accepted)
            | (ConsultationStatus::Requested, ConsultationStatus::Rejected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
