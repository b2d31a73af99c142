//! Error taxonomy for coordinator operations.

use std::fmt;

use thiserror::Error;

use medilink_core::{ConsultationStatus, EntityId, RecordKind, StoreError};

/// Which store holds the stray state after a diverged multi-step write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreSide {
    Entity,
    Relationship,
}

impl fmt::Display for StoreSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreSide::Entity => "entity",
            StoreSide::Relationship => "relationship",
        })
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: EntityId },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("scheduling conflict: {kind} {id} already has a booking overlapping the requested window")]
    SchedulingConflict { kind: RecordKind, id: EntityId },

    #[error("illegal status transition: {from} -> {to}")]
    InvalidTransition {
        from: ConsultationStatus,
        to: ConsultationStatus,
    },

    /// A multi-step write diverged after partial commit and compensation
    /// failed. Carries everything an operator needs for manual repair:
    /// the record kind, the orphaned id, and the store the stray state
    /// lives in. Never swallowed.
    #[error("cross-store state diverged for {kind} {id} ({store} store): {detail}")]
    PartialFailure {
        kind: RecordKind,
        id: EntityId,
        store: StoreSide,
        detail: String,
    },

    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for CoordinatorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
