//! Store capability contracts consumed by the coordinator.
//!
//! The entity store owns attribute truth; the relationship store owns
//! topology truth and answers the interval queries behind conflict
//! detection. Neither is ever written by anything but the coordinator.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::schedule::BookedSlot;
use crate::status::ConsultationStatus;
use crate::types::{Consultation, Doctor, EntityId, NewRecord, Patient, Record, RecordKind};

/// Errors surfaced by either store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: EntityId },

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Entity Store ──────────────────────────────────────────────────

/// Document persistence for canonical actor and consultation records.
///
/// `find_by_field` matches against the serialized form of a record, which
/// is how the coordinator enforces email uniqueness across collections.
pub trait EntityStore: Send + Sync {
    /// Persist a draft, assigning its id. Returns the stored record.
    fn insert(&self, draft: NewRecord) -> Result<Record, StoreError>;

    fn get(&self, kind: RecordKind, id: &EntityId) -> Result<Option<Record>, StoreError>;

    /// First record of `kind` whose serialized `field` equals `value`.
    fn find_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, StoreError>;

    /// Full-record write: updates an existing record or restores a deleted
    /// one (the compensation path).
    fn put(&self, record: &Record) -> Result<(), StoreError>;

    fn delete(&self, kind: RecordKind, id: &EntityId) -> Result<(), StoreError>;

    fn list(&self, kind: RecordKind) -> Result<Vec<Record>, StoreError>;
}

// ── Relationship Store ────────────────────────────────────────────

/// The actor kinds mirrored as graph nodes. Admins stay out of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorKind {
    Patient,
    Doctor,
}

impl ActorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActorKind::Patient => "Patient",
            ActorKind::Doctor => "Doctor",
        }
    }
}

/// The property projection of an actor record written to its graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorNode {
    pub kind: ActorKind,
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialty: Option<crate::types::Specialty>,
}

impl ActorNode {
    /// Project a record onto its graph node, if the kind has one.
    pub fn from_record(record: &Record) -> Option<ActorNode> {
        match record {
            Record::Patient(p) => Some(Self::from_patient(p)),
            Record::Doctor(d) => Some(Self::from_doctor(d)),
            Record::Admin(_) | Record::Consultation(_) => None,
        }
    }

    pub fn from_patient(p: &Patient) -> ActorNode {
        ActorNode {
            kind: ActorKind::Patient,
            id: p.id.clone(),
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            email: p.email.clone(),
            specialty: None,
        }
    }

    pub fn from_doctor(d: &Doctor) -> ActorNode {
        ActorNode {
            kind: ActorKind::Doctor,
            id: d.id.clone(),
            first_name: d.first_name.clone(),
            last_name: d.last_name.clone(),
            email: d.email.clone(),
            specialty: Some(d.specialty),
        }
    }
}

/// Graph persistence for assignment and participation topology, plus the
/// interval queries behind scheduling.
///
/// Writes within one coordinator operation are issued in a fixed order to
/// bound the cross-store inconsistency window; implementations must not
/// reorder or retry them.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    // Actor node lifecycle.
    async fn create_actor(&self, actor: &ActorNode) -> Result<(), StoreError>;
    async fn sync_actor(&self, actor: &ActorNode) -> Result<(), StoreError>;
    /// Detaches every edge before removing the node.
    async fn remove_actor(&self, kind: ActorKind, id: &EntityId) -> Result<(), StoreError>;

    // Assignment edges (patient ASSIGNED_TO doctor).
    async fn clear_assignment(&self, patient: &EntityId) -> Result<(), StoreError>;
    async fn create_assignment(
        &self,
        patient: &EntityId,
        doctor: &EntityId,
    ) -> Result<(), StoreError>;
    async fn assigned_doctor(&self, patient: &EntityId) -> Result<Option<EntityId>, StoreError>;
    async fn assignment_count(&self, doctor: &EntityId) -> Result<i64, StoreError>;
    async fn patients_of(&self, doctor: &EntityId) -> Result<Vec<EntityId>, StoreError>;

    // Consultation mirror (node plus both PARTICIPATES_IN edges).
    async fn create_mirror(&self, consultation: &Consultation) -> Result<(), StoreError>;
    async fn set_mirror_status(
        &self,
        id: &EntityId,
        status: ConsultationStatus,
    ) -> Result<(), StoreError>;

    // Scheduling queries.
    /// Non-cancelled bookings for a participant, ordered by start.
    async fn booked_slots(&self, participant: &EntityId) -> Result<Vec<BookedSlot>, StoreError>;
    /// All consultation ids for a participant, ordered by start.
    async fn consultations_for(
        &self,
        participant: &EntityId,
    ) -> Result<Vec<EntityId>, StoreError>;
    /// Whether a non-cancelled booking starting at or after `after` exists.
    async fn future_booking_exists(
        &self,
        participant: &EntityId,
        after: NaiveDateTime,
    ) -> Result<bool, StoreError>;
}
