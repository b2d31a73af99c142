//! The consistency coordinator.
//!
//! Each public method is one business operation: validate first, then write
//! the entity store, then the relationship store, in that order. A failed
//! second step gets exactly one compensating action; a failed compensation
//! surfaces as `PartialFailure` carrying the orphaned id. No operation
//! retries, and no state is held between calls beyond the two store
//! handles.
//!
//! The overlap and email-uniqueness checks are check-then-act: the check
//! runs as a query and the write lands in a separate call, so two racing
//! requests for the same participant can slip through the window. That
//! race is accepted; see DESIGN.md.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use medilink_core::store::{ActorKind, ActorNode};
use medilink_core::types::{Consultation, ConsultationDraft, EntityPatch};
use medilink_core::{
    ConsultationStatus, EntityId, EntityStore, NewRecord, Record, RecordKind, RelationshipStore,
    StoreError,
};

use crate::config::ClinicConfig;
use crate::error::{CoordinatorError, Result, StoreSide};
use crate::policy;

/// Input for `create_consultation`.
#[derive(Debug, Clone)]
pub struct ConsultationRequest {
    pub patient_id: EntityId,
    pub doctor_id: EntityId,
    /// Wire format `"YYYY-MM-DD HH:MM"`, server-local.
    pub start: String,
    /// Overrides the configured default consultation length.
    pub duration_minutes: Option<i64>,
    pub description: Option<String>,
    /// `requested` (default) or `scheduled`; anything else is rejected.
    pub initial_status: Option<ConsultationStatus>,
}

/// A record merged with its graph-side relationships.
#[derive(Debug, Clone, Serialize)]
pub struct EntityView {
    #[serde(flatten)]
    pub record: Record,
    /// Doctor currently following this patient, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_doctor: Option<EntityId>,
    /// Patients assigned to this doctor.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patient_ids: Vec<EntityId>,
}

/// Orchestrates multi-store writes. Stateless between calls: every
/// operation is a function of its inputs and the two store handles.
pub struct Coordinator<E, R> {
    entities: E,
    relations: R,
    default_duration_minutes: i64,
}

impl<E: EntityStore, R: RelationshipStore> Coordinator<E, R> {
    pub fn new(entities: E, relations: R, config: &ClinicConfig) -> Self {
        Self {
            entities,
            relations,
            default_duration_minutes: config.default_duration_minutes,
        }
    }

    // ── Entity Lifecycle ─────────────────────────────────────────

    /// Create a patient, doctor, or admin.
    ///
    /// Entity store first (assigns the id), then the graph actor node for
    /// patients and doctors. A failed graph write deletes the fresh entity
    /// record so at most one commit is ever visible.
    pub async fn create_entity(&self, draft: NewRecord) -> Result<Record> {
        if draft.kind() == RecordKind::Consultation {
            return Err(CoordinatorError::InvalidInput(
                "consultations are created through create_consultation".to_string(),
            ));
        }
        draft.validate().map_err(CoordinatorError::InvalidInput)?;
        if let Some(email) = draft.email() {
            self.ensure_email_free(email, None)?;
        }

        let record = self.entities.insert(draft)?;
        if let Some(actor) = ActorNode::from_record(&record) {
            if let Err(cause) = self.relations.create_actor(&actor).await {
                return Err(self.compensate_insert(record, cause));
            }
        }

        tracing::info!(kind = %record.kind(), id = %record.id(), "Entity created");
        Ok(record)
    }

    /// Fetch a record together with its graph-side relationships.
    pub async fn get_entity(&self, kind: RecordKind, id: &EntityId) -> Result<EntityView> {
        let record = self.fetch(kind, id)?;
        let mut view = EntityView {
            record,
            assigned_doctor: None,
            patient_ids: Vec::new(),
        };
        match kind {
            RecordKind::Patient => {
                view.assigned_doctor = self.relations.assigned_doctor(id).await?;
            }
            RecordKind::Doctor => {
                view.patient_ids = self.relations.patients_of(id).await?;
            }
            _ => {}
        }
        Ok(view)
    }

    pub fn list_entities(&self, kind: RecordKind) -> Result<Vec<Record>> {
        Ok(self.entities.list(kind)?)
    }

    /// Partial update. The prior record is kept for the revert path: if
    /// the graph sync fails the entity write is rolled back.
    pub async fn update_entity(
        &self,
        kind: RecordKind,
        id: &EntityId,
        patch: EntityPatch,
    ) -> Result<Record> {
        if patch.is_empty() {
            return Err(CoordinatorError::InvalidInput(
                "empty update: no fields to apply".to_string(),
            ));
        }

        let current = self.fetch(kind, id)?;
        if let Some(email) = patch.email.as_deref() {
            if Some(email) != current.email() {
                self.ensure_email_free(email, Some(id))?;
            }
        }

        let mut updated = current.clone();
        patch
            .apply_to(&mut updated)
            .map_err(CoordinatorError::InvalidInput)?;

        self.entities.put(&updated)?;
        if let Some(actor) = ActorNode::from_record(&updated) {
            if let Err(cause) = self.relations.sync_actor(&actor).await {
                return Err(self.revert_entity(&current, cause, "graph property sync failed"));
            }
        }

        tracing::info!(kind = %kind, id = %id, "Entity updated");
        Ok(updated)
    }

    /// Delete a record after its dependency checks pass.
    ///
    /// Doctors are blocked while any patient is assigned or a future
    /// non-cancelled consultation exists; patients are blocked by future
    /// non-cancelled consultations only. Entity record first, graph node
    /// second; a failed graph delete restores the record.
    pub async fn delete_entity(&self, kind: RecordKind, id: &EntityId) -> Result<()> {
        if kind == RecordKind::Consultation {
            return Err(CoordinatorError::InvalidInput(
                "consultations are cancelled, not deleted".to_string(),
            ));
        }

        let record = self.fetch(kind, id)?;
        match kind {
            RecordKind::Doctor => {
                if self.relations.assignment_count(id).await? > 0 {
                    return Err(CoordinatorError::Conflict(
                        "doctor still has assigned patients".to_string(),
                    ));
                }
                if self.relations.future_booking_exists(id, now_local()).await? {
                    return Err(CoordinatorError::Conflict(
                        "doctor still has upcoming consultations".to_string(),
                    ));
                }
            }
            RecordKind::Patient => {
                if self.relations.future_booking_exists(id, now_local()).await? {
                    return Err(CoordinatorError::Conflict(
                        "patient still has upcoming consultations".to_string(),
                    ));
                }
            }
            _ => {}
        }

        self.entities.delete(kind, id)?;
        if let Some(actor_kind) = graph_kind(kind) {
            if let Err(cause) = self.relations.remove_actor(actor_kind, id).await {
                return Err(self.revert_entity(&record, cause, "graph node delete failed"));
            }
        }

        tracing::info!(kind = %kind, id = %id, "Entity deleted");
        Ok(())
    }

    // ── Assignment ───────────────────────────────────────────────

    /// Point a patient at a doctor. Last writer wins: any existing
    /// assignment edge is removed before the new one is created. Only the
    /// graph is written; reassigning the same doctor is a harmless no-op.
    pub async fn assign_doctor(&self, patient_id: &EntityId, doctor_id: &EntityId) -> Result<()> {
        self.fetch(RecordKind::Patient, patient_id)?;
        self.fetch(RecordKind::Doctor, doctor_id)?;

        self.relations.clear_assignment(patient_id).await?;
        self.relations
            .create_assignment(patient_id, doctor_id)
            .await?;

        tracing::info!(patient = %patient_id, doctor = %doctor_id, "Doctor assigned");
        Ok(())
    }

    // ── Consultations ────────────────────────────────────────────

    /// Schedule a consultation.
    ///
    /// Order: resolve participants, parse and bound the window, check both
    /// participants for overlap, write the entity record, mirror it into
    /// the graph. A failed mirror write deletes the entity record; if that
    /// compensation also fails the orphaned id is surfaced for manual
    /// reconciliation.
    pub async fn create_consultation(&self, request: ConsultationRequest) -> Result<Consultation> {
        self.fetch(RecordKind::Patient, &request.patient_id)?;
        self.fetch(RecordKind::Doctor, &request.doctor_id)?;

        let start = policy::parse_start(&request.start).ok_or_else(|| {
            CoordinatorError::InvalidInput(format!(
                "invalid start time {:?}, expected format {}",
                request.start,
                policy::START_FORMAT
            ))
        })?;
        if start < now_local() {
            return Err(CoordinatorError::InvalidInput(
                "consultation start is in the past".to_string(),
            ));
        }

        let duration = request
            .duration_minutes
            .unwrap_or(self.default_duration_minutes);
        if duration <= 0 {
            return Err(CoordinatorError::InvalidInput(
                "consultation duration must be positive".to_string(),
            ));
        }
        let window = policy::effective_window(start, duration);

        let status = match request.initial_status {
            None => ConsultationStatus::Requested,
            Some(s @ (ConsultationStatus::Requested | ConsultationStatus::Scheduled)) => s,
            Some(other) => {
                return Err(CoordinatorError::InvalidInput(format!(
                    "consultations start as requested or scheduled, not {other}"
                )));
            }
        };

        // Overlap is evaluated independently per participant; either
        // conflicting rejects.
        for (kind, id) in [
            (RecordKind::Patient, &request.patient_id),
            (RecordKind::Doctor, &request.doctor_id),
        ] {
            let booked = self.relations.booked_slots(id).await?;
            if let Some(hit) = policy::find_conflict(&booked, &window) {
                tracing::debug!(
                    participant = %id,
                    conflicting = %hit.consultation_id,
                    "Scheduling conflict"
                );
                return Err(CoordinatorError::SchedulingConflict {
                    kind,
                    id: id.clone(),
                });
            }
        }

        let record = self.entities.insert(NewRecord::Consultation(ConsultationDraft {
            patient_id: request.patient_id,
            doctor_id: request.doctor_id,
            start: window.start,
            end: window.end,
            status,
            description: request.description,
        }))?;
        let Record::Consultation(consultation) = record else {
            return Err(CoordinatorError::Store(StoreError::Backend(
                "entity store returned a non-consultation record".to_string(),
            )));
        };

        if let Err(cause) = self.relations.create_mirror(&consultation).await {
            return Err(self.compensate_insert(Record::Consultation(consultation), cause));
        }

        tracing::info!(
            id = %consultation.id,
            patient = %consultation.patient_id,
            doctor = %consultation.doctor_id,
            start = %consultation.start,
            "Consultation scheduled"
        );
        Ok(consultation)
    }

    /// Apply a status transition to both stores.
    ///
    /// The entity record is the truth and is written first; the mirror
    /// follows. If the mirror write fails the entity status is reverted so
    /// the stores never disagree after a returned call.
    pub async fn transition_consultation(
        &self,
        id: &EntityId,
        new_status: ConsultationStatus,
    ) -> Result<Consultation> {
        let record = self.fetch(RecordKind::Consultation, id)?;
        let Record::Consultation(mut consultation) = record else {
            return Err(CoordinatorError::Store(StoreError::Backend(
                "entity store returned a non-consultation record".to_string(),
            )));
        };

        let from = consultation.status;
        if !from.can_transition_to(new_status) {
            return Err(CoordinatorError::InvalidTransition {
                from,
                to: new_status,
            });
        }

        consultation.status = new_status;
        self.entities
            .put(&Record::Consultation(consultation.clone()))?;

        if let Err(cause) = self.relations.set_mirror_status(id, new_status).await {
            let mut reverted = consultation.clone();
            reverted.status = from;
            return Err(self.revert_entity(
                &Record::Consultation(reverted),
                cause,
                "mirror status update failed",
            ));
        }

        tracing::info!(id = %id, from = %from, to = %new_status, "Consultation transitioned");
        Ok(consultation)
    }

    /// Consultations for one participant, ordered by start time.
    ///
    /// The graph supplies the ordered ids, the entity store the canonical
    /// records. A mirror without a backing record is logged and skipped.
    pub async fn list_consultations_for(
        &self,
        kind: RecordKind,
        participant: &EntityId,
    ) -> Result<Vec<Consultation>> {
        if graph_kind(kind).is_none() {
            return Err(CoordinatorError::InvalidInput(format!(
                "consultations are listed for patients or doctors, not {kind}"
            )));
        }
        self.fetch(kind, participant)?;

        let ids = self.relations.consultations_for(participant).await?;
        let mut consultations = Vec::with_capacity(ids.len());
        for id in ids {
            match self.entities.get(RecordKind::Consultation, &id)? {
                Some(Record::Consultation(c)) => consultations.push(c),
                _ => {
                    tracing::warn!(id = %id, "Graph mirror without entity record, skipping");
                }
            }
        }
        Ok(consultations)
    }

    // ── Internal ─────────────────────────────────────────────────

    fn fetch(&self, kind: RecordKind, id: &EntityId) -> Result<Record> {
        self.entities
            .get(kind, id)?
            .ok_or_else(|| CoordinatorError::NotFound {
                kind,
                id: id.clone(),
            })
    }

    /// Email uniqueness across all actor kinds. Check-then-act by design.
    fn ensure_email_free(&self, email: &str, exclude: Option<&EntityId>) -> Result<()> {
        for kind in RecordKind::ACTOR_KINDS {
            if let Some(existing) = self.entities.find_by_field(kind, "email", email)? {
                if Some(existing.id()) != exclude {
                    return Err(CoordinatorError::Conflict(format!(
                        "email {email} is already used by another user"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Undo a fresh entity insert after the paired graph write failed.
    fn compensate_insert(&self, record: Record, cause: StoreError) -> CoordinatorError {
        let kind = record.kind();
        let id = record.id().clone();
        match self.entities.delete(kind, &id) {
            Ok(()) => {
                tracing::warn!(kind = %kind, id = %id, error = %cause, "Graph write failed, entity record compensated");
                CoordinatorError::Store(cause)
            }
            Err(comp) => {
                tracing::error!(kind = %kind, id = %id, error = %comp, "Compensation failed, orphaned entity record");
                CoordinatorError::PartialFailure {
                    kind,
                    id,
                    store: StoreSide::Entity,
                    detail: format!("graph write failed ({cause}); compensating delete failed ({comp})"),
                }
            }
        }
    }

    /// Restore a prior entity record after a graph write failed mid-way.
    fn revert_entity(
        &self,
        prior: &Record,
        cause: StoreError,
        context: &str,
    ) -> CoordinatorError {
        let kind = prior.kind();
        let id = prior.id().clone();
        match self.entities.put(prior) {
            Ok(()) => {
                tracing::warn!(kind = %kind, id = %id, error = %cause, "{context}, entity record reverted");
                CoordinatorError::Store(cause)
            }
            Err(comp) => {
                tracing::error!(kind = %kind, id = %id, error = %comp, "Revert failed, stores diverged");
                CoordinatorError::PartialFailure {
                    kind,
                    id,
                    store: StoreSide::Relationship,
                    detail: format!("{context} ({cause}); entity revert failed ({comp})"),
                }
            }
        }
    }
}

fn graph_kind(kind: RecordKind) -> Option<ActorKind> {
    match kind {
        RecordKind::Patient => Some(ActorKind::Patient),
        RecordKind::Doctor => Some(ActorKind::Doctor),
        RecordKind::Admin | RecordKind::Consultation => None,
    }
}

fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}
