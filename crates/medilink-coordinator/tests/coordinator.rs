//! Coordinator behavior tests against in-memory store fakes.
//!
//! The fakes model the two stores faithfully enough to exercise the
//! cross-store contracts: ordered writes, compensation on partial failure,
//! and the scheduling/transition invariants. Failure injection flips an
//! atomic on the fake; nothing here talks to a real backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;

use medilink_core::schedule::{BookedSlot, TimeSlot};
use medilink_core::store::{ActorKind, ActorNode};
use medilink_core::types::{Consultation, NewDoctor, NewPatient, Specialty};
use medilink_core::{
    ConsultationStatus, EntityId, EntityStore, NewRecord, Record, RecordKind, RelationshipStore,
    StoreError,
};

use medilink_coordinator::{
    ClinicConfig, ConsultationRequest, Coordinator, CoordinatorError, StoreSide,
};

// ── Entity store fake ─────────────────────────────────────────────

#[derive(Clone, Default)]
struct MemoryEntities {
    inner: Arc<EntityInner>,
}

struct EntityInner {
    records: Mutex<HashMap<(RecordKind, String), Record>>,
    // -1 disables injection, 0 fails the next call, n > 0 allows n calls.
    deletes_until_fail: AtomicI64,
    puts_until_fail: AtomicI64,
}

impl Default for EntityInner {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            deletes_until_fail: AtomicI64::new(-1),
            puts_until_fail: AtomicI64::new(-1),
        }
    }
}

fn should_fail(counter: &AtomicI64) -> bool {
    match counter.load(Ordering::SeqCst) {
        -1 => false,
        0 => true,
        _ => {
            counter.fetch_sub(1, Ordering::SeqCst);
            false
        }
    }
}

impl MemoryEntities {
    fn count(&self, kind: RecordKind) -> usize {
        self.inner
            .records
            .lock()
            .unwrap()
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    fn stored(&self, kind: RecordKind, id: &EntityId) -> Option<Record> {
        self.inner
            .records
            .lock()
            .unwrap()
            .get(&(kind, id.as_str().to_string()))
            .cloned()
    }

    fn remove_silently(&self, kind: RecordKind, id: &EntityId) {
        self.inner
            .records
            .lock()
            .unwrap()
            .remove(&(kind, id.as_str().to_string()));
    }
}

impl EntityStore for MemoryEntities {
    fn insert(&self, draft: NewRecord) -> Result<Record, StoreError> {
        let record = draft.into_record(EntityId::generate());
        self.inner
            .records
            .lock()
            .unwrap()
            .insert((record.kind(), record.id().as_str().to_string()), record.clone());
        Ok(record)
    }

    fn get(&self, kind: RecordKind, id: &EntityId) -> Result<Option<Record>, StoreError> {
        Ok(self.stored(kind, id))
    }

    fn find_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &str,
    ) -> Result<Option<Record>, StoreError> {
        let records = self.inner.records.lock().unwrap();
        for ((k, _), record) in records.iter() {
            if *k != kind {
                continue;
            }
            let doc = serde_json::to_value(record)?;
            if doc.get(field).and_then(|v| v.as_str()) == Some(value) {
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    fn put(&self, record: &Record) -> Result<(), StoreError> {
        if should_fail(&self.inner.puts_until_fail) {
            return Err(StoreError::Backend("injected put failure".to_string()));
        }
        self.inner
            .records
            .lock()
            .unwrap()
            .insert((record.kind(), record.id().as_str().to_string()), record.clone());
        Ok(())
    }

    fn delete(&self, kind: RecordKind, id: &EntityId) -> Result<(), StoreError> {
        if should_fail(&self.inner.deletes_until_fail) {
            return Err(StoreError::Backend("injected delete failure".to_string()));
        }
        let removed = self
            .inner
            .records
            .lock()
            .unwrap()
            .remove(&(kind, id.as_str().to_string()));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                kind,
                id: id.clone(),
            }),
        }
    }

    fn list(&self, kind: RecordKind) -> Result<Vec<Record>, StoreError> {
        let mut records: Vec<Record> = self
            .inner
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, r)| r.clone())
            .collect();
        records.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(records)
    }
}

// ── Relationship store fake ───────────────────────────────────────

#[derive(Debug, Clone)]
struct MirrorNode {
    patient: String,
    doctor: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    status: ConsultationStatus,
}

#[derive(Default)]
struct GraphState {
    actors: HashSet<(ActorKind, String)>,
    // patient id -> doctor id; at most one edge per patient.
    assignments: HashMap<String, String>,
    mirrors: HashMap<String, MirrorNode>,
}

#[derive(Clone, Default)]
struct MemoryRelations {
    inner: Arc<RelationInner>,
}

#[derive(Default)]
struct RelationInner {
    state: Mutex<GraphState>,
    fail_create_actor: AtomicBool,
    fail_sync_actor: AtomicBool,
    fail_create_mirror: AtomicBool,
    fail_set_status: AtomicBool,
}

impl MemoryRelations {
    fn has_actor(&self, kind: ActorKind, id: &EntityId) -> bool {
        self.inner
            .state
            .lock()
            .unwrap()
            .actors
            .contains(&(kind, id.as_str().to_string()))
    }

    fn mirror_status(&self, id: &EntityId) -> Option<ConsultationStatus> {
        self.inner
            .state
            .lock()
            .unwrap()
            .mirrors
            .get(id.as_str())
            .map(|m| m.status)
    }

    fn actor_count(&self) -> usize {
        self.inner.state.lock().unwrap().actors.len()
    }
}

fn injected(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
    if flag.load(Ordering::SeqCst) {
        Err(StoreError::Backend(format!("injected {what} failure")))
    } else {
        Ok(())
    }
}

#[async_trait]
impl RelationshipStore for MemoryRelations {
    async fn create_actor(&self, actor: &ActorNode) -> Result<(), StoreError> {
        injected(&self.inner.fail_create_actor, "create_actor")?;
        self.inner
            .state
            .lock()
            .unwrap()
            .actors
            .insert((actor.kind, actor.id.as_str().to_string()));
        Ok(())
    }

    async fn sync_actor(&self, actor: &ActorNode) -> Result<(), StoreError> {
        injected(&self.inner.fail_sync_actor, "sync_actor")?;
        if !self.has_actor(actor.kind, &actor.id) {
            return Err(StoreError::Backend(format!(
                "actor node missing: {}",
                actor.id
            )));
        }
        Ok(())
    }

    async fn remove_actor(&self, kind: ActorKind, id: &EntityId) -> Result<(), StoreError> {
        let mut state = self.inner.state.lock().unwrap();
        state.actors.remove(&(kind, id.as_str().to_string()));
        // DETACH semantics: drop assignment edges touching the node.
        state
            .assignments
            .retain(|patient, doctor| patient != id.as_str() && doctor != id.as_str());
        Ok(())
    }

    async fn clear_assignment(&self, patient: &EntityId) -> Result<(), StoreError> {
        self.inner
            .state
            .lock()
            .unwrap()
            .assignments
            .remove(patient.as_str());
        Ok(())
    }

    async fn create_assignment(
        &self,
        patient: &EntityId,
        doctor: &EntityId,
    ) -> Result<(), StoreError> {
        if !self.has_actor(ActorKind::Patient, patient) || !self.has_actor(ActorKind::Doctor, doctor)
        {
            return Err(StoreError::Backend(
                "assignment endpoints missing in graph".to_string(),
            ));
        }
        self.inner
            .state
            .lock()
            .unwrap()
            .assignments
            .insert(patient.as_str().to_string(), doctor.as_str().to_string());
        Ok(())
    }

    async fn assigned_doctor(&self, patient: &EntityId) -> Result<Option<EntityId>, StoreError> {
        Ok(self
            .inner
            .state
            .lock()
            .unwrap()
            .assignments
            .get(patient.as_str())
            .map(|d| EntityId::from(d.as_str())))
    }

    async fn assignment_count(&self, doctor: &EntityId) -> Result<i64, StoreError> {
        Ok(self
            .inner
            .state
            .lock()
            .unwrap()
            .assignments
            .values()
            .filter(|d| *d == doctor.as_str())
            .count() as i64)
    }

    async fn patients_of(&self, doctor: &EntityId) -> Result<Vec<EntityId>, StoreError> {
        let mut ids: Vec<EntityId> = self
            .inner
            .state
            .lock()
            .unwrap()
            .assignments
            .iter()
            .filter(|(_, d)| *d == doctor.as_str())
            .map(|(p, _)| EntityId::from(p.as_str()))
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(ids)
    }

    async fn create_mirror(&self, consultation: &Consultation) -> Result<(), StoreError> {
        injected(&self.inner.fail_create_mirror, "create_mirror")?;
        if !self.has_actor(ActorKind::Patient, &consultation.patient_id)
            || !self.has_actor(ActorKind::Doctor, &consultation.doctor_id)
        {
            return Err(StoreError::Backend(
                "participant nodes missing in graph".to_string(),
            ));
        }
        self.inner.state.lock().unwrap().mirrors.insert(
            consultation.id.as_str().to_string(),
            MirrorNode {
                patient: consultation.patient_id.as_str().to_string(),
                doctor: consultation.doctor_id.as_str().to_string(),
                start: consultation.start,
                end: consultation.end,
                status: consultation.status,
            },
        );
        Ok(())
    }

    async fn set_mirror_status(
        &self,
        id: &EntityId,
        status: ConsultationStatus,
    ) -> Result<(), StoreError> {
        injected(&self.inner.fail_set_status, "set_mirror_status")?;
        let mut state = self.inner.state.lock().unwrap();
        match state.mirrors.get_mut(id.as_str()) {
            Some(mirror) => {
                mirror.status = status;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: RecordKind::Consultation,
                id: id.clone(),
            }),
        }
    }

    async fn booked_slots(&self, participant: &EntityId) -> Result<Vec<BookedSlot>, StoreError> {
        let state = self.inner.state.lock().unwrap();
        let mut slots: Vec<BookedSlot> = state
            .mirrors
            .iter()
            .filter(|(_, m)| {
                (m.patient == participant.as_str() || m.doctor == participant.as_str())
                    && m.status != ConsultationStatus::Cancelled
            })
            .map(|(id, m)| BookedSlot {
                consultation_id: EntityId::from(id.as_str()),
                slot: TimeSlot::new(m.start, m.end),
            })
            .collect();
        slots.sort_by_key(|s| s.slot.start);
        Ok(slots)
    }

    async fn consultations_for(
        &self,
        participant: &EntityId,
    ) -> Result<Vec<EntityId>, StoreError> {
        let state = self.inner.state.lock().unwrap();
        let mut entries: Vec<(&String, &MirrorNode)> = state
            .mirrors
            .iter()
            .filter(|(_, m)| {
                m.patient == participant.as_str() || m.doctor == participant.as_str()
            })
            .collect();
        entries.sort_by_key(|(_, m)| m.start);
        Ok(entries
            .into_iter()
            .map(|(id, _)| EntityId::from(id.as_str()))
            .collect())
    }

    async fn future_booking_exists(
        &self,
        participant: &EntityId,
        after: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let state = self.inner.state.lock().unwrap();
        Ok(state.mirrors.values().any(|m| {
            (m.patient == participant.as_str() || m.doctor == participant.as_str())
                && m.status != ConsultationStatus::Cancelled
                && m.start >= after
        }))
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn setup() -> (
    Coordinator<MemoryEntities, MemoryRelations>,
    MemoryEntities,
    MemoryRelations,
) {
    let entities = MemoryEntities::default();
    let relations = MemoryRelations::default();
    let coordinator = Coordinator::new(
        entities.clone(),
        relations.clone(),
        &ClinicConfig::default(),
    );
    (coordinator, entities, relations)
}

fn patient_draft(email: &str) -> NewRecord {
    NewRecord::Patient(NewPatient {
        first_name: "Ada".to_string(),
        last_name: "Martin".to_string(),
        email: email.to_string(),
        password_hash: "pbkdf2$stub".to_string(),
        birth_date: chrono::NaiveDate::from_ymd_opt(1990, 4, 2).unwrap(),
        condition: None,
        condition_notes: None,
        phone: None,
    })
}

fn doctor_draft(email: &str) -> NewRecord {
    NewRecord::Doctor(NewDoctor {
        first_name: "Lea".to_string(),
        last_name: "Durand".to_string(),
        email: email.to_string(),
        password_hash: "pbkdf2$stub".to_string(),
        specialty: Specialty::Cardiology,
    })
}

async fn create_patient(
    coordinator: &Coordinator<MemoryEntities, MemoryRelations>,
    email: &str,
) -> EntityId {
    coordinator
        .create_entity(patient_draft(email))
        .await
        .unwrap()
        .id()
        .clone()
}

async fn create_doctor(
    coordinator: &Coordinator<MemoryEntities, MemoryRelations>,
    email: &str,
) -> EntityId {
    coordinator
        .create_entity(doctor_draft(email))
        .await
        .unwrap()
        .id()
        .clone()
}

fn request(patient: &EntityId, doctor: &EntityId, start: &str) -> ConsultationRequest {
    ConsultationRequest {
        patient_id: patient.clone(),
        doctor_id: doctor.clone(),
        start: start.to_string(),
        duration_minutes: None,
        description: Some("checkup".to_string()),
        initial_status: None,
    }
}

fn ts(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M").unwrap()
}

// ── Entity lifecycle ─────────────────────────────────────────────

#[tokio::test]
async fn create_entity_writes_both_stores() {
    let (coordinator, entities, relations) = setup();

    let id = create_patient(&coordinator, "ada@example.com").await;

    assert!(entities.stored(RecordKind::Patient, &id).is_some());
    assert!(relations.has_actor(ActorKind::Patient, &id));
}

#[tokio::test]
async fn email_unique_across_all_kinds() {
    let (coordinator, entities, _) = setup();

    create_patient(&coordinator, "shared@example.com").await;

    let err = coordinator
        .create_entity(doctor_draft("shared@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));

    // The rejected doctor never reached either store.
    assert_eq!(entities.count(RecordKind::Doctor), 0);
}

#[tokio::test]
async fn invalid_draft_touches_no_store() {
    let (coordinator, entities, relations) = setup();

    let mut draft = patient_draft("blank@example.com");
    if let NewRecord::Patient(p) = &mut draft {
        p.first_name = String::new();
    }

    let err = coordinator.create_entity(draft).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidInput(_)));
    assert_eq!(entities.count(RecordKind::Patient), 0);
    assert_eq!(relations.actor_count(), 0);
}

#[tokio::test]
async fn create_entity_compensates_failed_graph_write() {
    let (coordinator, entities, relations) = setup();
    relations
        .inner
        .fail_create_actor
        .store(true, Ordering::SeqCst);

    let err = coordinator
        .create_entity(doctor_draft("doc@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoordinatorError::Store(_)));
    // At-most-once visible commit: the entity record was compensated away.
    assert_eq!(entities.count(RecordKind::Doctor), 0);
}

#[tokio::test]
async fn update_entity_rejects_taken_email_and_keeps_record() {
    let (coordinator, entities, _) = setup();

    let patient = create_patient(&coordinator, "p@example.com").await;
    create_doctor(&coordinator, "d@example.com").await;

    let patch = medilink_core::types::EntityPatch {
        email: Some("d@example.com".to_string()),
        ..Default::default()
    };
    let err = coordinator
        .update_entity(RecordKind::Patient, &patient, patch)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));

    let stored = entities.stored(RecordKind::Patient, &patient).unwrap();
    assert_eq!(stored.email(), Some("p@example.com"));
}

#[tokio::test]
async fn update_entity_reverts_when_graph_sync_fails() {
    let (coordinator, entities, relations) = setup();

    let patient = create_patient(&coordinator, "before@example.com").await;
    relations.inner.fail_sync_actor.store(true, Ordering::SeqCst);

    let patch = medilink_core::types::EntityPatch {
        email: Some("after@example.com".to_string()),
        ..Default::default()
    };
    let err = coordinator
        .update_entity(RecordKind::Patient, &patient, patch)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Store(_)));

    // The entity write was rolled back; both stores still agree.
    let stored = entities.stored(RecordKind::Patient, &patient).unwrap();
    assert_eq!(stored.email(), Some("before@example.com"));
}

// ── Assignment ───────────────────────────────────────────────────

#[tokio::test]
async fn reassignment_is_last_writer_wins() {
    let (coordinator, _, relations) = setup();

    let patient = create_patient(&coordinator, "p@example.com").await;
    let d1 = create_doctor(&coordinator, "d1@example.com").await;
    let d2 = create_doctor(&coordinator, "d2@example.com").await;

    coordinator.assign_doctor(&patient, &d1).await.unwrap();
    coordinator.assign_doctor(&patient, &d2).await.unwrap();

    assert_eq!(
        relations.assigned_doctor(&patient).await.unwrap(),
        Some(d2.clone())
    );
    assert_eq!(relations.assignment_count(&d1).await.unwrap(), 0);
    assert_eq!(relations.assignment_count(&d2).await.unwrap(), 1);

    // Re-assigning the same doctor is a harmless no-op state.
    coordinator.assign_doctor(&patient, &d2).await.unwrap();
    assert_eq!(relations.assignment_count(&d2).await.unwrap(), 1);
}

#[tokio::test]
async fn assign_requires_both_participants() {
    let (coordinator, _, _) = setup();
    let patient = create_patient(&coordinator, "p@example.com").await;

    let err = coordinator
        .assign_doctor(&patient, &EntityId::from("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::NotFound {
            kind: RecordKind::Doctor,
            ..
        }
    ));
}

// ── Scheduling ───────────────────────────────────────────────────

#[tokio::test]
async fn scheduling_scenario_with_boundary_touch() {
    let (coordinator, _, _) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let c = create_patient(&coordinator, "c@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;

    // First booking: defaults to requested, end = start + 1h.
    let first = coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:00"))
        .await
        .unwrap();
    assert_eq!(first.status, ConsultationStatus::Requested);
    assert_eq!(first.end, ts("2030-01-01 11:00"));

    // Overlapping request for the same doctor is rejected, naming the doctor.
    let err = coordinator
        .create_consultation(request(&c, &b, "2030-01-01 10:30"))
        .await
        .unwrap_err();
    match err {
        CoordinatorError::SchedulingConflict { kind, id } => {
            assert_eq!(kind, RecordKind::Doctor);
            assert_eq!(id, b);
        }
        other => panic!("expected SchedulingConflict, got {other:?}"),
    }

    // Back-to-back at the boundary does not conflict.
    coordinator
        .create_consultation(request(&c, &b, "2030-01-01 11:00"))
        .await
        .unwrap();
}

#[tokio::test]
async fn patient_side_overlap_is_detected_independently() {
    let (coordinator, _, _) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;
    let d = create_doctor(&coordinator, "d@example.com").await;

    coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:00"))
        .await
        .unwrap();

    // Doctor d is free, but patient a is not.
    let err = coordinator
        .create_consultation(request(&a, &d, "2030-01-01 10:30"))
        .await
        .unwrap_err();
    match err {
        CoordinatorError::SchedulingConflict { kind, id } => {
            assert_eq!(kind, RecordKind::Patient);
            assert_eq!(id, a);
        }
        other => panic!("expected SchedulingConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_booking_frees_the_slot() {
    let (coordinator, _, _) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;

    let first = coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:00"))
        .await
        .unwrap();
    coordinator
        .transition_consultation(&first.id, ConsultationStatus::Cancelled)
        .await
        .unwrap();

    coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:00"))
        .await
        .unwrap();
}

#[tokio::test]
async fn bad_start_times_are_rejected_without_side_effects() {
    let (coordinator, entities, _) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;

    for start in ["2001-01-01 10:00", "2030-01-01T10:00", "soon"] {
        let err = coordinator
            .create_consultation(request(&a, &b, start))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidInput(_)), "{start}");
    }
    assert_eq!(entities.count(RecordKind::Consultation), 0);
}

#[tokio::test]
async fn initial_status_is_restricted() {
    let (coordinator, _, _) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;

    let mut req = request(&a, &b, "2030-01-01 10:00");
    req.initial_status = Some(ConsultationStatus::Scheduled);
    let scheduled = coordinator.create_consultation(req).await.unwrap();
    assert_eq!(scheduled.status, ConsultationStatus::Scheduled);

    let mut req = request(&a, &b, "2030-02-01 10:00");
    req.initial_status = Some(ConsultationStatus::Accepted);
    let err = coordinator.create_consultation(req).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidInput(_)));
}

#[tokio::test]
async fn unknown_participants_are_not_found() {
    let (coordinator, _, _) = setup();
    let b = create_doctor(&coordinator, "b@example.com").await;

    let err = coordinator
        .create_consultation(request(&EntityId::from("ghost"), &b, "2030-01-01 10:00"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::NotFound {
            kind: RecordKind::Patient,
            ..
        }
    ));
}

#[tokio::test]
async fn duration_override_shapes_the_window() {
    let (coordinator, _, _) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;

    let mut req = request(&a, &b, "2030-01-01 10:00");
    req.duration_minutes = Some(30);
    let short = coordinator.create_consultation(req).await.unwrap();
    assert_eq!(short.end, ts("2030-01-01 10:30"));

    // The shorter window frees 10:30 for the same doctor.
    coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:30"))
        .await
        .unwrap();
}

// ── Consultation transitions ─────────────────────────────────────

#[tokio::test]
async fn completed_is_terminal_in_both_stores() {
    let (coordinator, entities, relations) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;
    let consultation = coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:00"))
        .await
        .unwrap();

    coordinator
        .transition_consultation(&consultation.id, ConsultationStatus::Accepted)
        .await
        .unwrap();
    coordinator
        .transition_consultation(&consultation.id, ConsultationStatus::Completed)
        .await
        .unwrap();

    let err = coordinator
        .transition_consultation(&consultation.id, ConsultationStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidTransition { .. }));

    // Both stores still agree on completed.
    let Record::Consultation(stored) = entities
        .stored(RecordKind::Consultation, &consultation.id)
        .unwrap()
    else {
        panic!("expected consultation record");
    };
    assert_eq!(stored.status, ConsultationStatus::Completed);
    assert_eq!(
        relations.mirror_status(&consultation.id),
        Some(ConsultationStatus::Completed)
    );
}

#[tokio::test]
async fn rejected_is_only_reachable_from_requested() {
    let (coordinator, _, _) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;
    let consultation = coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:00"))
        .await
        .unwrap();

    coordinator
        .transition_consultation(&consultation.id, ConsultationStatus::Accepted)
        .await
        .unwrap();
    let err = coordinator
        .transition_consultation(&consultation.id, ConsultationStatus::Rejected)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidTransition { .. }));
}

#[tokio::test]
async fn transition_of_unknown_consultation_is_not_found() {
    let (coordinator, _, _) = setup();
    let err = coordinator
        .transition_consultation(&EntityId::from("ghost"), ConsultationStatus::Accepted)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoordinatorError::NotFound {
            kind: RecordKind::Consultation,
            ..
        }
    ));
}

// ── Partial failure handling ─────────────────────────────────────

#[tokio::test]
async fn failed_mirror_write_compensates_entity_record() {
    let (coordinator, entities, relations) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;
    relations
        .inner
        .fail_create_mirror
        .store(true, Ordering::SeqCst);

    let err = coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:00"))
        .await
        .unwrap_err();

    assert!(matches!(err, CoordinatorError::Store(_)));
    // Neither store kept the consultation.
    assert_eq!(entities.count(RecordKind::Consultation), 0);
}

#[tokio::test]
async fn failed_compensation_surfaces_partial_failure_with_orphan_id() {
    let (coordinator, entities, relations) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;
    relations
        .inner
        .fail_create_mirror
        .store(true, Ordering::SeqCst);
    entities.inner.deletes_until_fail.store(0, Ordering::SeqCst);

    let err = coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:00"))
        .await
        .unwrap_err();

    match err {
        CoordinatorError::PartialFailure {
            kind,
            id,
            store,
            detail,
        } => {
            assert_eq!(kind, RecordKind::Consultation);
            assert_eq!(store, StoreSide::Entity);
            assert!(detail.contains("injected"));
            // The orphan is still there for manual reconciliation.
            assert!(entities.stored(RecordKind::Consultation, &id).is_some());
        }
        other => panic!("expected PartialFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_mirror_status_reverts_entity_status() {
    let (coordinator, entities, relations) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;
    let consultation = coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:00"))
        .await
        .unwrap();

    relations.inner.fail_set_status.store(true, Ordering::SeqCst);
    let err = coordinator
        .transition_consultation(&consultation.id, ConsultationStatus::Accepted)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Store(_)));

    // The entity status went back to requested; the stores agree.
    let Record::Consultation(stored) = entities
        .stored(RecordKind::Consultation, &consultation.id)
        .unwrap()
    else {
        panic!("expected consultation record");
    };
    assert_eq!(stored.status, ConsultationStatus::Requested);
    assert_eq!(
        relations.mirror_status(&consultation.id),
        Some(ConsultationStatus::Requested)
    );
}

#[tokio::test]
async fn failed_revert_surfaces_partial_failure() {
    let (coordinator, entities, relations) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;
    let consultation = coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:00"))
        .await
        .unwrap();

    relations.inner.fail_set_status.store(true, Ordering::SeqCst);
    // First put (the status write) succeeds, the revert fails.
    entities.inner.puts_until_fail.store(1, Ordering::SeqCst);

    let err = coordinator
        .transition_consultation(&consultation.id, ConsultationStatus::Accepted)
        .await
        .unwrap_err();

    match err {
        CoordinatorError::PartialFailure {
            kind, id, store, ..
        } => {
            assert_eq!(kind, RecordKind::Consultation);
            assert_eq!(id, consultation.id);
            assert_eq!(store, StoreSide::Relationship);
        }
        other => panic!("expected PartialFailure, got {other:?}"),
    }
}

// ── Deletion rules ───────────────────────────────────────────────

#[tokio::test]
async fn doctor_deletion_blocked_by_assignment() {
    let (coordinator, entities, relations) = setup();

    let patient = create_patient(&coordinator, "p@example.com").await;
    let doctor = create_doctor(&coordinator, "d@example.com").await;
    coordinator.assign_doctor(&patient, &doctor).await.unwrap();

    let err = coordinator
        .delete_entity(RecordKind::Doctor, &doctor)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));

    // Both stores untouched.
    assert!(entities.stored(RecordKind::Doctor, &doctor).is_some());
    assert!(relations.has_actor(ActorKind::Doctor, &doctor));
}

#[tokio::test]
async fn doctor_deletion_blocked_by_future_booking() {
    let (coordinator, _, _) = setup();

    let patient = create_patient(&coordinator, "p@example.com").await;
    let doctor = create_doctor(&coordinator, "d@example.com").await;
    coordinator
        .create_consultation(request(&patient, &doctor, "2030-01-01 10:00"))
        .await
        .unwrap();

    let err = coordinator
        .delete_entity(RecordKind::Doctor, &doctor)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));
}

#[tokio::test]
async fn free_doctor_deletion_removes_both_stores() {
    let (coordinator, entities, relations) = setup();

    let patient = create_patient(&coordinator, "p@example.com").await;
    let doctor = create_doctor(&coordinator, "d@example.com").await;
    let consultation = coordinator
        .create_consultation(request(&patient, &doctor, "2030-01-01 10:00"))
        .await
        .unwrap();

    // A cancelled consultation no longer blocks deletion.
    coordinator
        .transition_consultation(&consultation.id, ConsultationStatus::Cancelled)
        .await
        .unwrap();
    coordinator
        .delete_entity(RecordKind::Doctor, &doctor)
        .await
        .unwrap();

    assert!(entities.stored(RecordKind::Doctor, &doctor).is_none());
    assert!(!relations.has_actor(ActorKind::Doctor, &doctor));
}

#[tokio::test]
async fn patient_deletion_blocked_by_future_booking() {
    let (coordinator, _, _) = setup();

    let patient = create_patient(&coordinator, "p@example.com").await;
    let doctor = create_doctor(&coordinator, "d@example.com").await;
    coordinator
        .create_consultation(request(&patient, &doctor, "2030-01-01 10:00"))
        .await
        .unwrap();

    let err = coordinator
        .delete_entity(RecordKind::Patient, &patient)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Conflict(_)));
}

// ── Listing and views ────────────────────────────────────────────

#[tokio::test]
async fn consultations_are_listed_in_start_order() {
    let (coordinator, _, _) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;

    let late = coordinator
        .create_consultation(request(&a, &b, "2030-01-02 09:00"))
        .await
        .unwrap();
    let early = coordinator
        .create_consultation(request(&a, &b, "2030-01-01 14:00"))
        .await
        .unwrap();

    let listed = coordinator
        .list_consultations_for(RecordKind::Doctor, &b)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, early.id);
    assert_eq!(listed[1].id, late.id);
}

#[tokio::test]
async fn orphaned_mirrors_are_skipped_when_listing() {
    let (coordinator, entities, _) = setup();

    let a = create_patient(&coordinator, "a@example.com").await;
    let b = create_doctor(&coordinator, "b@example.com").await;

    let kept = coordinator
        .create_consultation(request(&a, &b, "2030-01-01 10:00"))
        .await
        .unwrap();
    let orphaned = coordinator
        .create_consultation(request(&a, &b, "2030-01-01 12:00"))
        .await
        .unwrap();
    entities.remove_silently(RecordKind::Consultation, &orphaned.id);

    let listed = coordinator
        .list_consultations_for(RecordKind::Patient, &a)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, kept.id);
}

#[tokio::test]
async fn entity_view_merges_graph_relationships() {
    let (coordinator, _, _) = setup();

    let patient = create_patient(&coordinator, "p@example.com").await;
    let doctor = create_doctor(&coordinator, "d@example.com").await;
    coordinator.assign_doctor(&patient, &doctor).await.unwrap();

    let patient_view = coordinator
        .get_entity(RecordKind::Patient, &patient)
        .await
        .unwrap();
    assert_eq!(patient_view.assigned_doctor, Some(doctor.clone()));

    let doctor_view = coordinator
        .get_entity(RecordKind::Doctor, &doctor)
        .await
        .unwrap();
    assert_eq!(doctor_view.patient_ids, vec![patient.clone()]);
}
