//! `RelationshipStore` implementation for the Neo4j client.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use medilink_core::schedule::BookedSlot;
use medilink_core::store::{ActorKind, ActorNode, RelationshipStore};
use medilink_core::types::Consultation;
use medilink_core::{ConsultationStatus, EntityId, StoreError};

use crate::client::GraphClient;

#[async_trait]
impl RelationshipStore for GraphClient {
    async fn create_actor(&self, actor: &ActorNode) -> Result<(), StoreError> {
        self.merge_actor(actor).await
    }

    async fn sync_actor(&self, actor: &ActorNode) -> Result<(), StoreError> {
        self.update_actor_props(actor).await
    }

    async fn remove_actor(&self, kind: ActorKind, id: &EntityId) -> Result<(), StoreError> {
        self.detach_actor(kind, id).await
    }

    async fn clear_assignment(&self, patient: &EntityId) -> Result<(), StoreError> {
        self.delete_assignment_edge(patient).await
    }

    async fn create_assignment(
        &self,
        patient: &EntityId,
        doctor: &EntityId,
    ) -> Result<(), StoreError> {
        self.merge_assignment_edge(patient, doctor).await
    }

    async fn assigned_doctor(&self, patient: &EntityId) -> Result<Option<EntityId>, StoreError> {
        self.fetch_assigned_doctor(patient).await
    }

    async fn assignment_count(&self, doctor: &EntityId) -> Result<i64, StoreError> {
        self.count_assignments(doctor).await
    }

    async fn patients_of(&self, doctor: &EntityId) -> Result<Vec<EntityId>, StoreError> {
        self.fetch_patients_of(doctor).await
    }

    async fn create_mirror(&self, consultation: &Consultation) -> Result<(), StoreError> {
        self.create_consultation_node(consultation).await
    }

    async fn set_mirror_status(
        &self,
        id: &EntityId,
        status: ConsultationStatus,
    ) -> Result<(), StoreError> {
        self.update_consultation_status(id, status).await
    }

    async fn booked_slots(&self, participant: &EntityId) -> Result<Vec<BookedSlot>, StoreError> {
        self.fetch_booked_slots(participant).await
    }

    async fn consultations_for(
        &self,
        participant: &EntityId,
    ) -> Result<Vec<EntityId>, StoreError> {
        self.fetch_consultation_ids(participant).await
    }

    async fn future_booking_exists(
        &self,
        participant: &EntityId,
        after: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        self.has_future_booking(participant, after).await
    }
}
