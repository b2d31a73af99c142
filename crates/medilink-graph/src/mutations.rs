//! Write operations for the relationship store.
//!
//! Actor nodes use MERGE (upsert) semantics keyed by id so a replayed
//! coordinator write stays idempotent. Writes that require both endpoint
//! nodes RETURN a marker row and fail loudly when a MATCH found nothing,
//! instead of silently creating no edges.

use chrono::NaiveDateTime;
use neo4rs::query;

use medilink_core::store::{ActorKind, ActorNode};
use medilink_core::types::Consultation;
use medilink_core::{ConsultationStatus, EntityId, StoreError};

use crate::client::GraphClient;

/// Timestamp layout used for `Consultation.start` / `Consultation.end`
/// properties. Fixed-width ISO, so lexicographic comparison in Cypher
/// matches chronological order.
pub(crate) const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub(crate) fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

impl GraphClient {
    // ── Actor Nodes ──────────────────────────────────────────────

    /// Upsert an actor node with its property projection.
    pub async fn merge_actor(&self, actor: &ActorNode) -> Result<(), StoreError> {
        let label = actor.kind.label();
        let cypher = format!(
            "MERGE (n:{label} {{id: $id}})
             SET n.first_name = $first_name,
                 n.last_name = $last_name,
                 n.email = $email,
                 n.specialty = $specialty"
        );

        let q = query(&cypher)
            .param("id", actor.id.as_str())
            .param("first_name", actor.first_name.clone())
            .param("last_name", actor.last_name.clone())
            .param("email", actor.email.clone())
            .param(
                "specialty",
                actor
                    .specialty
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
            );

        self.run(q).await
    }

    /// Update the properties of an existing actor node. Missing nodes are
    /// reported, not silently skipped.
    pub async fn update_actor_props(&self, actor: &ActorNode) -> Result<(), StoreError> {
        let label = actor.kind.label();
        let cypher = format!(
            "MATCH (n:{label} {{id: $id}})
             SET n.first_name = $first_name,
                 n.last_name = $last_name,
                 n.email = $email,
                 n.specialty = $specialty
             RETURN count(n) AS cnt"
        );

        let q = query(&cypher)
            .param("id", actor.id.as_str())
            .param("first_name", actor.first_name.clone())
            .param("last_name", actor.last_name.clone())
            .param("email", actor.email.clone())
            .param(
                "specialty",
                actor
                    .specialty
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
            );

        self.expect_row_count(q, actor_kind_to_record(actor.kind), &actor.id)
            .await
    }

    /// Remove an actor node and every edge attached to it.
    pub async fn detach_actor(&self, kind: ActorKind, id: &EntityId) -> Result<(), StoreError> {
        let cypher = format!(
            "MATCH (n:{label} {{id: $id}})
             DETACH DELETE n",
            label = kind.label()
        );
        self.run(query(&cypher).param("id", id.as_str())).await
    }

    // ── Assignment Edges ─────────────────────────────────────────

    /// Delete the patient's current ASSIGNED_TO edge, whatever its target.
    /// A patient with no assignment is a no-op.
    pub async fn delete_assignment_edge(&self, patient: &EntityId) -> Result<(), StoreError> {
        let q = query(
            "MATCH (p:Patient {id: $patient_id})-[r:ASSIGNED_TO]->()
             DELETE r",
        )
        .param("patient_id", patient.as_str());
        self.run(q).await
    }

    /// Create the ASSIGNED_TO edge. MERGE keeps re-assignment to the same
    /// doctor idempotent.
    pub async fn merge_assignment_edge(
        &self,
        patient: &EntityId,
        doctor: &EntityId,
    ) -> Result<(), StoreError> {
        let q = query(
            "MATCH (p:Patient {id: $patient_id}), (d:Doctor {id: $doctor_id})
             MERGE (p)-[:ASSIGNED_TO]->(d)
             RETURN count(d) AS cnt",
        )
        .param("patient_id", patient.as_str())
        .param("doctor_id", doctor.as_str());

        match self.query_one(q).await? {
            Some(row) if row.get::<i64>("cnt").unwrap_or(0) > 0 => Ok(()),
            _ => Err(StoreError::Backend(format!(
                "assignment endpoints missing in graph: patient {patient}, doctor {doctor}"
            ))),
        }
    }

    // ── Consultation Mirror ──────────────────────────────────────

    /// Create the consultation mirror node and both participation edges in
    /// a single statement, keyed by the entity-store id.
    pub async fn create_consultation_node(
        &self,
        consultation: &Consultation,
    ) -> Result<(), StoreError> {
        let q = query(
            "MATCH (p:Patient {id: $patient_id}), (d:Doctor {id: $doctor_id})
             CREATE (c:Consultation {
                 id: $id,
                 start: $start,
                 end: $end,
                 status: $status,
                 description: $description
             })
             CREATE (p)-[:PARTICIPATES_IN]->(c)
             CREATE (d)-[:PARTICIPATES_IN]->(c)
             RETURN c.id AS id",
        )
        .param("patient_id", consultation.patient_id.as_str())
        .param("doctor_id", consultation.doctor_id.as_str())
        .param("id", consultation.id.as_str())
        .param("start", format_ts(consultation.start))
        .param("end", format_ts(consultation.end))
        .param("status", consultation.status.as_str())
        .param(
            "description",
            consultation.description.clone().unwrap_or_default(),
        );

        match self.query_one(q).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::Backend(format!(
                "participant nodes missing in graph: patient {}, doctor {}",
                consultation.patient_id, consultation.doctor_id
            ))),
        }
    }

    /// Sync the mirror's status property with the entity record.
    pub async fn update_consultation_status(
        &self,
        id: &EntityId,
        status: ConsultationStatus,
    ) -> Result<(), StoreError> {
        let q = query(
            "MATCH (c:Consultation {id: $id})
             SET c.status = $status
             RETURN count(c) AS cnt",
        )
        .param("id", id.as_str())
        .param("status", status.as_str());

        self.expect_row_count(q, medilink_core::RecordKind::Consultation, id)
            .await
    }

    // ── Helpers ──────────────────────────────────────────────────

    async fn expect_row_count(
        &self,
        q: neo4rs::Query,
        kind: medilink_core::RecordKind,
        id: &EntityId,
    ) -> Result<(), StoreError> {
        match self.query_one(q).await? {
            Some(row) if row.get::<i64>("cnt").unwrap_or(0) > 0 => Ok(()),
            _ => Err(StoreError::NotFound {
                kind,
                id: id.clone(),
            }),
        }
    }
}

fn actor_kind_to_record(kind: ActorKind) -> medilink_core::RecordKind {
    match kind {
        ActorKind::Patient => medilink_core::RecordKind::Patient,
        ActorKind::Doctor => medilink_core::RecordKind::Doctor,
    }
}
