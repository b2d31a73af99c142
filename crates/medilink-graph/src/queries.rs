//! Read operations for the relationship store.

use chrono::NaiveDateTime;
use neo4rs::query;

use medilink_core::schedule::{BookedSlot, TimeSlot};
use medilink_core::{EntityId, StoreError};

use crate::client::GraphClient;
use crate::mutations::{format_ts, TS_FORMAT};

impl GraphClient {
    // ── Assignment Queries ───────────────────────────────────────

    /// The doctor currently assigned to a patient, if any.
    pub async fn fetch_assigned_doctor(
        &self,
        patient: &EntityId,
    ) -> Result<Option<EntityId>, StoreError> {
        let q = query(
            "MATCH (p:Patient {id: $patient_id})-[:ASSIGNED_TO]->(d:Doctor)
             RETURN d.id AS doctor_id
             LIMIT 1",
        )
        .param("patient_id", patient.as_str());

        match self.query_one(q).await? {
            Some(row) => {
                let id: String = row
                    .get("doctor_id")
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
                Ok(Some(EntityId(id)))
            }
            None => Ok(None),
        }
    }

    /// Count of active assignment edges pointing at a doctor.
    pub async fn count_assignments(&self, doctor: &EntityId) -> Result<i64, StoreError> {
        let q = query(
            "MATCH (:Patient)-[r:ASSIGNED_TO]->(d:Doctor {id: $doctor_id})
             RETURN count(r) AS cnt",
        )
        .param("doctor_id", doctor.as_str());

        match self.query_one(q).await? {
            Some(row) => Ok(row.get::<i64>("cnt").unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Ids of every patient assigned to a doctor.
    pub async fn fetch_patients_of(&self, doctor: &EntityId) -> Result<Vec<EntityId>, StoreError> {
        let q = query(
            "MATCH (p:Patient)-[:ASSIGNED_TO]->(d:Doctor {id: $doctor_id})
             RETURN p.id AS patient_id
             ORDER BY p.id",
        )
        .param("doctor_id", doctor.as_str());

        let rows = self.query_rows(q).await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .get("patient_id")
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            ids.push(EntityId(id));
        }
        Ok(ids)
    }

    // ── Scheduling Queries ───────────────────────────────────────

    /// A participant's non-cancelled bookings, ordered by start. Feeds the
    /// scheduling policy's overlap check.
    pub async fn fetch_booked_slots(
        &self,
        participant: &EntityId,
    ) -> Result<Vec<BookedSlot>, StoreError> {
        let q = query(
            "MATCH (a {id: $participant_id})-[:PARTICIPATES_IN]->(c:Consultation)
             WHERE c.status <> 'cancelled'
             RETURN c.id AS id, c.start AS start, c.end AS end
             ORDER BY c.start",
        )
        .param("participant_id", participant.as_str());

        let rows = self.query_rows(q).await?;
        let mut slots = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .get("id")
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let start: String = row
                .get("start")
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let end: String = row
                .get("end")
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            slots.push(BookedSlot {
                consultation_id: EntityId(id),
                slot: TimeSlot::new(parse_ts(&start)?, parse_ts(&end)?),
            });
        }
        Ok(slots)
    }

    /// All consultation ids for a participant, ordered by start.
    pub async fn fetch_consultation_ids(
        &self,
        participant: &EntityId,
    ) -> Result<Vec<EntityId>, StoreError> {
        let q = query(
            "MATCH (a {id: $participant_id})-[:PARTICIPATES_IN]->(c:Consultation)
             RETURN c.id AS id
             ORDER BY c.start",
        )
        .param("participant_id", participant.as_str());

        let rows = self.query_rows(q).await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row
                .get("id")
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            ids.push(EntityId(id));
        }
        Ok(ids)
    }

    /// Whether a non-cancelled booking starting at or after `after` exists
    /// for the participant. String comparison is safe: timestamps are
    /// fixed-width ISO.
    pub async fn has_future_booking(
        &self,
        participant: &EntityId,
        after: NaiveDateTime,
    ) -> Result<bool, StoreError> {
        let q = query(
            "MATCH (a {id: $participant_id})-[:PARTICIPATES_IN]->(c:Consultation)
             WHERE c.status <> 'cancelled' AND c.start >= $after
             RETURN count(c) > 0 AS has_future",
        )
        .param("participant_id", participant.as_str())
        .param("after", format_ts(after));

        match self.query_one(q).await? {
            Some(row) => Ok(row.get::<bool>("has_future").unwrap_or(false)),
            None => Ok(false),
        }
    }
}

fn parse_ts(raw: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT)
        .map_err(|e| StoreError::Backend(format!("malformed timestamp {raw:?} in graph: {e}")))
}
