//! Core domain types for the Medilink record system.
//!
//! Entity records live in the document store; the graph store carries a
//! projection of patients and doctors plus all relationships between them.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::ConsultationStatus;

// ── Identity ──────────────────────────────────────────────────────

/// Opaque unique identifier for any record, assigned by the entity store
/// on insert. Safe to pass verbatim between both stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EntityId(pub String);

impl EntityId {
    /// Mint a fresh identifier. Called by entity store implementations only.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ── Record Kinds ──────────────────────────────────────────────────

/// The four record kinds persisted by the entity store. Each kind maps to
/// one collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Patient,
    Doctor,
    Admin,
    Consultation,
}

impl RecordKind {
    /// Collection directory name in the entity store.
    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::Patient => "patients",
            RecordKind::Doctor => "doctors",
            RecordKind::Admin => "admins",
            RecordKind::Consultation => "consultations",
        }
    }

    /// The three kinds that share the global email-uniqueness constraint.
    pub const ACTOR_KINDS: [RecordKind; 3] =
        [RecordKind::Patient, RecordKind::Doctor, RecordKind::Admin];
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Patient => "patient",
            RecordKind::Doctor => "doctor",
            RecordKind::Admin => "admin",
            RecordKind::Consultation => "consultation",
        };
        f.write_str(name)
    }
}

// ── Specialties ───────────────────────────────────────────────────

/// Closed set of medical specialties a doctor may declare.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    GeneralPractice,
    Cardiology,
    Pulmonology,
    Dermatology,
    Pediatrics,
    Neurology,
    Gastroenterology,
    Endocrinology,
    Rheumatology,
    Ophthalmology,
    Otolaryngology,
    Gynecology,
    Urology,
    Nephrology,
    Oncology,
}

impl Specialty {
    pub const ALL: [Specialty; 15] = [
        Specialty::GeneralPractice,
        Specialty::Cardiology,
        Specialty::Pulmonology,
        Specialty::Dermatology,
        Specialty::Pediatrics,
        Specialty::Neurology,
        Specialty::Gastroenterology,
        Specialty::Endocrinology,
        Specialty::Rheumatology,
        Specialty::Ophthalmology,
        Specialty::Otolaryngology,
        Specialty::Gynecology,
        Specialty::Urology,
        Specialty::Nephrology,
        Specialty::Oncology,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialty::GeneralPractice => "general_practice",
            Specialty::Cardiology => "cardiology",
            Specialty::Pulmonology => "pulmonology",
            Specialty::Dermatology => "dermatology",
            Specialty::Pediatrics => "pediatrics",
            Specialty::Neurology => "neurology",
            Specialty::Gastroenterology => "gastroenterology",
            Specialty::Endocrinology => "endocrinology",
            Specialty::Rheumatology => "rheumatology",
            Specialty::Ophthalmology => "ophthalmology",
            Specialty::Otolaryngology => "otolaryngology",
            Specialty::Gynecology => "gynecology",
            Specialty::Urology => "urology",
            Specialty::Nephrology => "nephrology",
            Specialty::Oncology => "oncology",
        }
    }

    /// Parse the wire/CLI form. Returns `None` for anything outside the set.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|sp| sp.as_str() == s)
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Stored Records ────────────────────────────────────────────────

/// A patient. The assigned-doctor reference is deliberately absent here:
/// assignment lives only in the relationship store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub birth_date: NaiveDate,
    pub condition: Option<String>,
    pub condition_notes: Option<String>,
    pub phone: Option<String>,
}

/// A doctor. Patient links and consultation edges live in the graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub specialty: Specialty,
}

/// An administrator. Admins exist only in the entity store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Admin {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// A scheduled consultation. This record is the truth for status,
/// description, and the time window; the graph holds a mirror node used
/// for overlap queries plus the two participation edges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consultation {
    pub id: EntityId,
    pub patient_id: EntityId,
    pub doctor_id: EntityId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: ConsultationStatus,
    pub description: Option<String>,
}

/// Enum wrapper for every record kind the entity store persists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "record", rename_all = "lowercase")]
pub enum Record {
    Patient(Patient),
    Doctor(Doctor),
    Admin(Admin),
    Consultation(Consultation),
}

impl Record {
    pub fn id(&self) -> &EntityId {
        match self {
            Record::Patient(r) => &r.id,
            Record::Doctor(r) => &r.id,
            Record::Admin(r) => &r.id,
            Record::Consultation(r) => &r.id,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Patient(_) => RecordKind::Patient,
            Record::Doctor(_) => RecordKind::Doctor,
            Record::Admin(_) => RecordKind::Admin,
            Record::Consultation(_) => RecordKind::Consultation,
        }
    }

    /// Email address, for the kinds that carry one.
    pub fn email(&self) -> Option<&str> {
        match self {
            Record::Patient(r) => Some(&r.email),
            Record::Doctor(r) => Some(&r.email),
            Record::Admin(r) => Some(&r.email),
            Record::Consultation(_) => None,
        }
    }
}

// ── Creation Drafts ───────────────────────────────────────────────

/// Draft of a patient record, before the entity store assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub birth_date: NaiveDate,
    pub condition: Option<String>,
    pub condition_notes: Option<String>,
    pub phone: Option<String>,
}

/// Draft of a doctor record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDoctor {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub specialty: Specialty,
}

/// Draft of an admin record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAdmin {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// Fully resolved consultation body, built by the coordinator once the
/// window and initial status are validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationDraft {
    pub patient_id: EntityId,
    pub doctor_id: EntityId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: ConsultationStatus,
    pub description: Option<String>,
}

/// Draft wrapper accepted by `EntityStore::insert`.
#[derive(Debug, Clone)]
pub enum NewRecord {
    Patient(NewPatient),
    Doctor(NewDoctor),
    Admin(NewAdmin),
    Consultation(ConsultationDraft),
}

fn require(field: &'static str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("required field is empty: {field}"))
    } else {
        Ok(())
    }
}

impl NewRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            NewRecord::Patient(_) => RecordKind::Patient,
            NewRecord::Doctor(_) => RecordKind::Doctor,
            NewRecord::Admin(_) => RecordKind::Admin,
            NewRecord::Consultation(_) => RecordKind::Consultation,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            NewRecord::Patient(d) => Some(&d.email),
            NewRecord::Doctor(d) => Some(&d.email),
            NewRecord::Admin(d) => Some(&d.email),
            NewRecord::Consultation(_) => None,
        }
    }

    /// Required-field check applied before any store is touched.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            NewRecord::Patient(d) => {
                require("first_name", &d.first_name)?;
                require("last_name", &d.last_name)?;
                require("email", &d.email)?;
                require("password_hash", &d.password_hash)
            }
            NewRecord::Doctor(d) => {
                require("first_name", &d.first_name)?;
                require("last_name", &d.last_name)?;
                require("email", &d.email)?;
                require("password_hash", &d.password_hash)
            }
            NewRecord::Admin(d) => {
                require("first_name", &d.first_name)?;
                require("last_name", &d.last_name)?;
                require("email", &d.email)?;
                require("password_hash", &d.password_hash)
            }
            NewRecord::Consultation(d) => {
                if d.end <= d.start {
                    Err("consultation window must end after it starts".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Bind the draft to a store-assigned id.
    pub fn into_record(self, id: EntityId) -> Record {
        match self {
            NewRecord::Patient(d) => Record::Patient(Patient {
                id,
                first_name: d.first_name,
                last_name: d.last_name,
                email: d.email,
                password_hash: d.password_hash,
                birth_date: d.birth_date,
                condition: d.condition,
                condition_notes: d.condition_notes,
                phone: d.phone,
            }),
            NewRecord::Doctor(d) => Record::Doctor(Doctor {
                id,
                first_name: d.first_name,
                last_name: d.last_name,
                email: d.email,
                password_hash: d.password_hash,
                specialty: d.specialty,
            }),
            NewRecord::Admin(d) => Record::Admin(Admin {
                id,
                first_name: d.first_name,
                last_name: d.last_name,
                email: d.email,
                password_hash: d.password_hash,
            }),
            NewRecord::Consultation(d) => Record::Consultation(Consultation {
                id,
                patient_id: d.patient_id,
                doctor_id: d.doctor_id,
                start: d.start,
                end: d.end,
                status: d.status,
                description: d.description,
            }),
        }
    }
}

// ── Partial Updates ───────────────────────────────────────────────

/// Field-optional patch applied to an existing record. Fields that do not
/// belong to the target kind are rejected rather than silently dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub specialty: Option<Specialty>,
    pub birth_date: Option<NaiveDate>,
    pub condition: Option<String>,
    pub condition_notes: Option<String>,
    pub phone: Option<String>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.password_hash.is_none()
            && self.specialty.is_none()
            && self.birth_date.is_none()
            && self.condition.is_none()
            && self.condition_notes.is_none()
            && self.phone.is_none()
    }

    fn patient_only_fields(&self) -> bool {
        self.birth_date.is_some()
            || self.condition.is_some()
            || self.condition_notes.is_some()
            || self.phone.is_some()
    }

    /// Apply the patch in place. Errors name the offending field combination.
    pub fn apply_to(&self, record: &mut Record) -> Result<(), String> {
        match record {
            Record::Patient(p) => {
                if self.specialty.is_some() {
                    return Err("specialty applies only to doctors".to_string());
                }
                apply_common(
                    &mut p.first_name,
                    &mut p.last_name,
                    &mut p.email,
                    &mut p.password_hash,
                    self,
                );
                if let Some(birth_date) = self.birth_date {
                    p.birth_date = birth_date;
                }
                if let Some(condition) = &self.condition {
                    p.condition = Some(condition.clone());
                }
                if let Some(notes) = &self.condition_notes {
                    p.condition_notes = Some(notes.clone());
                }
                if let Some(phone) = &self.phone {
                    p.phone = Some(phone.clone());
                }
                Ok(())
            }
            Record::Doctor(d) => {
                if self.patient_only_fields() {
                    return Err("patient-only fields cannot be applied to a doctor".to_string());
                }
                apply_common(
                    &mut d.first_name,
                    &mut d.last_name,
                    &mut d.email,
                    &mut d.password_hash,
                    self,
                );
                if let Some(specialty) = self.specialty {
                    d.specialty = specialty;
                }
                Ok(())
            }
            Record::Admin(a) => {
                if self.specialty.is_some() || self.patient_only_fields() {
                    return Err("only name, email, and credential fields apply to admins"
                        .to_string());
                }
                apply_common(
                    &mut a.first_name,
                    &mut a.last_name,
                    &mut a.email,
                    &mut a.password_hash,
                    self,
                );
                Ok(())
            }
            Record::Consultation(_) => {
                Err("consultations are updated through status transitions".to_string())
            }
        }
    }
}

fn apply_common(
    first_name: &mut String,
    last_name: &mut String,
    email: &mut String,
    password_hash: &mut String,
    patch: &EntityPatch,
) {
    if let Some(v) = &patch.first_name {
        *first_name = v.clone();
    }
    if let Some(v) = &patch.last_name {
        *last_name = v.clone();
    }
    if let Some(v) = &patch.email {
        *email = v.clone();
    }
    if let Some(v) = &patch.password_hash {
        *password_hash = v.clone();
    }
}
