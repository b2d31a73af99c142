//! medilink-core: Shared types and store contracts for the Medilink platform.
//!
//! This crate provides the foundations used across all Medilink components:
//! - Actor and consultation records held in the document store
//! - The consultation status state machine
//! - Half-open time-slot arithmetic backing the scheduling checks
//! - The EntityStore / RelationshipStore capability traits and their error type

pub mod schedule;
pub mod status;
pub mod store;
pub mod types;

pub use status::ConsultationStatus;
pub use store::{ActorKind, ActorNode, EntityStore, RelationshipStore, StoreError};
pub use types::{EntityId, NewRecord, Record, RecordKind};
