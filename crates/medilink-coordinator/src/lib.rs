//! medilink-coordinator: orchestrated multi-store writes for Medilink.
//!
//! Every business operation enters here, gets validated against the pure
//! scheduling policy and state machine, and is then applied to the entity
//! store and the relationship store in a fixed order with a defined
//! compensation path for partial failures.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod policy;

pub use config::ClinicConfig;
pub use coordinator::{ConsultationRequest, Coordinator, EntityView};
pub use error::{CoordinatorError, StoreSide};
