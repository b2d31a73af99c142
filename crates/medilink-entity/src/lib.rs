//! medilink-entity: document persistence for canonical Medilink records.
//!
//! Records are stored as JSON files, one directory per collection. This
//! crate implements the `EntityStore` contract from medilink-core; nothing
//! else in the system touches the files directly.

pub mod store;

pub use store::JsonEntityStore;
