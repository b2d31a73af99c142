//! Medilink Graph — Neo4j client for the relationship store.
//!
//! This crate is the single mutation point for the graph side of the
//! system: actor nodes, assignment edges, consultation mirrors, and the
//! interval queries behind conflict detection all flow through here.
//!
//! Schema: `Patient{id, first_name, last_name, email}`,
//! `Doctor{id, first_name, last_name, email, specialty}`,
//! `Consultation{id, start, end, status, description}`, with edges
//! `(Patient)-[:ASSIGNED_TO]->(Doctor)` and
//! `(Patient|Doctor)-[:PARTICIPATES_IN]->(Consultation)`.

pub mod client;
pub mod mutations;
pub mod queries;
mod store;

pub use client::{GraphClient, GraphConfig};
