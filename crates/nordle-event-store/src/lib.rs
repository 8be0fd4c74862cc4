//! Nordle event stores.
//!
//! `InMemoryEventRepository` backs tests and single-process deployments;
//! `PgEventRepository` persists streams in PostgreSQL.

pub mod memory;
pub mod pg_event_repository;
