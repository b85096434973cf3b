//! Domain model for generic record storage.
//!
//! # Responsibility
//! - Define the untyped record shape shared by every entity.
//!
//! # Invariants
//! - Every record is identified by a stable [`record::RecordId`].
//! - Field values are opaque text; the core never interprets them.

pub mod record;
