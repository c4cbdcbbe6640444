//! Canvas domain model.
//!
//! # Responsibility
//! - Define the flat component record and its container membership.
//! - Define typed audit records and the capped per-entity log.
//!
//! # Invariants
//! - Every component is identified by a stable `ItemId`.
//! - Components are never hard-deleted by core code.

pub mod audit;
pub mod canvas_item;
