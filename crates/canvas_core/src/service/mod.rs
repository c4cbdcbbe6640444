//! Application services over repositories.
//!
//! # Responsibility
//! - Bind the pure ordering engine to storage and the audit trail.
//!
//! # Invariants
//! - Services never hold a database handle of their own; they go through
//!   repository traits.

pub mod actor;
pub mod audit_service;
pub mod canvas_service;
