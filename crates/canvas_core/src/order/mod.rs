//! Hierarchy and ordering engine.
//!
//! # Responsibility
//! - Normalize sibling orders (`index`).
//! - Derive display numbering and row order (`display`).
//! - Compute drag and batch reparent results (`reparent`).
//!
//! # Invariants
//! - Everything in this module is pure; storage is the service layer's job.

pub mod display;
pub mod index;
pub mod reparent;
