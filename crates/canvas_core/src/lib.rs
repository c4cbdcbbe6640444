//! Core of the canvas builder: component hierarchy, ordering, and audit trail.
//! This crate owns the ordering and reparenting invariants; hosts only render.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod order;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::audit::{
    Actor, AuditChange, AuditLimits, AuditLog, AuditRecord, BatchMove, EntityId, ParentMove,
};
pub use model::canvas_item::{CanvasId, CanvasItem, ComponentType, ItemId, ParentRef};
pub use order::display::{flatten_display_order, project_display, DisplayBlock};
pub use order::index::{normalize_orders, Ordered};
pub use order::reparent::{ItemPatch, ReparentError, ReparentOutcome};
pub use repo::audit_repo::{AuditLogRepository, SqliteAuditLogRepository};
pub use repo::canvas_repo::{CanvasRepository, SqliteCanvasRepository};
pub use repo::change_feed::{CanvasChange, CanvasChangeEvent, ChangeListener, SubscriptionId};
pub use repo::error::{RepoError, RepoResult};
pub use service::actor::ActorProvider;
pub use service::audit_service::AuditService;
pub use service::canvas_service::{
    CanvasService, CanvasServiceError, CanvasServiceResult, ChangeOutcome, NewCanvasItem,
    Selection,
};

/// Health check for host wiring.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
