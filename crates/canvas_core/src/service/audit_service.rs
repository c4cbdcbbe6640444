//! Bounded audit trail recorder.
//!
//! # Responsibility
//! - Append typed change records to the per-entity capped log.
//! - Serve newest-first reads for review screens.
//!
//! # Invariants
//! - Append is read-modify-write without locking; concurrent writers race
//!   and the last write wins.
//! - A store miss is treated as an empty log, created on first append.
//! - Records are never mutated; only cap truncation removes them.

use crate::model::audit::{Actor, AuditChange, AuditLimits, AuditLog, AuditRecord, EntityId};
use crate::repo::audit_repo::AuditLogRepository;
use crate::repo::error::RepoResult;
use crate::repo::now_epoch_ms;
use log::{error, info};

/// Audit recorder over an audit log repository.
pub struct AuditService<L: AuditLogRepository> {
    repo: L,
    limits: AuditLimits,
}

impl<L: AuditLogRepository> AuditService<L> {
    /// Creates a recorder with default caps (100 overall, 20 per action).
    pub fn new(repo: L) -> Self {
        Self::with_limits(repo, AuditLimits::default())
    }

    pub fn with_limits(repo: L, limits: AuditLimits) -> Self {
        Self { repo, limits }
    }

    pub fn limits(&self) -> AuditLimits {
        self.limits
    }

    /// Prepends `record` to the entity's log, creating the log when absent.
    pub fn append(&self, entity_id: EntityId, record: AuditRecord) -> RepoResult<()> {
        let now = now_epoch_ms();
        let action_type = record.action_type();
        let mut log = match self.repo.read_log(entity_id) {
            Ok(Some(log)) => log,
            Ok(None) => AuditLog::new(entity_id, now),
            Err(err) => {
                error!(
                    "event=audit_append module=audit status=error stage=read entity_id={entity_id} action={action_type} error={err}"
                );
                return Err(err);
            }
        };

        log.prepend(record, self.limits, now);
        if let Err(err) = self.repo.write_log(&log) {
            error!(
                "event=audit_append module=audit status=error stage=write entity_id={entity_id} action={action_type} error={err}"
            );
            return Err(err);
        }

        info!(
            "event=audit_append module=audit status=ok entity_id={entity_id} action={action_type} retained={}",
            log.all_changes.len()
        );
        Ok(())
    }

    /// Builds a record stamped now and appends it.
    pub fn record(
        &self,
        entity_id: EntityId,
        change: AuditChange,
        actor: Actor,
    ) -> RepoResult<AuditRecord> {
        let record = AuditRecord::new(entity_id, change, actor, now_epoch_ms());
        self.append(entity_id, record.clone())?;
        Ok(record)
    }

    pub fn read_log(&self, entity_id: EntityId) -> RepoResult<Option<AuditLog>> {
        self.repo.read_log(entity_id)
    }

    /// Newest-first records, optionally restricted to one action type.
    pub fn recent_changes(
        &self,
        entity_id: EntityId,
        action_type: Option<&str>,
    ) -> RepoResult<Vec<AuditRecord>> {
        let Some(log) = self.repo.read_log(entity_id)? else {
            return Ok(Vec::new());
        };
        Ok(match action_type {
            Some(action_type) => log.changes_of_type(action_type).to_vec(),
            None => log.all_changes,
        })
    }
}
