//! Audit log repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Load and upsert one capped audit document per entity.
//! - Keep JSON encoding of records inside the repository boundary.
//!
//! # Invariants
//! - `write_log` replaces the whole document; there are no partial updates.
//! - A missing row reads as `None`, never as an error.

use crate::model::audit::{AuditLog, AuditRecord, EntityId};
use crate::repo::ensure_schema_ready;
use crate::repo::error::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

const AUDIT_LOG_COLUMNS: &[&str] = &[
    "entity_id",
    "all_changes",
    "type_changes",
    "created_at",
    "updated_at",
];

/// Document-store contract for audit logs.
pub trait AuditLogRepository {
    fn read_log(&self, entity_id: EntityId) -> RepoResult<Option<AuditLog>>;
    /// Full-document upsert.
    fn write_log(&self, log: &AuditLog) -> RepoResult<()>;
}

/// SQLite-backed audit log repository.
pub struct SqliteAuditLogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditLogRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, "audit_logs", AUDIT_LOG_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl AuditLogRepository for SqliteAuditLogRepository<'_> {
    fn read_log(&self, entity_id: EntityId) -> RepoResult<Option<AuditLog>> {
        let row: Option<(String, String, i64, i64)> = self
            .conn
            .query_row(
                "SELECT all_changes, type_changes, created_at, updated_at
                 FROM audit_logs
                 WHERE entity_id = ?1;",
                [entity_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((all_changes, type_changes, created_at, updated_at)) = row else {
            return Ok(None);
        };

        let all_changes: Vec<AuditRecord> = decode(&all_changes, "audit_logs.all_changes")?;
        let type_changes: BTreeMap<String, Vec<AuditRecord>> =
            decode(&type_changes, "audit_logs.type_changes")?;
        Ok(Some(AuditLog {
            entity_id,
            all_changes,
            type_changes,
            created_at,
            updated_at,
        }))
    }

    fn write_log(&self, log: &AuditLog) -> RepoResult<()> {
        let all_changes = serde_json::to_string(&log.all_changes)?;
        let type_changes = serde_json::to_string(&log.type_changes)?;
        self.conn.execute(
            "INSERT INTO audit_logs (
                entity_id,
                all_changes,
                type_changes,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(entity_id) DO UPDATE SET
                all_changes = excluded.all_changes,
                type_changes = excluded.type_changes,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at;",
            params![
                log.entity_id.to_string(),
                all_changes,
                type_changes,
                log.created_at,
                log.updated_at,
            ],
        )?;
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: &str, column: &'static str) -> RepoResult<T> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid json in {column}: {err}")))
}
