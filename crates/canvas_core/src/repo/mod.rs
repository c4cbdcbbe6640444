//! Persistence contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the narrow document-store contract the engine consumes.
//! - Keep SQL and JSON encoding details inside the repository boundary.
//!
//! # Invariants
//! - Repositories only accept fully migrated connections.
//! - Item writes are merge-patches of changed fields, one call per action.
//! - Audit logs are written as full-document upserts.

pub mod audit_repo;
pub mod canvas_repo;
pub mod change_feed;
pub mod error;

use crate::db::migrations::latest_version;
use crate::db::{table_exists, table_has_column, user_version};
use error::{RepoError, RepoResult};
use rusqlite::Connection;

/// Verifies schema version, table and columns before a repository binds to
/// `conn`.
pub(crate) fn ensure_schema_ready(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, table)? {
        return Err(RepoError::MissingRequiredTable(table));
    }
    for &column in columns {
        if !table_has_column(conn, table, column)? {
            return Err(RepoError::MissingRequiredColumn { table, column });
        }
    }
    Ok(())
}

/// Current time as Unix epoch milliseconds.
pub(crate) fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
