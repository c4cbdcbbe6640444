use canvas_core::db::migrations::latest_version;
use canvas_core::db::{open_db, open_db_in_memory, DbError};
use canvas_core::{RepoError, SqliteAuditLogRepository, SqliteCanvasRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "canvas_items");
    assert_table_exists(&conn, "audit_logs");
}

#[test]
fn reopening_file_database_keeps_schema_and_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("canvas.sqlite3");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute(
            "INSERT INTO canvas_items (canvas_id, item_id, name, component_type, sort_order)
             VALUES ('c', 'i', 'Title', 'text', 0);",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM canvas_items;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_reject_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteCanvasRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
    assert!(SqliteAuditLogRepository::try_new(&conn).is_err());
}

#[test]
fn repositories_reject_missing_columns() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE canvas_items (canvas_id TEXT, item_id TEXT);
         CREATE TABLE audit_logs (entity_id TEXT);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    let err = SqliteCanvasRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::MissingRequiredColumn {
            table: "canvas_items",
            column: "name",
        }
    ));
}

#[test]
fn stored_rows_cannot_carry_both_parent_pointers() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO canvas_items (
            canvas_id, item_id, name, component_type, sort_order, fk_table_id, fk_group_id
         ) VALUES ('c', 'i', 'Bad', 'text', 0, 't', 'g');",
        [],
    );
    assert!(result.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
