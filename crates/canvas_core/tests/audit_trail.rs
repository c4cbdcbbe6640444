use canvas_core::db::open_db_in_memory;
use canvas_core::model::audit::type_log_key;
use canvas_core::{
    Actor, AuditChange, AuditLimits, AuditLogRepository, AuditRecord, AuditService,
    SqliteAuditLogRepository,
};
use serde_json::{json, Value};
use uuid::Uuid;

fn reorder(item_id: Uuid, new_index: usize) -> AuditChange {
    AuditChange::DragDropReorder {
        item_id,
        item_name: "Row".to_string(),
        old_index: 0,
        new_index,
    }
}

fn rename(item_id: Uuid, step: usize) -> AuditChange {
    AuditChange::FieldUpdate {
        item_id,
        field_name: "name".to_string(),
        old_value: json!(format!("v{step}")),
        new_value: json!(format!("v{}", step + 1)),
    }
}

#[test]
fn first_append_creates_log() {
    let conn = open_db_in_memory().unwrap();
    let service = AuditService::new(SqliteAuditLogRepository::try_new(&conn).unwrap());
    let entity_id = Uuid::new_v4();

    let record = service
        .record(entity_id, reorder(Uuid::new_v4(), 3), Actor::unknown())
        .unwrap();

    let log = service.read_log(entity_id).unwrap().unwrap();
    assert_eq!(log.all_changes, vec![record.clone()]);
    assert!(log.created_at > 0);
    assert!(log.updated_at >= log.created_at);
    assert_eq!(log.changes_of_type("DRAG_DROP_REORDER"), &[record]);
    assert_eq!(log.type_changes.len(), 1);
    assert!(log
        .type_changes
        .contains_key(&type_log_key("DRAG_DROP_REORDER")));
}

#[test]
fn caps_keep_only_newest_records() {
    let conn = open_db_in_memory().unwrap();
    let service = AuditService::new(SqliteAuditLogRepository::try_new(&conn).unwrap());
    let entity_id = Uuid::new_v4();
    let item_id = Uuid::new_v4();

    for step in 0..105 {
        service
            .record(entity_id, reorder(item_id, step), Actor::unknown())
            .unwrap();
    }

    let log = service.read_log(entity_id).unwrap().unwrap();
    assert_eq!(log.all_changes.len(), 100);
    let newest: Vec<usize> = log
        .all_changes
        .iter()
        .map(|record| match record.change {
            AuditChange::DragDropReorder { new_index, .. } => new_index,
            _ => unreachable!(),
        })
        .collect();
    let expected: Vec<usize> = (5..105).rev().collect();
    assert_eq!(newest, expected);

    let typed = log.changes_of_type("DRAG_DROP_REORDER");
    assert_eq!(typed.len(), 20);
    assert_eq!(typed[0], log.all_changes[0]);
    assert_eq!(typed[19], log.all_changes[19]);
}

#[test]
fn per_type_lists_are_capped_independently() {
    let conn = open_db_in_memory().unwrap();
    let service = AuditService::with_limits(
        SqliteAuditLogRepository::try_new(&conn).unwrap(),
        AuditLimits {
            max_changes: 10,
            max_type_changes: 3,
        },
    );
    let entity_id = Uuid::new_v4();
    let item_id = Uuid::new_v4();

    for step in 0..5 {
        service
            .record(entity_id, rename(item_id, step), Actor::unknown())
            .unwrap();
    }
    service
        .record(entity_id, reorder(item_id, 1), Actor::unknown())
        .unwrap();

    let log = service.read_log(entity_id).unwrap().unwrap();
    assert_eq!(log.all_changes.len(), 6);
    assert_eq!(log.all_changes[0].action_type(), "DRAG_DROP_REORDER");
    assert_eq!(log.changes_of_type("FIELD_UPDATE").len(), 3);
    assert_eq!(log.changes_of_type("DRAG_DROP_REORDER").len(), 1);
    assert!(log.changes_of_type("ADD_TO_TABLE").is_empty());
}

#[test]
fn recent_changes_filters_by_action_type() {
    let conn = open_db_in_memory().unwrap();
    let service = AuditService::new(SqliteAuditLogRepository::try_new(&conn).unwrap());
    let entity_id = Uuid::new_v4();
    let item_id = Uuid::new_v4();

    assert!(service.recent_changes(entity_id, None).unwrap().is_empty());

    service
        .record(entity_id, rename(item_id, 0), Actor::unknown())
        .unwrap();
    service
        .record(entity_id, reorder(item_id, 2), Actor::unknown())
        .unwrap();

    let all = service.recent_changes(entity_id, None).unwrap();
    let actions: Vec<&str> = all.iter().map(AuditRecord::action_type).collect();
    assert_eq!(actions, vec!["DRAG_DROP_REORDER", "FIELD_UPDATE"]);

    let renames = service
        .recent_changes(entity_id, Some("FIELD_UPDATE"))
        .unwrap();
    assert_eq!(renames.len(), 1);
    assert_eq!(renames[0].field_name, "name");
}

#[test]
fn logs_are_stored_as_tagged_json_documents() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAuditLogRepository::try_new(&conn).unwrap();
    let service = AuditService::new(SqliteAuditLogRepository::try_new(&conn).unwrap());
    let entity_id = Uuid::new_v4();
    let actor = Actor::new("u-7", "Grace", "grace@example.com");

    service
        .record(entity_id, reorder(Uuid::new_v4(), 4), actor.clone())
        .unwrap();

    let raw: String = conn
        .query_row(
            "SELECT all_changes FROM audit_logs WHERE entity_id = ?1;",
            [entity_id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    let document: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(document[0]["change"]["action_type"], "DRAG_DROP_REORDER");
    assert_eq!(document[0]["change"]["payload"]["new_index"], 4);
    assert_eq!(document[0]["field_name"], "order");
    assert_eq!(document[0]["actor"]["user_name"], "Grace");

    let log = repo.read_log(entity_id).unwrap().unwrap();
    assert_eq!(log.all_changes[0].actor, actor);
}

#[test]
fn corrupt_documents_surface_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAuditLogRepository::try_new(&conn).unwrap();
    let entity_id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO audit_logs (entity_id, all_changes, type_changes, created_at, updated_at)
         VALUES (?1, 'not json', '{}', 1, 1);",
        [entity_id.to_string()],
    )
    .unwrap();

    let err = repo.read_log(entity_id).unwrap_err();
    assert!(err.to_string().contains("audit_logs.all_changes"));
}
