//! Audit trail domain model.
//!
//! # Responsibility
//! - Define typed change payloads for every structural canvas mutation.
//! - Own the capped, newest-first log shape persisted per entity.
//!
//! # Invariants
//! - Records are immutable once appended.
//! - `all_changes` and every per-type list are sorted newest first.
//! - Truncation only drops the oldest tail, it never reorders.

use crate::model::canvas_item::{ComponentType, ItemId, ParentRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Id of the entity that owns an audit log (usually a canvas).
pub type EntityId = Uuid;

/// Default cap for `AuditLog::all_changes`.
pub const DEFAULT_MAX_CHANGES: usize = 100;
/// Default cap for each per-action list in `AuditLog::type_changes`.
pub const DEFAULT_MAX_TYPE_CHANGES: usize = 20;

const UNKNOWN_USER_ID: &str = "unknown";
const UNKNOWN_USER_NAME: &str = "Unknown User";

/// Identity of the user performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
}

impl Actor {
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        user_email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            user_email: user_email.into(),
        }
    }

    /// Degenerate actor used when the host cannot identify the user.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_USER_ID, UNKNOWN_USER_NAME, "")
    }

    pub fn is_unknown(&self) -> bool {
        self.user_id == UNKNOWN_USER_ID
    }
}

/// One item's membership change inside a batch reparent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentMove {
    pub item_id: ItemId,
    pub item_name: String,
    pub old_parent: Option<ParentRef>,
    pub new_parent: Option<ParentRef>,
}

/// Payload shared by the four batch reparent actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMove {
    pub container_id: ItemId,
    pub moves: Vec<ParentMove>,
    pub moved_count: usize,
}

impl BatchMove {
    pub fn new(container_id: ItemId, moves: Vec<ParentMove>) -> Self {
        let moved_count = moves.len();
        Self {
            container_id,
            moves,
            moved_count,
        }
    }
}

/// Structural change recorded in the audit trail, one variant per action type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "action_type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum AuditChange {
    AddComponent {
        item_id: ItemId,
        item_name: String,
        component_type: ComponentType,
        parent: Option<ParentRef>,
    },
    FieldUpdate {
        item_id: ItemId,
        field_name: String,
        old_value: Value,
        new_value: Value,
    },
    DragDropReorder {
        item_id: ItemId,
        item_name: String,
        old_index: usize,
        new_index: usize,
    },
    AddToTable(BatchMove),
    AddToGroup(BatchMove),
    RemoveFromTable(BatchMove),
    RemoveFromGroup(BatchMove),
}

impl AuditChange {
    /// Stable action type name, as persisted in `action_type`.
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::AddComponent { .. } => "ADD_COMPONENT",
            Self::FieldUpdate { .. } => "FIELD_UPDATE",
            Self::DragDropReorder { .. } => "DRAG_DROP_REORDER",
            Self::AddToTable(_) => "ADD_TO_TABLE",
            Self::AddToGroup(_) => "ADD_TO_GROUP",
            Self::RemoveFromTable(_) => "REMOVE_FROM_TABLE",
            Self::RemoveFromGroup(_) => "REMOVE_FROM_GROUP",
        }
    }

    /// Name of the field the change touched.
    pub fn field_name(&self) -> &str {
        match self {
            Self::AddComponent { .. } => "component",
            Self::FieldUpdate { field_name, .. } => field_name.as_str(),
            Self::DragDropReorder { .. } => "order",
            Self::AddToTable(_) | Self::RemoveFromTable(_) => "fk_table_id",
            Self::AddToGroup(_) | Self::RemoveFromGroup(_) => "fk_group_id",
        }
    }
}

/// Key of the per-action list for `action_type`, e.g. `add_to_table_records`.
pub fn type_log_key(action_type: &str) -> String {
    format!("{}_records", action_type.to_ascii_lowercase())
}

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub record_id: Uuid,
    pub entity_id: EntityId,
    pub field_name: String,
    pub change: AuditChange,
    pub actor: Actor,
    /// Unix epoch milliseconds.
    pub timestamp: i64,
}

impl AuditRecord {
    pub fn new(entity_id: EntityId, change: AuditChange, actor: Actor, timestamp: i64) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            entity_id,
            field_name: change.field_name().to_string(),
            change,
            actor,
            timestamp,
        }
    }

    pub fn action_type(&self) -> &'static str {
        self.change.action_type()
    }
}

/// Caps applied on every append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditLimits {
    pub max_changes: usize,
    pub max_type_changes: usize,
}

impl Default for AuditLimits {
    fn default() -> Self {
        Self {
            max_changes: DEFAULT_MAX_CHANGES,
            max_type_changes: DEFAULT_MAX_TYPE_CHANGES,
        }
    }
}

/// Capped change log of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLog {
    pub entity_id: EntityId,
    /// Newest first.
    pub all_changes: Vec<AuditRecord>,
    /// Per-action lists keyed by `type_log_key`, newest first.
    pub type_changes: BTreeMap<String, Vec<AuditRecord>>,
    /// Epoch ms of log creation.
    pub created_at: i64,
    /// Epoch ms of the last append.
    pub updated_at: i64,
}

impl AuditLog {
    /// Creates an empty log stamped at `now`.
    pub fn new(entity_id: EntityId, now: i64) -> Self {
        Self {
            entity_id,
            all_changes: Vec::new(),
            type_changes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Prepends `record` to the full list and its per-action list, then caps
    /// both.
    pub fn prepend(&mut self, record: AuditRecord, limits: AuditLimits, now: i64) {
        let key = type_log_key(record.action_type());
        let typed = self.type_changes.entry(key).or_default();
        typed.insert(0, record.clone());
        typed.truncate(limits.max_type_changes);

        self.all_changes.insert(0, record);
        self.all_changes.truncate(limits.max_changes);
        self.updated_at = now;
    }

    /// Returns the per-action list for `action_type`, newest first.
    pub fn changes_of_type(&self, action_type: &str) -> &[AuditRecord] {
        self.type_changes
            .get(type_log_key(action_type).as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::{
        type_log_key, Actor, AuditChange, AuditLimits, AuditLog, AuditRecord, BatchMove,
    };
    use uuid::Uuid;

    fn reorder(entity_id: Uuid, new_index: usize) -> AuditRecord {
        AuditRecord::new(
            entity_id,
            AuditChange::DragDropReorder {
                item_id: Uuid::new_v4(),
                item_name: "field".to_string(),
                old_index: 0,
                new_index,
            },
            Actor::unknown(),
            new_index as i64,
        )
    }

    #[test]
    fn type_log_key_is_lowercase_with_suffix() {
        assert_eq!(type_log_key("ADD_TO_GROUP"), "add_to_group_records");
    }

    #[test]
    fn prepend_caps_both_lists_independently() {
        let entity_id = Uuid::new_v4();
        let mut log = AuditLog::new(entity_id, 0);
        let limits = AuditLimits {
            max_changes: 3,
            max_type_changes: 2,
        };
        for index in 0..5 {
            log.prepend(reorder(entity_id, index), limits, index as i64);
        }

        assert_eq!(log.all_changes.len(), 3);
        assert_eq!(log.changes_of_type("DRAG_DROP_REORDER").len(), 2);
        assert_eq!(log.all_changes[0].timestamp, 4);
        assert_eq!(log.all_changes[2].timestamp, 2);
        assert_eq!(log.updated_at, 4);
        assert_eq!(log.created_at, 0);
    }

    #[test]
    fn change_serializes_with_action_type_tag() {
        let change = AuditChange::AddToGroup(BatchMove::new(Uuid::nil(), Vec::new()));
        let value = serde_json::to_value(&change).expect("change should serialize");
        assert_eq!(value["action_type"], "ADD_TO_GROUP");
        assert_eq!(value["payload"]["moved_count"], 0);
    }

    #[test]
    fn unknown_actor_is_degenerate_but_valid() {
        let actor = Actor::unknown();
        assert!(actor.is_unknown());
        assert_eq!(actor.user_name, "Unknown User");
    }
}
