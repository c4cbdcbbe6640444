//! Canvas item repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Read every component of a canvas as one flat collection.
//! - Apply batched merge-patches of engine-maintained fields.
//! - Notify subscribers after successful writes.
//!
//! # Invariants
//! - `read_collection` returns every stored row, in display order, with each
//!   displayed sibling group normalized; missing or gapped stored orders are
//!   repaired in memory.
//! - A `write_fields` batch is applied in one transaction: all patches or none.
//! - Stored rows never carry both `fk_table_id` and `fk_group_id`.

use crate::model::canvas_item::{CanvasId, CanvasItem, ComponentType, ItemId, ParentRef};
use crate::order::display::{flatten_display_order, Placement};
use crate::order::index::{normalize_orders, Ordered};
use crate::order::reparent::ItemPatch;
use crate::repo::change_feed::{
    CanvasChange, CanvasChangeEvent, ChangeFeed, ChangeListener, SubscriptionId,
};
use crate::repo::ensure_schema_ready;
use crate::repo::error::{RepoError, RepoResult};
use log::{debug, error};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::HashMap;
use uuid::Uuid;

const CANVAS_ITEM_COLUMNS: &[&str] = &[
    "canvas_id",
    "item_id",
    "name",
    "component_type",
    "sort_order",
    "fk_table_id",
    "fk_group_id",
    "has_label",
    "created_at",
    "updated_at",
];

/// Document-store contract for canvas components.
pub trait CanvasRepository {
    /// Returns every component of `canvas_id` in display row order.
    fn read_collection(&self, canvas_id: CanvasId) -> RepoResult<Vec<CanvasItem>>;
    /// Merge-patches changed fields for several items in one call.
    fn write_fields(&self, canvas_id: CanvasId, patches: &[ItemPatch]) -> RepoResult<()>;
    /// Stores a new component.
    fn insert_item(&self, canvas_id: CanvasId, item: &CanvasItem) -> RepoResult<()>;
    /// Replaces a component's display name.
    fn rename_item(&self, canvas_id: CanvasId, item_id: ItemId, name: &str) -> RepoResult<()>;
    /// Registers a listener fired after each successful write.
    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId;
    /// Removes a listener. Returns `false` when it was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// SQLite-backed canvas repository.
pub struct SqliteCanvasRepository<'conn> {
    conn: &'conn Connection,
    feed: ChangeFeed,
}

impl<'conn> SqliteCanvasRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, "canvas_items", CANVAS_ITEM_COLUMNS)?;
        Ok(Self {
            conn,
            feed: ChangeFeed::new(),
        })
    }
}

impl CanvasRepository for SqliteCanvasRepository<'_> {
    fn read_collection(&self, canvas_id: CanvasId) -> RepoResult<Vec<CanvasItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                item_id,
                name,
                component_type,
                sort_order,
                fk_table_id,
                fk_group_id,
                has_label
             FROM canvas_items
             WHERE canvas_id = ?1
             ORDER BY sort_order IS NULL, sort_order ASC, created_at ASC, item_id ASC;",
        )?;
        let mut rows = stmt.query([canvas_id.to_string()])?;

        let mut stored = Vec::new();
        while let Some(row) = rows.next()? {
            stored.push(parse_canvas_item_row(row)?);
        }

        // Orphans and invalid nestings repair together with the roots they
        // are displayed with.
        let containers: Vec<Option<ItemId>> = {
            let placement = Placement::new(stored.iter().map(|row| &row.item));
            stored
                .iter()
                .map(|row| placement.container_of(&row.item))
                .collect()
        };
        let mut groups: HashMap<Option<ItemId>, Vec<StoredItem>> = HashMap::new();
        for (container_id, row) in containers.into_iter().zip(stored) {
            groups.entry(container_id).or_default().push(row);
        }

        let mut items = Vec::new();
        for group in groups.into_values() {
            items.extend(
                normalize_orders(group)
                    .into_values()
                    .map(|stored| stored.item),
            );
        }
        debug!(
            "event=canvas_read module=repo status=ok canvas_id={canvas_id} items={}",
            items.len()
        );
        Ok(flatten_display_order(&items))
    }

    fn write_fields(&self, canvas_id: CanvasId, patches: &[ItemPatch]) -> RepoResult<()> {
        let patches: Vec<&ItemPatch> = patches.iter().filter(|patch| !patch.is_empty()).collect();
        if patches.is_empty() {
            return Ok(());
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for patch in &patches {
            if let Err(err) = apply_patch(&tx, canvas_id, patch) {
                error!(
                    "event=canvas_write module=repo status=error canvas_id={canvas_id} item_id={} error={err}",
                    patch.item_id
                );
                return Err(err);
            }
        }
        tx.commit()?;

        debug!(
            "event=canvas_write module=repo status=ok canvas_id={canvas_id} patched={}",
            patches.len()
        );
        self.feed.notify(&CanvasChangeEvent {
            canvas_id,
            change: CanvasChange::FieldsPatched(patches.iter().map(|patch| patch.item_id).collect()),
        });
        Ok(())
    }

    fn insert_item(&self, canvas_id: CanvasId, item: &CanvasItem) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO canvas_items (
                canvas_id,
                item_id,
                name,
                component_type,
                sort_order,
                fk_table_id,
                fk_group_id,
                has_label
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                canvas_id.to_string(),
                item.item_id.to_string(),
                item.name.as_str(),
                item.component_type.as_str(),
                item.order,
                item.fk_table_id().map(|id| id.to_string()),
                item.fk_group_id().map(|id| id.to_string()),
                bool_to_int(item.has_label),
            ],
        )?;

        self.feed.notify(&CanvasChangeEvent {
            canvas_id,
            change: CanvasChange::ItemInserted(item.item_id),
        });
        Ok(())
    }

    fn rename_item(&self, canvas_id: CanvasId, item_id: ItemId, name: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE canvas_items
             SET name = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE canvas_id = ?1
               AND item_id = ?2;",
            params![canvas_id.to_string(), item_id.to_string(), name],
        )?;
        if changed == 0 {
            return Err(RepoError::ItemNotFound { canvas_id, item_id });
        }

        self.feed.notify(&CanvasChangeEvent {
            canvas_id,
            change: CanvasChange::ItemRenamed(item_id),
        });
        Ok(())
    }

    fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        self.feed.subscribe(listener)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.feed.unsubscribe(id)
    }
}

/// Row as stored, before order repair.
struct StoredItem {
    item: CanvasItem,
    sort_order: Option<i64>,
}

impl Ordered for StoredItem {
    fn order_id(&self) -> ItemId {
        self.item.item_id
    }

    fn declared_order(&self) -> Option<i64> {
        self.sort_order
    }

    fn assign_order(&mut self, order: i64) {
        self.sort_order = Some(order);
        self.item.order = order;
    }
}

fn apply_patch(tx: &Transaction<'_>, canvas_id: CanvasId, patch: &ItemPatch) -> RepoResult<()> {
    let mut assignments = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(order) = patch.order {
        assignments.push("sort_order = ?");
        values.push(Value::Integer(order));
    }
    if let Some(parent) = patch.parent {
        let (table_id, group_id) = match parent {
            Some(ParentRef::Table(id)) => (Some(id), None),
            Some(ParentRef::Group(id)) => (None, Some(id)),
            None => (None, None),
        };
        assignments.push("fk_table_id = ?");
        values.push(optional_uuid_value(table_id));
        assignments.push("fk_group_id = ?");
        values.push(optional_uuid_value(group_id));
    }
    if let Some(has_label) = patch.has_label {
        assignments.push("has_label = ?");
        values.push(Value::Integer(bool_to_int(has_label)));
    }

    let sql = format!(
        "UPDATE canvas_items
         SET {},
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE canvas_id = ?
           AND item_id = ?;",
        assignments.join(", ")
    );
    values.push(Value::Text(canvas_id.to_string()));
    values.push(Value::Text(patch.item_id.to_string()));

    let changed = tx.execute(&sql, params_from_iter(values))?;
    if changed == 0 {
        return Err(RepoError::ItemNotFound {
            canvas_id,
            item_id: patch.item_id,
        });
    }
    Ok(())
}

fn parse_canvas_item_row(row: &Row<'_>) -> RepoResult<StoredItem> {
    let item_id_text: String = row.get("item_id")?;
    let item_id = parse_uuid(&item_id_text, "canvas_items.item_id")?;

    let fk_table_id = row
        .get::<_, Option<String>>("fk_table_id")?
        .map(|value| parse_uuid(&value, "canvas_items.fk_table_id"))
        .transpose()?;
    let fk_group_id = row
        .get::<_, Option<String>>("fk_group_id")?
        .map(|value| parse_uuid(&value, "canvas_items.fk_group_id"))
        .transpose()?;
    let parent = ParentRef::from_pointers(fk_table_id, fk_group_id).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "item {item_id} has both fk_table_id and fk_group_id set"
        ))
    })?;

    let has_label = match row.get::<_, i64>("has_label")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid has_label value `{other}` in canvas_items.has_label"
            )));
        }
    };

    let component_type: String = row.get("component_type")?;
    let sort_order: Option<i64> = row.get("sort_order")?;
    let item = CanvasItem {
        item_id,
        name: row.get("name")?,
        component_type: ComponentType::parse(&component_type),
        order: sort_order.unwrap_or_default(),
        parent,
        has_label,
    };
    Ok(StoredItem { item, sort_order })
}

fn optional_uuid_value(value: Option<Uuid>) -> Value {
    value.map_or(Value::Null, |id| Value::Text(id.to_string()))
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
