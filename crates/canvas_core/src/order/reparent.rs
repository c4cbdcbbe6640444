//! Drag reordering and batch reparenting over a flat item list.
//!
//! # Responsibility
//! - Compute new container membership for dragged or selected items.
//! - Recompute sibling orders for the whole canvas after each change.
//! - Describe the result as field patches plus one audit change.
//!
//! # Invariants
//! - Functions are pure: they take the list by value and never touch storage.
//! - After every operation each sibling group is numbered `0..n` without gaps.
//! - Containers stay at root level; they are never given a parent.
//! - `has_label` is re-derived whenever membership changes.

use crate::model::audit::{AuditChange, BatchMove, ParentMove};
use crate::model::canvas_item::{CanvasItem, ComponentType, ItemId, ParentRef};
use crate::order::display::{flatten_display_order, Placement};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Rejected engine input. Nothing has been written when one of these occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReparentError {
    /// Drag position outside the current row list.
    IndexOutOfRange { index: usize, len: usize },
    /// Batch operation invoked with nothing selected.
    EmptySelection,
    /// Selected id is not part of the canvas.
    UnknownItem(ItemId),
    /// Target container id is not part of the canvas.
    TargetNotFound(ItemId),
    /// Target exists but is neither a table nor a group.
    TargetNotContainer(ItemId),
    /// Selection contains a container, which cannot be nested.
    ContainerNotMovable(ItemId),
    /// Selected item is not a member of the container it is removed from.
    NotInContainer { item_id: ItemId, container_id: ItemId },
    /// Every selected item is already inside the target container.
    NothingToMove(ItemId),
}

impl Display for ReparentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexOutOfRange { index, len } => {
                write!(f, "row index {index} is out of range for {len} rows")
            }
            Self::EmptySelection => write!(f, "selection is empty"),
            Self::UnknownItem(id) => write!(f, "selected item not found: {id}"),
            Self::TargetNotFound(id) => write!(f, "target container not found: {id}"),
            Self::TargetNotContainer(id) => {
                write!(f, "target is not a table or group: {id}")
            }
            Self::ContainerNotMovable(id) => {
                write!(f, "containers cannot be moved into containers: {id}")
            }
            Self::NotInContainer {
                item_id,
                container_id,
            } => write!(f, "item {item_id} is not inside container {container_id}"),
            Self::NothingToMove(id) => {
                write!(f, "selected items are already inside container {id}")
            }
        }
    }
}

impl Error for ReparentError {}

/// Merge-patch of the fields the engine maintains on one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPatch {
    pub item_id: ItemId,
    pub order: Option<i64>,
    /// `Some(None)` detaches the item to root level.
    pub parent: Option<Option<ParentRef>>,
    pub has_label: Option<bool>,
}

impl ItemPatch {
    /// Returns the changed fields between two versions of the same item.
    pub fn between(before: &CanvasItem, after: &CanvasItem) -> Option<Self> {
        let patch = Self {
            item_id: after.item_id,
            order: (before.order != after.order).then_some(after.order),
            parent: (before.parent != after.parent).then_some(after.parent),
            has_label: (before.has_label != after.has_label).then_some(after.has_label),
        };
        if patch.is_empty() {
            None
        } else {
            Some(patch)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_none() && self.parent.is_none() && self.has_label.is_none()
    }

    /// Applies the patch onto `item`.
    pub fn apply(&self, item: &mut CanvasItem) {
        if let Some(order) = self.order {
            item.order = order;
        }
        if let Some(parent) = self.parent {
            item.parent = parent;
        }
        if let Some(has_label) = self.has_label {
            item.has_label = has_label;
        }
    }
}

/// Result of one engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReparentOutcome {
    /// Full item list in visual row order.
    pub items: Vec<CanvasItem>,
    /// Only items whose maintained fields changed.
    pub patches: Vec<ItemPatch>,
    pub change: AuditChange,
}

/// Moves the row at `drag_index` to `hover_index`, adopting the membership
/// implied by the hover row.
///
/// Returns `Ok(None)` when both indices are equal.
pub fn move_row(
    items: Vec<CanvasItem>,
    drag_index: usize,
    hover_index: usize,
) -> Result<Option<ReparentOutcome>, ReparentError> {
    let len = items.len();
    for index in [drag_index, hover_index] {
        if index >= len {
            return Err(ReparentError::IndexOutOfRange { index, len });
        }
    }
    if drag_index == hover_index {
        return Ok(None);
    }

    let before = items.clone();
    let mut rows = items;
    let hover_parent = Placement::new(rows.iter())
        .container_of(&rows[hover_index])
        .and(rows[hover_index].parent);
    let new_parent = drop_target_parent(&rows[drag_index], &rows[hover_index], hover_parent);

    let mut dragged = rows.remove(drag_index);
    dragged.set_parent(new_parent);
    let change = AuditChange::DragDropReorder {
        item_id: dragged.item_id,
        item_name: dragged.name.clone(),
        old_index: drag_index,
        new_index: hover_index,
    };
    rows.insert(hover_index, dragged);

    recompute_orders(&mut rows);
    Ok(Some(finish(&before, rows, change)))
}

/// Points every selected item at `target_id`.
///
/// Moved items join the end of the target's existing children, in row
/// order. Selected items already inside the target stay where they are and
/// are not reported as moves.
pub fn multi_move(
    items: Vec<CanvasItem>,
    target_id: ItemId,
    selection: &[ItemId],
) -> Result<ReparentOutcome, ReparentError> {
    let target_parent = validate_batch(&items, target_id, selection)?;
    let members: HashSet<ItemId> = items
        .iter()
        .filter(|item| item.parent == Some(target_parent))
        .map(|item| item.item_id)
        .collect();
    let selected: HashSet<ItemId> = selection
        .iter()
        .copied()
        .filter(|id| !members.contains(id))
        .collect();
    if selected.is_empty() {
        return Err(ReparentError::NothingToMove(target_id));
    }

    let before = items.clone();
    let (mut moved, mut rows): (Vec<CanvasItem>, Vec<CanvasItem>) = items
        .into_iter()
        .partition(|item| selected.contains(&item.item_id));

    let moves = reassign(&mut moved, Some(target_parent));
    rows.extend(moved);
    recompute_orders(&mut rows);

    let batch = BatchMove::new(target_id, moves);
    let change = match target_parent {
        ParentRef::Table(_) => AuditChange::AddToTable(batch),
        ParentRef::Group(_) => AuditChange::AddToGroup(batch),
    };
    Ok(finish(&before, rows, change))
}

/// Detaches every selected item to root level, right after `container_id`.
pub fn multi_remove(
    items: Vec<CanvasItem>,
    container_id: ItemId,
    selection: &[ItemId],
) -> Result<ReparentOutcome, ReparentError> {
    let container_parent = validate_batch(&items, container_id, selection)?;
    let selected: HashSet<ItemId> = selection.iter().copied().collect();
    if let Some(stray) = items
        .iter()
        .find(|item| selected.contains(&item.item_id) && item.parent != Some(container_parent))
    {
        return Err(ReparentError::NotInContainer {
            item_id: stray.item_id,
            container_id,
        });
    }

    let before = items.clone();
    let (mut detached, mut rows): (Vec<CanvasItem>, Vec<CanvasItem>) = items
        .into_iter()
        .partition(|item| selected.contains(&item.item_id));

    let moves = reassign(&mut detached, None);
    let insert_at = rows
        .iter()
        .position(|item| item.item_id == container_id)
        .map_or(rows.len(), |position| position + 1);
    rows.splice(insert_at..insert_at, detached);
    recompute_orders(&mut rows);

    let batch = BatchMove::new(container_id, moves);
    let change = match container_parent {
        ParentRef::Table(_) => AuditChange::RemoveFromTable(batch),
        ParentRef::Group(_) => AuditChange::RemoveFromGroup(batch),
    };
    Ok(finish(&before, rows, change))
}

/// Renumbers the whole list in row order.
///
/// Top-level items, as `Placement` resolves them, receive `0, 1, 2, …`;
/// right after each one its children receive `0, 1, 2, …` within their own
/// group.
pub fn recompute_orders(items: &mut [CanvasItem]) {
    let mut roots = Vec::new();
    let mut children: HashMap<ItemId, Vec<usize>> = HashMap::new();
    {
        let placement = Placement::new(items.iter());
        for (position, item) in items.iter().enumerate() {
            match placement.container_of(item) {
                Some(container_id) => children.entry(container_id).or_default().push(position),
                None => roots.push(position),
            }
        }
    }

    for (root_order, position) in roots.into_iter().enumerate() {
        items[position].order = root_order as i64;
        if let Some(group) = children.remove(&items[position].item_id) {
            number_group(items, &group);
        }
    }
}

/// Next free order at the end of the sibling group under `parent`.
pub fn next_sibling_order(items: &[CanvasItem], parent: Option<ParentRef>) -> i64 {
    let placement = Placement::new(items);
    let container_id = parent.map(ParentRef::id);
    items
        .iter()
        .filter(|item| placement.container_of(item) == container_id)
        .map(|item| item.order + 1)
        .max()
        .unwrap_or(0)
}

fn number_group(items: &mut [CanvasItem], positions: &[usize]) {
    for (order, position) in positions.iter().enumerate() {
        items[*position].order = order as i64;
    }
}

/// `hover_parent` is the hover row's membership as rendered, so a leaf
/// dropped next to an orphan lands at root.
fn drop_target_parent(
    dragged: &CanvasItem,
    hover: &CanvasItem,
    hover_parent: Option<ParentRef>,
) -> Option<ParentRef> {
    if dragged.is_container() {
        return None;
    }
    match hover.component_type {
        ComponentType::Table | ComponentType::Group => ParentRef::for_container(hover),
        _ => hover_parent,
    }
}

fn validate_batch(
    items: &[CanvasItem],
    target_id: ItemId,
    selection: &[ItemId],
) -> Result<ParentRef, ReparentError> {
    if selection.is_empty() {
        return Err(ReparentError::EmptySelection);
    }

    let by_id: HashMap<ItemId, &CanvasItem> =
        items.iter().map(|item| (item.item_id, item)).collect();
    let target = by_id
        .get(&target_id)
        .ok_or(ReparentError::TargetNotFound(target_id))?;
    let target_parent =
        ParentRef::for_container(target).ok_or(ReparentError::TargetNotContainer(target_id))?;

    for id in selection {
        let item = by_id.get(id).ok_or(ReparentError::UnknownItem(*id))?;
        if item.is_container() {
            return Err(ReparentError::ContainerNotMovable(*id));
        }
    }
    Ok(target_parent)
}

fn reassign(items: &mut [CanvasItem], parent: Option<ParentRef>) -> Vec<ParentMove> {
    items
        .iter_mut()
        .map(|item| {
            let old_parent = item.parent;
            item.set_parent(parent);
            ParentMove {
                item_id: item.item_id,
                item_name: item.name.clone(),
                old_parent,
                new_parent: parent,
            }
        })
        .collect()
}

fn finish(before: &[CanvasItem], rows: Vec<CanvasItem>, change: AuditChange) -> ReparentOutcome {
    let previous: HashMap<ItemId, &CanvasItem> =
        before.iter().map(|item| (item.item_id, item)).collect();
    let items = flatten_display_order(&rows);
    let patches = items
        .iter()
        .filter_map(|after| {
            previous
                .get(&after.item_id)
                .and_then(|prior| ItemPatch::between(prior, after))
        })
        .collect();

    ReparentOutcome {
        items,
        patches,
        change,
    }
}
