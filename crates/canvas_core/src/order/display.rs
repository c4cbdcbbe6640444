//! Display numbering derived from order and container membership.
//!
//! # Responsibility
//! - Build children-by-parent lookups on demand.
//! - Lay out top-level items as contiguous numbered blocks.
//! - Produce the visual row list that drag indices refer to.
//!
//! # Invariants
//! - Output depends only on `order` and parent pointers; nothing is persisted.
//! - A top-level block spans the container plus all its children; the next
//!   block starts right after it.
//! - A parent pointer only nests an item when it names another, non-container
//!   item's matching table or group on the same canvas. Every other item,
//!   including orphans, containers with a parent and self-pointers, is
//!   top-level. No row is ever dropped.

use crate::model::canvas_item::{CanvasItem, ItemId, ParentRef};
use std::collections::HashMap;

/// Resolves the container each item is rendered under.
#[derive(Debug)]
pub struct Placement<'a> {
    by_id: HashMap<ItemId, &'a CanvasItem>,
}

impl<'a> Placement<'a> {
    pub fn new(items: impl IntoIterator<Item = &'a CanvasItem>) -> Self {
        Self {
            by_id: items.into_iter().map(|item| (item.item_id, item)).collect(),
        }
    }

    /// Container id `item` nests under, or `None` when it is top-level.
    pub fn container_of(&self, item: &CanvasItem) -> Option<ItemId> {
        let parent = item.parent?;
        if item.is_container() || parent.id() == item.item_id {
            return None;
        }
        let container = self.by_id.get(&parent.id())?;
        (ParentRef::for_container(container) == Some(parent)).then_some(parent.id())
    }
}

/// Children-by-parent lookup over a flat item slice.
#[derive(Debug)]
pub struct ChildIndex<'a> {
    roots: Vec<&'a CanvasItem>,
    children: HashMap<ItemId, Vec<&'a CanvasItem>>,
}

impl<'a> ChildIndex<'a> {
    /// Groups `items` by parent, each group sorted by `order` then input
    /// sequence.
    pub fn build(items: &'a [CanvasItem]) -> Self {
        let placement = Placement::new(items);
        let mut roots = Vec::new();
        let mut children: HashMap<ItemId, Vec<&'a CanvasItem>> = HashMap::new();

        for item in items {
            match placement.container_of(item) {
                Some(container_id) => children.entry(container_id).or_default().push(item),
                None => roots.push(item),
            }
        }

        // Stable sort keeps input sequence for equal orders.
        roots.sort_by_key(|item| item.order);
        for group in children.values_mut() {
            group.sort_by_key(|item| item.order);
        }

        Self { roots, children }
    }

    /// Top-level items in display sequence.
    pub fn roots(&self) -> &[&'a CanvasItem] {
        &self.roots
    }

    /// Direct children of `parent_id` in display sequence.
    pub fn children_of(&self, parent_id: ItemId) -> &[&'a CanvasItem] {
        self.children
            .get(&parent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// One numbered top-level block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayBlock {
    pub item_id: ItemId,
    /// 1-based number shown next to the top-level item.
    pub display_index: usize,
    /// Rows occupied by the block: the item plus its children.
    pub span: usize,
    /// Children rendered nested under the item, in order.
    pub children: Vec<ItemId>,
}

/// Numbers every top-level item; children occupy the rows right after their
/// parent.
pub fn project_display(items: &[CanvasItem]) -> Vec<DisplayBlock> {
    let index = ChildIndex::build(items);
    let mut next_index = 1;
    let mut blocks = Vec::with_capacity(index.roots().len());

    for root in index.roots() {
        let children: Vec<ItemId> = index
            .children_of(root.item_id)
            .iter()
            .map(|child| child.item_id)
            .collect();
        let span = 1 + children.len();
        blocks.push(DisplayBlock {
            item_id: root.item_id,
            display_index: next_index,
            span,
            children,
        });
        next_index += span;
    }
    blocks
}

/// Returns the visual row list: each top-level item followed by its
/// children.
pub fn flatten_display_order(items: &[CanvasItem]) -> Vec<CanvasItem> {
    let index = ChildIndex::build(items);
    let mut rows = Vec::with_capacity(items.len());
    for root in index.roots() {
        rows.push((*root).clone());
        rows.extend(
            index
                .children_of(root.item_id)
                .iter()
                .map(|child| (*child).clone()),
        );
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::{flatten_display_order, project_display};
    use crate::model::canvas_item::{CanvasItem, ComponentType, ParentRef};

    fn child_of(container: &CanvasItem, name: &str, order: i64) -> CanvasItem {
        let mut item = CanvasItem::new(name, ComponentType::Text, order);
        item.set_parent(ParentRef::for_container(container));
        item
    }

    #[test]
    fn blocks_number_containers_with_their_children() {
        let first = CanvasItem::new("first", ComponentType::Input, 0);
        let table = CanvasItem::new("table", ComponentType::Table, 1);
        let last = CanvasItem::new("last", ComponentType::Button, 2);
        let col_b = child_of(&table, "b", 1);
        let col_a = child_of(&table, "a", 0);

        let items = vec![
            last.clone(),
            col_b.clone(),
            table.clone(),
            first.clone(),
            col_a.clone(),
        ];
        let blocks = project_display(&items);

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].item_id, first.item_id);
        assert_eq!(blocks[0].display_index, 1);
        assert_eq!(blocks[1].item_id, table.item_id);
        assert_eq!(blocks[1].display_index, 2);
        assert_eq!(blocks[1].span, 3);
        assert_eq!(blocks[1].children, vec![col_a.item_id, col_b.item_id]);
        assert_eq!(blocks[2].display_index, 5);
    }

    #[test]
    fn orphans_are_projected_as_top_level() {
        let ghost_table = CanvasItem::new("gone", ComponentType::Table, 0);
        let orphan = child_of(&ghost_table, "orphan", 0);
        let blocks = project_display(&[orphan.clone()]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].item_id, orphan.item_id);
    }

    #[test]
    fn invalid_nesting_is_shown_top_level_without_losing_rows() {
        let group = CanvasItem::new("group", ComponentType::Group, 0);
        let mut table = CanvasItem::new("table", ComponentType::Table, 1);
        table.set_parent(ParentRef::for_container(&group));
        let column = child_of(&table, "column", 0);
        let mut looped = CanvasItem::new("looped", ComponentType::Text, 2);
        looped.set_parent(Some(ParentRef::Table(looped.item_id)));
        let mut mislabeled = CanvasItem::new("mislabeled", ComponentType::Text, 3);
        mislabeled.set_parent(Some(ParentRef::Table(group.item_id)));

        let items = vec![
            group.clone(),
            table.clone(),
            column.clone(),
            looped.clone(),
            mislabeled.clone(),
        ];
        let rows = flatten_display_order(&items);
        assert_eq!(rows.len(), items.len());

        let blocks = project_display(&items);
        let tops: Vec<_> = blocks.iter().map(|block| block.item_id).collect();
        assert_eq!(
            tops,
            vec![group.item_id, table.item_id, looped.item_id, mislabeled.item_id]
        );
        assert_eq!(blocks[1].children, vec![column.item_id]);
        assert_eq!(blocks.iter().map(|block| block.span).sum::<usize>(), 5);
    }

    #[test]
    fn flatten_places_children_after_container() {
        let group = CanvasItem::new("group", ComponentType::Group, 0);
        let tail = CanvasItem::new("tail", ComponentType::Text, 1);
        let inner = child_of(&group, "inner", 0);

        let rows = flatten_display_order(&[tail.clone(), inner.clone(), group.clone()]);
        let ids: Vec<_> = rows.iter().map(|row| row.item_id).collect();
        assert_eq!(ids, vec![group.item_id, inner.item_id, tail.item_id]);
    }
}
