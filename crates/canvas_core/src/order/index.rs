//! Sibling order normalization.
//!
//! # Invariants
//! - Output orders are contiguous, start at the smallest declared order and
//!   contain no duplicates.
//! - Items without a declared order sort after every ordered item and keep
//!   their relative input sequence.
//! - `normalize_orders` is idempotent on its own output.

use crate::model::canvas_item::{CanvasItem, ItemId};
use std::collections::HashMap;

/// Anything that carries a sibling-relative order key.
pub trait Ordered {
    fn order_id(&self) -> ItemId;
    /// `None` when the stored order is missing.
    fn declared_order(&self) -> Option<i64>;
    fn assign_order(&mut self, order: i64);
}

impl Ordered for CanvasItem {
    fn order_id(&self) -> ItemId {
        self.item_id
    }

    fn declared_order(&self) -> Option<i64> {
        Some(self.order)
    }

    fn assign_order(&mut self, order: i64) {
        self.order = order;
    }
}

/// Renumbers one sibling group so its orders form a gap-free range.
///
/// Duplicate ids keep the last occurrence, at the position of that last
/// occurrence.
pub fn normalize_orders<T: Ordered>(items: impl IntoIterator<Item = T>) -> HashMap<ItemId, T> {
    let mut latest: HashMap<ItemId, (usize, T)> = HashMap::new();
    for (position, item) in items.into_iter().enumerate() {
        latest.insert(item.order_id(), (position, item));
    }

    let mut sorted: Vec<(usize, T)> = latest.into_values().collect();
    sorted.sort_by_key(|(position, item)| {
        (
            item.declared_order().is_none(),
            item.declared_order().unwrap_or_default(),
            *position,
        )
    });

    let start = sorted
        .iter()
        .filter_map(|(_, item)| item.declared_order())
        .min()
        .unwrap_or(0)
        .max(0);

    let mut result = HashMap::with_capacity(sorted.len());
    let mut last_assigned: Option<i64> = None;
    for (_, mut item) in sorted {
        let next = last_assigned.map_or(start, |last| last + 1);
        if item.declared_order() != Some(next) {
            item.assign_order(next);
        }
        last_assigned = Some(next);
        result.insert(item.order_id(), item);
    }
    result
}

/// Flattens a normalized mapping back into order sequence.
pub fn sort_by_order<T: Ordered>(items: HashMap<ItemId, T>) -> Vec<T> {
    let mut sorted: Vec<T> = items.into_values().collect();
    sorted.sort_by_key(|item| {
        (
            item.declared_order().is_none(),
            item.declared_order().unwrap_or_default(),
            item.order_id(),
        )
    });
    sorted
}

#[cfg(test)]
mod tests {
    use super::{normalize_orders, sort_by_order, Ordered};
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Slot {
        id: Uuid,
        order: Option<i64>,
    }

    impl Ordered for Slot {
        fn order_id(&self) -> Uuid {
            self.id
        }

        fn declared_order(&self) -> Option<i64> {
            self.order
        }

        fn assign_order(&mut self, order: i64) {
            self.order = Some(order);
        }
    }

    fn slot(order: Option<i64>) -> Slot {
        Slot {
            id: Uuid::new_v4(),
            order,
        }
    }

    fn orders_in_sequence(slots: &[Slot]) -> Vec<(Uuid, i64)> {
        let map = normalize_orders(slots.to_vec());
        sort_by_order(map)
            .into_iter()
            .map(|slot| (slot.id, slot.order.expect("normalized order")))
            .collect()
    }

    #[test]
    fn empty_input_yields_empty_map() {
        assert!(normalize_orders(Vec::<Slot>::new()).is_empty());
    }

    #[test]
    fn gaps_and_ties_close_from_original_minimum() {
        let a = slot(Some(3));
        let b = slot(Some(7));
        let c = slot(Some(7));
        let d = slot(Some(12));
        let result = orders_in_sequence(&[b.clone(), a.clone(), c.clone(), d.clone()]);
        assert_eq!(
            result,
            vec![(a.id, 3), (b.id, 4), (c.id, 5), (d.id, 6)]
        );
    }

    #[test]
    fn missing_orders_go_last_in_input_sequence() {
        let first_missing = slot(None);
        let ordered = slot(Some(0));
        let second_missing = slot(None);
        let result = orders_in_sequence(&[
            first_missing.clone(),
            ordered.clone(),
            second_missing.clone(),
        ]);
        assert_eq!(
            result,
            vec![(ordered.id, 0), (first_missing.id, 1), (second_missing.id, 2)]
        );
    }

    #[test]
    fn all_missing_orders_start_at_zero() {
        let a = slot(None);
        let b = slot(None);
        let result = orders_in_sequence(&[a.clone(), b.clone()]);
        assert_eq!(result, vec![(a.id, 0), (b.id, 1)]);
    }

    #[test]
    fn duplicate_ids_keep_last_occurrence() {
        let id = Uuid::new_v4();
        let other = slot(Some(1));
        let result = normalize_orders(vec![
            Slot { id, order: Some(0) },
            other.clone(),
            Slot { id, order: Some(5) },
        ]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[&other.id].order, Some(1));
        assert_eq!(result[&id].order, Some(2));
    }

    #[test]
    fn normalize_is_idempotent() {
        let slots = vec![slot(Some(4)), slot(None), slot(Some(4)), slot(Some(9))];
        let once = normalize_orders(slots);
        let twice = normalize_orders(sort_by_order(once.clone()));
        assert_eq!(once, twice);
    }
}
