//! In-process change subscription for canvas writes.
//!
//! # Invariants
//! - Listeners fire only after a write succeeded.
//! - Listeners run in subscription order.
//! - A listener may subscribe or unsubscribe while being notified; the change
//!   takes effect from the next event.

use crate::model::canvas_item::{CanvasId, ItemId};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Handle returned by `subscribe`.
pub type SubscriptionId = u64;

/// Callback invoked after a successful canvas write.
pub type ChangeListener = Box<dyn Fn(&CanvasChangeEvent)>;

/// What a successful write changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasChange {
    /// Maintained fields were patched on these items.
    FieldsPatched(Vec<ItemId>),
    ItemInserted(ItemId),
    ItemRenamed(ItemId),
}

/// Notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasChangeEvent {
    pub canvas_id: CanvasId,
    pub change: CanvasChange,
}

/// Ordered listener registry.
#[derive(Default)]
pub struct ChangeFeed {
    listeners: RefCell<BTreeMap<SubscriptionId, Rc<dyn Fn(&CanvasChangeEvent)>>>,
    next_id: Cell<SubscriptionId>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: ChangeListener) -> SubscriptionId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().insert(id, Rc::from(listener));
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.borrow_mut().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    pub fn notify(&self, event: &CanvasChangeEvent) {
        let snapshot: Vec<_> = self.listeners.borrow().values().cloned().collect();
        for listener in snapshot {
            listener(event);
        }
    }
}
