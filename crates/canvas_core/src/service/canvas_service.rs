//! Canvas editing session.
//!
//! # Responsibility
//! - Own the single mutable item list and multi-selection for the open canvas.
//! - Run engine operations, persist their patches, then record the audit change.
//!
//! # Invariants
//! - Missing context and invalid selections are rejected before any write.
//! - Item writes and audit appends are separate writes; an item write may
//!   persist while its audit append fails. Failed appends are logged and
//!   surface as `ChangeOutcome::audit_record == None`.
//! - A failed item write leaves the attempted local state in place until the
//!   next `refresh`.

use crate::model::audit::{AuditChange, AuditRecord};
use crate::model::canvas_item::{CanvasId, CanvasItem, ComponentType, ItemId, ParentRef};
use crate::order::display::{flatten_display_order, project_display, DisplayBlock};
use crate::order::reparent::{self, next_sibling_order, ReparentError, ReparentOutcome};
use crate::repo::audit_repo::AuditLogRepository;
use crate::repo::canvas_repo::CanvasRepository;
use crate::repo::error::RepoError;
use crate::service::actor::ActorProvider;
use crate::service::audit_service::AuditService;
use log::{error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from canvas session operations.
#[derive(Debug)]
pub enum CanvasServiceError {
    /// No canvas is open.
    MissingContext,
    /// Engine rejected the selection or drag positions.
    InvalidSelection(ReparentError),
    /// Component name is blank after trim.
    InvalidName,
    /// Item is not part of the open canvas.
    ItemNotFound(ItemId),
    /// Store rejected a read or write.
    Persistence(RepoError),
}

impl Display for CanvasServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingContext => write!(f, "no canvas is open"),
            Self::InvalidSelection(err) => write!(f, "invalid selection: {err}"),
            Self::InvalidName => write!(f, "component name must not be blank"),
            Self::ItemNotFound(id) => write!(f, "canvas item not found: {id}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CanvasServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSelection(err) => Some(err),
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReparentError> for CanvasServiceError {
    fn from(value: ReparentError) -> Self {
        Self::InvalidSelection(value)
    }
}

impl From<RepoError> for CanvasServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ItemNotFound { item_id, .. } => Self::ItemNotFound(item_id),
            other => Self::Persistence(other),
        }
    }
}

pub type CanvasServiceResult<T> = Result<T, CanvasServiceError>;

/// Ordered, duplicate-free multi-selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<ItemId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id`; returns `false` when it was already selected.
    pub fn insert(&mut self, id: ItemId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Flips membership of `id`; returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: ItemId) -> bool {
        if let Some(position) = self.ids.iter().position(|current| *current == id) {
            self.ids.remove(position);
            false
        } else {
            self.ids.push(id);
            true
        }
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn as_slice(&self) -> &[ItemId] {
        &self.ids
    }
}

/// Request to add one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCanvasItem {
    pub name: String,
    pub component_type: ComponentType,
    /// Table or group to place the component in; `None` for root level.
    pub container: Option<ItemId>,
}

/// What a successful mutation wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeOutcome {
    /// Items whose stored fields were written.
    pub item_ids: Vec<ItemId>,
    /// `None` when the audit append failed after the item write.
    pub audit_record: Option<AuditRecord>,
}

struct ActiveCanvas {
    canvas_id: CanvasId,
    items: Vec<CanvasItem>,
}

/// Editing session over one open canvas.
pub struct CanvasService<C, L, P>
where
    C: CanvasRepository,
    L: AuditLogRepository,
    P: ActorProvider,
{
    canvas_repo: C,
    audit: AuditService<L>,
    actor: P,
    active: Option<ActiveCanvas>,
    selection: Selection,
}

impl<C, L, P> CanvasService<C, L, P>
where
    C: CanvasRepository,
    L: AuditLogRepository,
    P: ActorProvider,
{
    pub fn new(canvas_repo: C, audit: AuditService<L>, actor: P) -> Self {
        Self {
            canvas_repo,
            audit,
            actor,
            active: None,
            selection: Selection::new(),
        }
    }

    pub fn canvas_repo(&self) -> &C {
        &self.canvas_repo
    }

    pub fn audit(&self) -> &AuditService<L> {
        &self.audit
    }

    /// Loads `canvas_id` and makes it the active context.
    pub fn open_canvas(&mut self, canvas_id: CanvasId) -> CanvasServiceResult<&[CanvasItem]> {
        let items = self.canvas_repo.read_collection(canvas_id).map_err(|err| {
            error!(
                "event=canvas_open module=canvas_service status=error canvas_id={canvas_id} error={err}"
            );
            CanvasServiceError::from(err)
        })?;
        info!(
            "event=canvas_open module=canvas_service status=ok canvas_id={canvas_id} items={}",
            items.len()
        );

        self.selection.clear();
        let active = self.active.insert(ActiveCanvas { canvas_id, items });
        Ok(&active.items)
    }

    pub fn close_canvas(&mut self) {
        self.active = None;
        self.selection.clear();
    }

    pub fn canvas_id(&self) -> Option<CanvasId> {
        self.active.as_ref().map(|active| active.canvas_id)
    }

    /// Items of the open canvas in display row order; empty when closed.
    pub fn items(&self) -> &[CanvasItem] {
        self.active
            .as_ref()
            .map(|active| active.items.as_slice())
            .unwrap_or(&[])
    }

    /// Numbered top-level blocks of the open canvas.
    pub fn display(&self) -> Vec<DisplayBlock> {
        project_display(self.items())
    }

    /// Replaces local state with the stored snapshot.
    pub fn refresh(&mut self) -> CanvasServiceResult<()> {
        let canvas_id = self.require_canvas("refresh")?;
        let items = self.canvas_repo.read_collection(canvas_id)?;
        if let Some(active) = self.active.as_mut() {
            active.items = items;
        }
        Ok(())
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn toggle_selection(&mut self, item_id: ItemId) -> bool {
        self.selection.toggle(item_id)
    }

    pub fn select(&mut self, item_id: ItemId) -> bool {
        self.selection.insert(item_id)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Drags the row at `drag_index` onto `hover_index`.
    ///
    /// Returns `Ok(None)` when the indices are equal.
    pub fn move_row(
        &mut self,
        drag_index: usize,
        hover_index: usize,
    ) -> CanvasServiceResult<Option<ChangeOutcome>> {
        let canvas_id = self.require_canvas("move_row")?;
        let items = self.items().to_vec();
        let outcome = match reparent::move_row(items, drag_index, hover_index) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return Ok(None),
            Err(err) => return Err(self.reject("move_row", canvas_id, err)),
        };
        self.commit("move_row", canvas_id, outcome).map(Some)
    }

    /// Moves the current selection into the table or group `target_id`.
    pub fn multi_move(&mut self, target_id: ItemId) -> CanvasServiceResult<ChangeOutcome> {
        let canvas_id = self.require_canvas("multi_move")?;
        let items = self.items().to_vec();
        let outcome = reparent::multi_move(items, target_id, self.selection.as_slice())
            .map_err(|err| self.reject("multi_move", canvas_id, err))?;
        let result = self.commit("multi_move", canvas_id, outcome)?;
        self.selection.clear();
        Ok(result)
    }

    /// Detaches the current selection from `container_id` to root level.
    pub fn multi_remove(&mut self, container_id: ItemId) -> CanvasServiceResult<ChangeOutcome> {
        let canvas_id = self.require_canvas("multi_remove")?;
        let items = self.items().to_vec();
        let outcome = reparent::multi_remove(items, container_id, self.selection.as_slice())
            .map_err(|err| self.reject("multi_remove", canvas_id, err))?;
        let result = self.commit("multi_remove", canvas_id, outcome)?;
        self.selection.clear();
        Ok(result)
    }

    /// Adds a component at the end of its sibling group.
    pub fn add_item(&mut self, request: NewCanvasItem) -> CanvasServiceResult<ChangeOutcome> {
        let canvas_id = self.require_canvas("add_item")?;
        let name = normalize_name(request.name)?;

        let parent = match request.container {
            Some(container_id) => {
                let parent = self.container_parent(container_id).map_err(|err| {
                    self.reject("add_item", canvas_id, err)
                })?;
                if request.component_type.is_container() {
                    let err = ReparentError::ContainerNotMovable(container_id);
                    return Err(self.reject("add_item", canvas_id, err));
                }
                Some(parent)
            }
            None => None,
        };

        let order = next_sibling_order(self.items(), parent);
        let mut item = CanvasItem::new(name, request.component_type, order);
        item.set_parent(parent);

        if let Err(err) = self.canvas_repo.insert_item(canvas_id, &item) {
            error!(
                "event=add_item module=canvas_service status=error canvas_id={canvas_id} item_id={} error={err}",
                item.item_id
            );
            return Err(err.into());
        }

        let change = AuditChange::AddComponent {
            item_id: item.item_id,
            item_name: item.name.clone(),
            component_type: item.component_type.clone(),
            parent: item.parent,
        };
        let item_id = item.item_id;
        if let Some(active) = self.active.as_mut() {
            active.items.push(item);
            active.items = flatten_display_order(&active.items);
        }

        info!(
            "event=add_item module=canvas_service status=ok canvas_id={canvas_id} item_id={item_id}"
        );
        Ok(ChangeOutcome {
            item_ids: vec![item_id],
            audit_record: self.record(canvas_id, change),
        })
    }

    /// Renames a component and records the field update.
    pub fn rename_item(
        &mut self,
        item_id: ItemId,
        name: impl Into<String>,
    ) -> CanvasServiceResult<ChangeOutcome> {
        let canvas_id = self.require_canvas("rename_item")?;
        let name = normalize_name(name.into())?;
        let old_name = self
            .items()
            .iter()
            .find(|item| item.item_id == item_id)
            .map(|item| item.name.clone())
            .ok_or(CanvasServiceError::ItemNotFound(item_id))?;

        if let Err(err) = self.canvas_repo.rename_item(canvas_id, item_id, &name) {
            error!(
                "event=rename_item module=canvas_service status=error canvas_id={canvas_id} item_id={item_id} error={err}"
            );
            return Err(err.into());
        }

        if let Some(item) = self
            .active
            .as_mut()
            .and_then(|active| active.items.iter_mut().find(|item| item.item_id == item_id))
        {
            item.name = name.clone();
        }

        let change = AuditChange::FieldUpdate {
            item_id,
            field_name: "name".to_string(),
            old_value: Value::String(old_name),
            new_value: Value::String(name),
        };
        info!(
            "event=rename_item module=canvas_service status=ok canvas_id={canvas_id} item_id={item_id}"
        );
        Ok(ChangeOutcome {
            item_ids: vec![item_id],
            audit_record: self.record(canvas_id, change),
        })
    }

    fn require_canvas(&self, operation: &'static str) -> CanvasServiceResult<CanvasId> {
        self.canvas_id().ok_or_else(|| {
            warn!("event={operation} module=canvas_service status=skip reason=missing_context");
            CanvasServiceError::MissingContext
        })
    }

    fn reject(
        &self,
        operation: &'static str,
        canvas_id: CanvasId,
        err: ReparentError,
    ) -> CanvasServiceError {
        warn!(
            "event={operation} module=canvas_service status=skip canvas_id={canvas_id} reason=invalid_selection error={err}"
        );
        CanvasServiceError::InvalidSelection(err)
    }

    fn container_parent(&self, container_id: ItemId) -> Result<ParentRef, ReparentError> {
        let container = self
            .items()
            .iter()
            .find(|item| item.item_id == container_id)
            .ok_or(ReparentError::TargetNotFound(container_id))?;
        ParentRef::for_container(container).ok_or(ReparentError::TargetNotContainer(container_id))
    }

    fn commit(
        &mut self,
        operation: &'static str,
        canvas_id: CanvasId,
        outcome: ReparentOutcome,
    ) -> CanvasServiceResult<ChangeOutcome> {
        let ReparentOutcome {
            items,
            patches,
            change,
        } = outcome;
        if let Some(active) = self.active.as_mut() {
            active.items = items;
        }

        if let Err(err) = self.canvas_repo.write_fields(canvas_id, &patches) {
            error!(
                "event={operation} module=canvas_service status=error canvas_id={canvas_id} patches={} error={err}",
                patches.len()
            );
            return Err(err.into());
        }

        info!(
            "event={operation} module=canvas_service status=ok canvas_id={canvas_id} patched={} action={}",
            patches.len(),
            change.action_type()
        );
        Ok(ChangeOutcome {
            item_ids: patches.iter().map(|patch| patch.item_id).collect(),
            audit_record: self.record(canvas_id, change),
        })
    }

    fn record(&self, canvas_id: CanvasId, change: AuditChange) -> Option<AuditRecord> {
        let action_type = change.action_type();
        match self
            .audit
            .record(canvas_id, change, self.actor.resolve_actor())
        {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(
                    "event=audit_record module=canvas_service status=error canvas_id={canvas_id} action={action_type} error={err}"
                );
                None
            }
        }
    }
}

fn normalize_name(value: String) -> CanvasServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CanvasServiceError::InvalidName);
    }
    Ok(trimmed.to_string())
}
