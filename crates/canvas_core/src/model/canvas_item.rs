//! Canvas component domain model.
//!
//! # Responsibility
//! - Define the flat component record stored per canvas.
//! - Encode container membership and label derivation rules.
//!
//! # Invariants
//! - `item_id` is stable and never reused for another component.
//! - An item has at most one parent: a table or a group, never both.
//! - Containers (`Table`, `Group`) never have a parent themselves.
//! - `has_label` is `false` for direct children of a table, otherwise `true`
//!   unless the component type is label-exempt.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one canvas component.
pub type ItemId = Uuid;

/// Stable identifier of one canvas (UI, API or DB).
pub type CanvasId = Uuid;

/// Component kind stored in `component_type`.
///
/// Persisted as a lowercase string; unknown kinds survive as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentType {
    Table,
    Group,
    Text,
    Input,
    TextArea,
    Number,
    Select,
    Checkbox,
    Radio,
    Date,
    Button,
    Hyperlink,
    Image,
    File,
    Label,
    Custom(String),
}

impl ComponentType {
    /// Parses a stored component type. Accepts the `tbl` / `grp` aliases.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "table" | "tbl" => Self::Table,
            "group" | "grp" => Self::Group,
            "text" => Self::Text,
            "input" => Self::Input,
            "textarea" => Self::TextArea,
            "number" => Self::Number,
            "select" => Self::Select,
            "checkbox" => Self::Checkbox,
            "radio" => Self::Radio,
            "date" => Self::Date,
            "button" => Self::Button,
            "hyperlink" => Self::Hyperlink,
            "image" => Self::Image,
            "file" => Self::File,
            "label" => Self::Label,
            _ => Self::Custom(value.trim().to_string()),
        }
    }

    /// Canonical storage string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Table => "table",
            Self::Group => "group",
            Self::Text => "text",
            Self::Input => "input",
            Self::TextArea => "textarea",
            Self::Number => "number",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Date => "date",
            Self::Button => "button",
            Self::Hyperlink => "hyperlink",
            Self::Image => "image",
            Self::File => "file",
            Self::Label => "label",
            Self::Custom(value) => value.as_str(),
        }
    }

    /// Returns whether this kind can hold child components.
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Table | Self::Group)
    }

    /// Returns whether this kind never renders a field label.
    pub fn is_label_exempt(&self) -> bool {
        matches!(self, Self::Button | Self::Hyperlink)
    }
}

impl From<String> for ComponentType {
    fn from(value: String) -> Self {
        Self::parse(value.as_str())
    }
}

impl From<ComponentType> for String {
    fn from(value: ComponentType) -> Self {
        value.as_str().to_string()
    }
}

/// Container membership of one item.
///
/// Replaces the `fk_table_id` / `fk_group_id` pointer pair so both can never
/// be set at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ParentRef {
    Table(ItemId),
    Group(ItemId),
}

impl ParentRef {
    /// Builds the membership pointing at `container`, if it is a container.
    pub fn for_container(container: &CanvasItem) -> Option<Self> {
        match container.component_type {
            ComponentType::Table => Some(Self::Table(container.item_id)),
            ComponentType::Group => Some(Self::Group(container.item_id)),
            _ => None,
        }
    }

    /// Id of the parent container.
    pub fn id(self) -> ItemId {
        match self {
            Self::Table(id) | Self::Group(id) => id,
        }
    }

    /// Builds membership from the two stored pointer columns.
    ///
    /// Returns `None` for the pair when both pointers are set.
    pub fn from_pointers(
        fk_table_id: Option<ItemId>,
        fk_group_id: Option<ItemId>,
    ) -> Option<Option<Self>> {
        match (fk_table_id, fk_group_id) {
            (Some(_), Some(_)) => None,
            (Some(table_id), None) => Some(Some(Self::Table(table_id))),
            (None, Some(group_id)) => Some(Some(Self::Group(group_id))),
            (None, None) => Some(None),
        }
    }
}

/// Returns the maintained `has_label` value for a component type placed
/// under `parent`.
pub fn derive_has_label(component_type: &ComponentType, parent: Option<ParentRef>) -> bool {
    match parent {
        Some(ParentRef::Table(_)) => false,
        _ => !component_type.is_label_exempt(),
    }
}

/// One component on a canvas, stored flat with an optional parent pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasItem {
    pub item_id: ItemId,
    /// User-facing component name.
    pub name: String,
    pub component_type: ComponentType,
    /// Sibling-relative sort key. Unique only inside one sibling group.
    pub order: i64,
    /// `None` means root level.
    pub parent: Option<ParentRef>,
    pub has_label: bool,
}

impl CanvasItem {
    /// Creates a root-level item with a generated id and derived label flag.
    pub fn new(name: impl Into<String>, component_type: ComponentType, order: i64) -> Self {
        Self::with_id(Uuid::new_v4(), name, component_type, order)
    }

    /// Creates a root-level item with a caller-provided id.
    pub fn with_id(
        item_id: ItemId,
        name: impl Into<String>,
        component_type: ComponentType,
        order: i64,
    ) -> Self {
        let has_label = derive_has_label(&component_type, None);
        Self {
            item_id,
            name: name.into(),
            component_type,
            order,
            parent: None,
            has_label,
        }
    }

    /// Legacy pointer view: table the item belongs to.
    pub fn fk_table_id(&self) -> Option<ItemId> {
        match self.parent {
            Some(ParentRef::Table(id)) => Some(id),
            _ => None,
        }
    }

    /// Legacy pointer view: group the item belongs to.
    pub fn fk_group_id(&self) -> Option<ItemId> {
        match self.parent {
            Some(ParentRef::Group(id)) => Some(id),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.component_type.is_container()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Reassigns container membership and re-derives `has_label`.
    pub fn set_parent(&mut self, parent: Option<ParentRef>) {
        self.parent = parent;
        self.has_label = derive_has_label(&self.component_type, parent);
    }
}
