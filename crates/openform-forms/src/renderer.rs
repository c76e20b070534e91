//! Renderer registry.
//!
//! Each field kind maps to one renderer. The mapping is resolved once when a
//! form loads, so an unknown kind is found then rather than while drawing.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;

use crate::definition::{FieldDefinition, FieldType};
use crate::props::{field_props, FieldProps};
use crate::store::FormStore;

/// The component name used when a CUSTOM field does not name one.
pub const DEFAULT_COMPONENT: &str = "default";

/// The kind of a field, as seen by renderers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// NUMBER
    Number,
    /// STRING
    String,
    /// TEXT
    Text,
    /// DATE
    Date,
    /// BOOLEAN
    Boolean,
    /// SELECT
    Select,
    /// TABLE
    Table,
    /// TEXTAREA
    Textarea,
    /// FILE
    File,
    /// CUSTOM, with its component name.
    Custom(String),
}

impl FieldKind {
    /// The kind of a field record.
    pub fn of(field: &FieldDefinition) -> Self {
        match field.field_type {
            FieldType::Number => Self::Number,
            FieldType::String => Self::String,
            FieldType::Text => Self::Text,
            FieldType::Date => Self::Date,
            FieldType::Boolean => Self::Boolean,
            FieldType::Select => Self::Select,
            FieldType::Table => Self::Table,
            FieldType::Textarea => Self::Textarea,
            FieldType::File => Self::File,
            FieldType::Custom => Self::Custom(
                field
                    .component
                    .clone()
                    .unwrap_or_else(|| DEFAULT_COMPONENT.to_string()),
            ),
        }
    }

    /// Returns `true` for [`FieldKind::Custom`].
    pub const fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(component) => write!(f, "CUSTOM({component})"),
            Self::Number => f.write_str("NUMBER"),
            Self::String => f.write_str("STRING"),
            Self::Text => f.write_str("TEXT"),
            Self::Date => f.write_str("DATE"),
            Self::Boolean => f.write_str("BOOLEAN"),
            Self::Select => f.write_str("SELECT"),
            Self::Table => f.write_str("TABLE"),
            Self::Textarea => f.write_str("TEXTAREA"),
            Self::File => f.write_str("FILE"),
        }
    }
}

/// Draws a field from its props.
pub trait FieldRenderer: Send + Sync {
    /// Whatever the renderer produces (markup, a widget tree, ...).
    type Output;

    /// Renders one field.
    fn render(&self, field_id: &str, props: &FieldProps) -> Self::Output;
}

/// Maps field kinds to renderers.
#[derive(Debug)]
pub struct RendererRegistry<R> {
    renderers: HashMap<FieldKind, R>,
}

impl<R> Default for RendererRegistry<R> {
    fn default() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }
}

impl<R: FieldRenderer> RendererRegistry<R> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the renderer of a kind, replacing any previous one.
    pub fn register(&mut self, kind: FieldKind, renderer: R) {
        self.renderers.insert(kind, renderer);
    }

    /// Returns the renderer registered for exactly this kind.
    pub fn get(&self, kind: &FieldKind) -> Option<&R> {
        self.renderers.get(kind)
    }

    /// Maps every field of the store to its renderer, in field order.
    ///
    /// Built-in kinds without a renderer fall back to the TEXT renderer.
    /// CUSTOM fields whose component is not registered are left out.
    pub fn resolve(&self, store: &FormStore) -> IndexMap<String, &R> {
        let mut resolved = IndexMap::new();
        for (id, field) in store.fields() {
            let kind = FieldKind::of(field);
            let renderer = match self.renderers.get(&kind) {
                Some(renderer) => Some(renderer),
                None if kind.is_custom() => {
                    tracing::warn!(field = %id, kind = %kind, "no renderer for custom component");
                    None
                }
                None => self.renderers.get(&FieldKind::Text),
            };
            if let Some(renderer) = renderer {
                resolved.insert(id.clone(), renderer);
            }
        }
        resolved
    }

    /// Renders every visible field that has a renderer.
    pub fn render_all(&self, store: &FormStore) -> Vec<(String, R::Output)> {
        self.resolve(store)
            .into_iter()
            .filter_map(|(id, renderer)| {
                let props = field_props(store, &id);
                if props.hidden {
                    return None;
                }
                let output = renderer.render(&id, &props);
                Some((id, output))
            })
            .collect()
    }
}
