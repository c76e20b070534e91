//! Form definition model.
//!
//! A [`FormDefinition`] is the serializable description of a form: its fields,
//! the groups that lay them out, the optional step sequence and the buttons.
//! Definitions are produced by the enclosing application (usually as JSON) and
//! are immutable once loaded; the [`FormStore`](crate::store::FormStore) copies
//! them into its own runtime records.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use openform_core::error::FormResult;

/// The data type of a field (or of a table column).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    /// A numeric input.
    Number,
    /// A single-line string.
    String,
    /// A single-line text input; also the fallback renderer kind.
    #[default]
    Text,
    /// A calendar date, stored as epoch seconds at UTC midnight.
    Date,
    /// A checkbox.
    Boolean,
    /// A single choice from `config.data`, possibly loaded by a cascade.
    Select,
    /// A list of row objects described by `config.cols`.
    Table,
    /// A field rendered by an application-supplied component.
    Custom,
    /// A multi-line text input.
    Textarea,
    /// A file attachment (table columns).
    File,
}

impl FieldType {
    /// Returns the wire name (e.g. `"SELECT"`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Number => "NUMBER",
            Self::String => "STRING",
            Self::Text => "TEXT",
            Self::Date => "DATE",
            Self::Boolean => "BOOLEAN",
            Self::Select => "SELECT",
            Self::Table => "TABLE",
            Self::Custom => "CUSTOM",
            Self::Textarea => "TEXTAREA",
            Self::File => "FILE",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a field is presented and whether it takes part in validation and submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldState {
    /// Editable by the user.
    #[default]
    Editable,
    /// Shown read-only with its stored value.
    View,
    /// Not rendered, not validated, not submitted.
    Hidden,
    /// Shown read-only with a value derived from `expression`.
    Viewonly,
    /// Table rows can be added.
    Addable,
    /// Rendered as a table.
    Table,
}

impl FieldState {
    /// Returns `true` if user input may change the value.
    pub const fn accepts_input(self) -> bool {
        !matches!(self, Self::View | Self::Viewonly | Self::Hidden)
    }
}

/// One entry of a SELECT option list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    /// The value stored when the option is chosen.
    pub value: Value,
    /// The display label (or translation key).
    #[serde(default)]
    pub label: Option<String>,
    /// Extra values written into other fields when the option is chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl SelectOption {
    /// Creates an option without extra data.
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: Some(label.into()),
            data: None,
        }
    }

    /// Attaches extra field values to the option.
    #[must_use]
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }
}

/// A column of a TABLE field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    /// The key of the column in each row object.
    pub id: String,
    /// The column's data type.
    #[serde(rename = "type", default)]
    pub column_type: FieldType,
    /// The column's state; VIEWONLY columns are computed from `expression`.
    #[serde(default)]
    pub state: FieldState,
    /// Expression evaluated per row for VIEWONLY columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Value a new row starts with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Lower bound (number, or epoch seconds for dates).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound (number, or epoch seconds for dates).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Whether the column is summed into the table's totals.
    #[serde(default)]
    pub aggregate: bool,
    /// Options for SELECT columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<SelectOption>,
}

impl TableColumn {
    /// Returns `true` if the column's value is derived from an expression.
    pub fn is_computed(&self) -> bool {
        self.state == FieldState::Viewonly && self.expression.is_some()
    }
}

/// Type-specific field configuration.
///
/// Keys the engine does not interpret (such as a group `title`) are kept in
/// `extra` and survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// SELECT options.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<SelectOption>,
    /// Ids of the fields whose options are loaded from this field's value.
    #[serde(rename = "loadData", default, skip_serializing_if = "Vec::is_empty")]
    pub load_data: Vec<String>,
    /// Ids of the groups a BOOLEAN field hides while checked.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hides: Vec<String>,
    /// Lower bound; `0` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound (or maximum length for strings); `0` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Remote endpoint that persists table rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// TABLE columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cols: Vec<TableColumn>,
    /// Maximum number of TABLE rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Uninterpreted keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldConfig {
    /// Returns `min` when it is set and non-zero.
    pub fn lower_bound(&self) -> Option<f64> {
        self.min.filter(|m| *m != 0.0)
    }

    /// Returns `max` when it is set and non-zero.
    pub fn upper_bound(&self) -> Option<f64> {
        self.max.filter(|m| *m != 0.0)
    }
}

/// A field of a form, as defined and as held at runtime by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// The field id. Filled from the map key when the definition omits it.
    #[serde(default)]
    pub id: String,
    /// The field type. Never changes after the field is created.
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// The field state.
    #[serde(default)]
    pub state: FieldState,
    /// The current value.
    #[serde(default)]
    pub value: Value,
    /// Type-specific configuration.
    #[serde(default)]
    pub config: FieldConfig,
    /// Ordered rule strings; joined as if by `|`.
    #[serde(
        default,
        deserialize_with = "string_or_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub validators: Vec<String>,
    /// The current error message, empty when the field is valid.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// Derived-value expression for VIEWONLY fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// `true` while a cascade load for this field is in flight.
    #[serde(default)]
    pub loading: bool,
    /// Component name for CUSTOM fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Uninterpreted keys (e.g. `info`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldDefinition {
    /// Creates a field of the given type with default state and no value.
    pub fn new(id: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            field_type,
            ..Self::default()
        }
    }

    /// Sets the state.
    #[must_use]
    pub fn with_state(mut self, state: FieldState) -> Self {
        self.state = state;
        self
    }

    /// Sets the initial value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    /// Appends a rule string.
    #[must_use]
    pub fn with_validator(mut self, rules: impl Into<String>) -> Self {
        self.validators.push(rules.into());
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: FieldConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the derived-value expression.
    #[must_use]
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Returns `true` if the field is excluded from validation and submission.
    pub fn is_hidden(&self) -> bool {
        self.state == FieldState::Hidden
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(rules)) => vec![rules],
        Some(OneOrMany::Many(rules)) => rules,
    })
}

/// How a group lays out its fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupType {
    /// A plain list of fields.
    #[default]
    Group,
    /// Fields split across labelled tabs.
    Tabs,
}

/// Whether a group is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupState {
    /// Shown and validated.
    #[default]
    Editable,
    /// Not shown; its fields are skipped by step validation.
    Hidden,
}

/// The fields of a group: a list, or tab label to list.
///
/// The tabbed shape is accepted for either group type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupValue {
    /// An ordered list of field ids.
    Fields(Vec<String>),
    /// Ordered tabs, each an ordered list of field ids.
    Tabs(IndexMap<String, Vec<String>>),
}

impl Default for GroupValue {
    fn default() -> Self {
        Self::Fields(Vec::new())
    }
}

impl GroupValue {
    /// Returns every field id, tabs flattened in order.
    pub fn field_ids(&self) -> Vec<&str> {
        match self {
            Self::Fields(ids) => ids.iter().map(String::as_str).collect(),
            Self::Tabs(tabs) => tabs.values().flatten().map(String::as_str).collect(),
        }
    }
}

/// A named group of fields rendered together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupDefinition {
    /// Layout type.
    #[serde(rename = "type", default)]
    pub group_type: GroupType,
    /// Visibility.
    #[serde(default)]
    pub state: GroupState,
    /// Member fields.
    #[serde(default)]
    pub value: GroupValue,
    /// Presentation settings (`title`, `colls`, ...), not interpreted.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

impl GroupDefinition {
    /// Creates a plain group over the given field ids.
    pub fn fields<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            value: GroupValue::Fields(ids.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Returns `true` if the group is hidden.
    pub fn is_hidden(&self) -> bool {
        self.state == GroupState::Hidden
    }
}

/// Ordered step key to the ids of the groups shown on that step.
pub type StepMap = IndexMap<String, Vec<String>>;

/// An action button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// The action id passed to the submitter (e.g. `"save"`).
    pub id: String,
    /// The caption (or translation key).
    pub value: String,
    /// Optional color hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// The aggregate root of a form.
///
/// # Examples
///
/// ```
/// use openform_forms::definition::FormDefinition;
///
/// let definition = FormDefinition::from_json_str(r#"{
///     "fields": { "vin": { "type": "STRING", "validators": ["required", "size:17"] } },
///     "groups": { "vehicle": { "type": "GROUP", "value": ["vin"] } },
///     "buttons": [{ "id": "submit", "value": "Submit" }]
/// }"#).unwrap();
///
/// assert_eq!(definition.fields["vin"].id, "vin");
/// assert!(!definition.is_step_form());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    /// Fields keyed by id.
    #[serde(default)]
    pub fields: IndexMap<String, FieldDefinition>,
    /// Groups keyed by id, in display order.
    #[serde(default)]
    pub groups: IndexMap<String, GroupDefinition>,
    /// Steps in navigation order; empty for a single-page form.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub steps: StepMap,
    /// Action buttons.
    #[serde(default)]
    pub buttons: Vec<Button>,
}

impl FormDefinition {
    /// Parses a definition from JSON text.
    pub fn from_json_str(source: &str) -> FormResult<Self> {
        let mut definition: Self = serde_json::from_str(source)?;
        definition.fill_ids();
        Ok(definition)
    }

    /// Converts a JSON value into a definition.
    pub fn from_value(value: Value) -> FormResult<Self> {
        let mut definition: Self = serde_json::from_value(value)?;
        definition.fill_ids();
        Ok(definition)
    }

    /// Serializes the definition to a JSON value.
    pub fn to_value(&self) -> FormResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Copies each field's map key into its `id` when the id is empty.
    pub fn fill_ids(&mut self) {
        for (key, field) in &mut self.fields {
            if field.id.is_empty() {
                field.id.clone_from(key);
            }
        }
    }

    /// Returns `true` if the form is navigated step by step.
    pub fn is_step_form(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Returns the button with the given id.
    pub fn button(&self, id: &str) -> Option<&Button> {
        self.buttons.iter().find(|b| b.id == id)
    }
}
