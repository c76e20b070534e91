//! Renderer-facing field props.
//!
//! Renderers never read store records directly. They receive a [`FieldProps`]
//! value derived here, so every renderer agrees on what "disabled" or
//! "hidden" means for a given field state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use openform_core::value::is_truthy;
use openform_expr::{ExprValue, Expression};

use crate::definition::{FieldDefinition, FieldState, FieldType, SelectOption};
use crate::store::FormStore;

/// Translation key of the generic SELECT placeholder.
pub const SELECT_PLACEHOLDER: &str = "select.placeholder";

/// What a renderer needs to draw one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldProps {
    /// The field id.
    pub id: String,
    /// Translation key of the label.
    pub label: String,
    /// Translation key of the placeholder; empty when none is shown.
    pub placeholder: String,
    /// The input does not react to the user.
    pub disabled: bool,
    /// The value is displayed, not edited.
    pub read_only: bool,
    /// SELECT options.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    /// Earliest selectable date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_date: Option<DateTime<Utc>>,
    /// Latest selectable date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_date: Option<DateTime<Utc>>,
    /// A clear button is offered.
    pub clearable: bool,
    /// BOOLEAN fields: the checkbox is ticked.
    pub checked: bool,
    /// The current error message.
    pub error: String,
    /// A cascade load is in flight.
    pub loading: bool,
    /// Nothing is rendered.
    pub hidden: bool,
    /// The value to display.
    pub value: Value,
}

/// Derives the props of field `id`. A missing field yields hidden props.
pub fn field_props(store: &FormStore, id: &str) -> FieldProps {
    let Some(field) = store.get_field(id) else {
        return FieldProps {
            id: id.to_string(),
            hidden: true,
            ..FieldProps::default()
        };
    };

    let view = matches!(field.state, FieldState::View | FieldState::Viewonly);
    let select = field.field_type == FieldType::Select;
    let placeholder = if view {
        String::new()
    } else if select {
        SELECT_PLACEHOLDER.to_string()
    } else {
        format!("{id}.placeholder")
    };

    let (min_date, max_date) = if field.field_type == FieldType::Date {
        (
            field.config.lower_bound().and_then(epoch_to_datetime),
            field.config.upper_bound().and_then(epoch_to_datetime),
        )
    } else {
        (None, None)
    };

    FieldProps {
        id: id.to_string(),
        label: format!("{id}.label"),
        placeholder,
        disabled: view || field.loading || (select && field.config.data.is_empty()),
        read_only: view,
        options: if select {
            field.config.data.clone()
        } else {
            Vec::new()
        },
        min_date,
        max_date,
        clearable: field.field_type == FieldType::Date && !view,
        checked: field.field_type == FieldType::Boolean && is_truthy(&field.value),
        error: field.error.clone(),
        loading: field.loading,
        hidden: field.is_hidden(),
        value: display_value(store, field),
    }
}

/// The value shown for a field: VIEWONLY fields evaluate their expression
/// against the value set, everything else shows the stored value.
pub fn display_value(store: &FormStore, field: &FieldDefinition) -> Value {
    match (&field.state, &field.expression) {
        (FieldState::Viewonly, Some(source)) => match Expression::parse(source) {
            Ok(expression) => expression.evaluate(store).to_json(),
            Err(err) => {
                tracing::warn!(field = %field.id, error = %err, "expression does not parse");
                ExprValue::NAN.to_json()
            }
        },
        _ => field.value.clone(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp(secs.trunc() as i64, 0)
}
