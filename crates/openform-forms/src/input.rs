//! Per-type input acceptance.
//!
//! Mirrors what the stock input widgets let through before a value reaches the
//! store: number inputs take digits only and respect their bounds, text inputs
//! stop at their maximum length, date inputs store UTC midnight in epoch
//! seconds and refuse days outside `config.min`/`config.max`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

use openform_core::value::length;

use crate::definition::{FieldDefinition, FieldType};

/// The outcome of offering a value to a field.
#[derive(Debug, Clone, PartialEq)]
pub enum InputDecision {
    /// Store this (possibly normalized) value.
    Accept(Value),
    /// Leave the field unchanged.
    Reject(&'static str),
}

impl InputDecision {
    /// Returns `true` for [`InputDecision::Accept`].
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accept(_))
    }
}

/// Decides whether `value` may be stored into `field`.
///
/// # Examples
///
/// ```
/// use openform_forms::definition::{FieldDefinition, FieldType};
/// use openform_forms::input::{accept_input, InputDecision};
/// use serde_json::json;
///
/// let hp = FieldDefinition::new("horsepower", FieldType::Number);
/// assert_eq!(accept_input(&hp, json!("150")), InputDecision::Accept(json!("150")));
/// assert!(!accept_input(&hp, json!("15a")).is_accepted());
/// ```
pub fn accept_input(field: &FieldDefinition, value: Value) -> InputDecision {
    if !field.state.accepts_input() {
        return InputDecision::Reject("field is read-only");
    }

    match field.field_type {
        FieldType::Number => accept_number(field, value),
        FieldType::String | FieldType::Text | FieldType::Textarea => accept_text(field, value),
        FieldType::Date => accept_date(field, value),
        FieldType::Boolean => match value {
            Value::Bool(_) => InputDecision::Accept(value),
            Value::Null => InputDecision::Accept(Value::Bool(false)),
            _ => InputDecision::Reject("not a boolean"),
        },
        _ => InputDecision::Accept(value),
    }
}

fn accept_number(field: &FieldDefinition, value: Value) -> InputDecision {
    #[allow(clippy::cast_precision_loss)]
    let number = match &value {
        Value::Null => return InputDecision::Accept(Value::Null),
        Value::String(s) if s.chars().all(|c| c.is_ascii_digit()) => {
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Value::Number(n) => match n.as_u64() {
            Some(u) => u as f64,
            None => return InputDecision::Reject("not a whole non-negative number"),
        },
        _ => return InputDecision::Reject("not a number"),
    };

    if field.config.lower_bound().is_some_and(|min| number < min) {
        return InputDecision::Reject("below minimum");
    }
    if field.config.upper_bound().is_some_and(|max| number > max) {
        return InputDecision::Reject("above maximum");
    }
    InputDecision::Accept(value)
}

fn accept_text(field: &FieldDefinition, value: Value) -> InputDecision {
    if let (Value::String(s), Some(max)) = (&value, field.config.upper_bound()) {
        #[allow(clippy::cast_precision_loss)]
        let len = length(s) as f64;
        if len > max {
            return InputDecision::Reject("too long");
        }
    }
    InputDecision::Accept(value)
}

fn accept_date(field: &FieldDefinition, value: Value) -> InputDecision {
    let date = match &value {
        Value::Null => return InputDecision::Accept(Value::Null),
        Value::Number(n) => n.as_i64().and_then(epoch_date),
        Value::String(s) => parse_date(s.trim()),
        _ => None,
    };
    let Some(date) = date else {
        return InputDecision::Reject("not a date");
    };

    // Bounds compare whole days, like a date picker does.
    #[allow(clippy::cast_possible_truncation)]
    let bound = |b: f64| epoch_date(b as i64);
    if field.config.lower_bound().and_then(bound).is_some_and(|min| date < min) {
        return InputDecision::Reject("before minimum date");
    }
    if field.config.upper_bound().and_then(bound).is_some_and(|max| date > max) {
        return InputDecision::Reject("after maximum date");
    }
    InputDecision::Accept(Value::from(midnight_epoch(date)))
}

fn epoch_date(secs: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.date_naive())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

/// Epoch seconds of UTC midnight on `date`.
pub fn midnight_epoch(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}
