//! Error message formatting.
//!
//! The engine only decides *which* rule failed. Turning that into text is the
//! job of an [`ErrorFormatter`], injected by the enclosing application. Two
//! formatters ship with the crate:
//!
//! - [`KeyFormatter`] produces translation keys (`"vin.size"`), for apps that
//!   localize messages elsewhere;
//! - [`TemplateFormatter`] renders English templates with `{field}` and
//!   `{param}` placeholders, overridable per rule.
//!
//! Any `Fn(&str, &RuleFailure) -> String` closure is also a formatter.

use std::collections::HashMap;

use crate::rules::RuleKind;
use crate::validation::RuleFailure;

/// Maps a failing rule and a field id to a user-facing message.
pub trait ErrorFormatter: Send + Sync {
    /// Formats the failure of `field_id`.
    fn format(&self, field_id: &str, failure: &RuleFailure) -> String;
}

impl<F> ErrorFormatter for F
where
    F: Fn(&str, &RuleFailure) -> String + Send + Sync,
{
    fn format(&self, field_id: &str, failure: &RuleFailure) -> String {
        self(field_id, failure)
    }
}

/// Formats failures as `"{field}.{rule}"` translation keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyFormatter;

impl ErrorFormatter for KeyFormatter {
    fn format(&self, field_id: &str, failure: &RuleFailure) -> String {
        format!("{field_id}.{}", failure.name())
    }
}

/// Formats failures from message templates.
///
/// # Examples
///
/// ```
/// use openform_rules::{validate, ErrorFormatter, TemplateFormatter};
/// use serde_json::{json, Map};
///
/// let failure = validate("size:17", &json!("SHORT"), &Map::new()).unwrap();
/// let formatter = TemplateFormatter::new();
/// assert_eq!(formatter.format("vin", &failure), "vin must be exactly 17 characters.");
/// ```
#[derive(Debug, Clone)]
pub struct TemplateFormatter {
    templates: HashMap<&'static str, String>,
}

impl Default for TemplateFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateFormatter {
    /// Creates a formatter with the default English templates.
    pub fn new() -> Self {
        let templates = RuleKind::ALL
            .into_iter()
            .filter_map(|kind| default_template(kind).map(|t| (kind.reported_name(), t.to_string())))
            .collect();
        Self { templates }
    }

    /// Overrides the template for one rule.
    #[must_use]
    pub fn with_template(mut self, rule: RuleKind, template: impl Into<String>) -> Self {
        self.templates.insert(rule.reported_name(), template.into());
        self
    }
}

impl ErrorFormatter for TemplateFormatter {
    fn format(&self, field_id: &str, failure: &RuleFailure) -> String {
        match self.templates.get(failure.name()) {
            Some(template) => render(template, field_id, failure.param.as_deref()),
            None => KeyFormatter.format(field_id, failure),
        }
    }
}

fn render(template: &str, field_id: &str, param: Option<&str>) -> String {
    let param = param.unwrap_or("");
    let mut parts = param.splitn(2, ',');
    let first = parts.next().unwrap_or("").trim();
    let second = parts.next().unwrap_or("").trim();

    template
        .replace("{field}", field_id)
        .replace("{param}", param)
        .replace("{min}", first)
        .replace("{max}", second)
}

const fn default_template(kind: RuleKind) -> Option<&'static str> {
    match kind {
        RuleKind::Nullable | RuleKind::RequiredIf => None,
        RuleKind::Required => Some("{field} is required."),
        RuleKind::Email => Some("{field} must be a valid email address."),
        RuleKind::Numeric => Some("{field} must be a number."),
        RuleKind::Integer => Some("{field} must be a whole number."),
        RuleKind::Digits => Some("{field} must have exactly {param} digits."),
        RuleKind::Size => Some("{field} must be exactly {param} characters."),
        RuleKind::Min => Some("{field} must be at least {param}."),
        RuleKind::Max => Some("{field} may not be greater than {param}."),
        RuleKind::Between => Some("{field} must be between {min} and {max}."),
        RuleKind::Confirmed => Some("{field} confirmation does not match."),
        RuleKind::Same => Some("{field} must match {param}."),
        RuleKind::AtLeastOne => Some("At least one of {param} is required."),
        RuleKind::Regex => Some("{field} format is invalid."),
        RuleKind::In => Some("{field} must be one of: {param}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(rule: RuleKind, param: Option<&str>) -> RuleFailure {
        RuleFailure {
            rule,
            param: param.map(String::from),
        }
    }

    #[test]
    fn test_key_formatter() {
        let f = KeyFormatter;
        assert_eq!(f.format("vin", &failure(RuleKind::Size, Some("17"))), "vin.size");
        assert_eq!(
            f.format("engine", &failure(RuleKind::RequiredIf, Some("fuelType,petrol"))),
            "engine.required"
        );
    }

    #[test]
    fn test_template_formatter_defaults() {
        let f = TemplateFormatter::new();
        assert_eq!(
            f.format("horsepower", &failure(RuleKind::Between, Some("40,1500"))),
            "horsepower must be between 40 and 1500."
        );
        assert_eq!(
            f.format("engine", &failure(RuleKind::RequiredIf, None)),
            "engine is required."
        );
    }

    #[test]
    fn test_template_override() {
        let f = TemplateFormatter::new().with_template(RuleKind::Required, "Please fill in {field}");
        assert_eq!(f.format("plate", &failure(RuleKind::Required, None)), "Please fill in plate");
    }

    #[test]
    fn test_closure_formatter() {
        let f = |field: &str, failure: &RuleFailure| format!("{field}!{}", failure.name());
        assert_eq!(f.format("a", &failure(RuleKind::Email, None)), "a!email");
    }
}
