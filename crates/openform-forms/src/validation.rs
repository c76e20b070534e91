//! Field validation against the store.
//!
//! The rule engine answers "which rule fails first" for one value. This module
//! applies it to store records: HIDDEN fields are skipped, a field's
//! validator strings are combined, and a group of fields is checked
//! exhaustively so that every failing field gets its message.
//!
//! Cross-field rules (`same`, `required_if`, `at_least_one` and the like)
//! read siblings from the store's value set. VIEWONLY fields are not part of
//! that set, so a rule naming one always sees null. Compare against the
//! editable fields the expression is computed from instead.

use openform_core::error::FieldErrors;
use openform_rules::{validate_tokens, ErrorFormatter, RuleFailure, RuleSet};

use crate::store::FormStore;

/// Returns the first failing rule of a field, or `None` if it passes.
///
/// Missing and HIDDEN fields always pass.
pub fn validate_field(store: &FormStore, id: &str) -> Option<RuleFailure> {
    let field = store.get_field(id)?;
    if field.is_hidden() || field.validators.is_empty() {
        return None;
    }
    let rules = RuleSet::from_validators(&field.validators);
    let failure = validate_tokens(rules.tokens(), &field.value, store);
    if let Some(failure) = &failure {
        tracing::debug!(field = id, rule = failure.name(), "field failed validation");
    }
    failure
}

/// Validates every listed field, recording the formatted message of each
/// failure on the field and clearing the error of each passing one.
///
/// All fields are checked even after a failure. Returns the new errors.
pub fn validate_fields<F>(store: &mut FormStore, ids: &[String], formatter: &F) -> FieldErrors
where
    F: ErrorFormatter + ?Sized,
{
    let view: &FormStore = store;
    let failures: Vec<(String, Option<String>)> = ids
        .iter()
        .map(|id| {
            let message = validate_field(view, id).map(|failure| formatter.format(id, &failure));
            (id.clone(), message)
        })
        .collect();

    let mut errors = FieldErrors::new();
    for (id, message) in failures {
        match message {
            Some(message) => {
                store.set_error(&id, message.clone());
                errors.insert(id, message);
            }
            None => {
                store.set_error(&id, String::new());
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::FormDefinition;
    use openform_rules::KeyFormatter;
    use serde_json::json;

    fn store() -> FormStore {
        FormStore::from_definition(
            &FormDefinition::from_value(json!({
                "fields": {
                    "ownerEmail": { "type": "STRING", "value": "a@b.co", "validators": ["required", "email"] },
                    "confirmEmail": { "type": "STRING", "value": "x@b.co", "validators": ["required", "same:ownerEmail"] },
                    "name": { "type": "STRING", "value": "", "validators": "required|min:2" },
                    "secret": { "type": "STRING", "state": "HIDDEN", "validators": ["required"] },
                    "free": { "type": "STRING" }
                },
                "groups": {}
            }))
            .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_field() {
        let store = store();
        assert!(validate_field(&store, "ownerEmail").is_none());
        assert_eq!(validate_field(&store, "confirmEmail").unwrap().name(), "same");
        assert_eq!(validate_field(&store, "name").unwrap().name(), "required");
        assert!(validate_field(&store, "secret").is_none());
        assert!(validate_field(&store, "free").is_none());
        assert!(validate_field(&store, "ghost").is_none());
    }

    #[test]
    fn test_validate_fields_is_exhaustive() {
        let mut store = store();
        let ids: Vec<String> = ["confirmEmail", "name", "ownerEmail"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let errors = validate_fields(&mut store, &ids, &KeyFormatter);

        assert_eq!(errors.len(), 2);
        assert_eq!(errors["confirmEmail"], "confirmEmail.same");
        assert_eq!(errors["name"], "name.required");
        assert_eq!(store.get_field("name").unwrap().error, "name.required");
        assert_eq!(store.get_field("ownerEmail").unwrap().error, "");
    }

    #[test]
    fn test_validate_fields_clears_fixed_errors() {
        let mut store = store();
        let ids = vec!["name".to_string()];
        validate_fields(&mut store, &ids, &KeyFormatter);
        store.set_value("name", json!("Jo"));
        let errors = validate_fields(&mut store, &ids, &KeyFormatter);
        assert!(errors.is_empty());
        assert!(store.errors().is_empty());
    }

    #[test]
    fn test_cross_field_rules_do_not_see_viewonly_fields() {
        let store = FormStore::from_definition(
            &FormDefinition::from_value(json!({
                "fields": {
                    "base": { "type": "NUMBER", "value": 5 },
                    "total": { "type": "NUMBER", "state": "VIEWONLY", "value": 10, "expression": "base * 2" },
                    "echo": { "type": "NUMBER", "value": 10, "validators": "same:total" },
                    "twice": { "type": "NUMBER", "value": 5, "validators": "same:base" }
                },
                "groups": {}
            }))
            .unwrap(),
        )
        .unwrap();

        assert_eq!(validate_field(&store, "echo").unwrap().name(), "same");
        assert!(validate_field(&store, "twice").is_none());
    }
}
